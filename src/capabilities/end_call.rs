use super::{Capability, CapabilityContext};
use crate::error::CapabilityError;
use serde_json::{json, Value};

pub const END_CALL: &str = "end_call";

/// Terminal capability: the model asks to hang up
pub struct EndCall;

#[async_trait::async_trait]
impl Capability for EndCall {
    fn name(&self) -> &'static str {
        END_CALL
    }

    fn description(&self) -> &'static str {
        "End the call once the caller has nothing else to do. Include a short farewell in your reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "Why the call is ending" }
            }
        })
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn execute(&self, _ctx: &CapabilityContext, _args: &Value) -> Result<Value, CapabilityError> {
        Ok(json!({ "status": "ending" }))
    }
}

use crate::capabilities::{stage_edit, CapabilityContext, CapabilityRegistry, Staged};
use crate::error::CapabilityError;
use crate::model::{ChatMessage, ToolCall};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Run every requested capability, one result message per call id
///
/// Failures become error content; the turn always continues.
pub async fn run_tools(
    ctx: &CapabilityContext,
    registry: &CapabilityRegistry,
    calls: &[ToolCall],
) -> Vec<ChatMessage> {
    let mut results = Vec::with_capacity(calls.len());

    for call in calls {
        let content = match run_one(ctx, registry, call).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Capability {} failed for {}: {}", call.name, ctx.session_id, e);
                json!({ "status": "error", "error": e.to_string() })
            }
        };
        results.push(ChatMessage::tool_result(call.id.clone(), content.to_string()));
    }

    results
}

async fn run_one(
    ctx: &CapabilityContext,
    registry: &CapabilityRegistry,
    call: &ToolCall,
) -> Result<Value, CapabilityError> {
    let capability = registry.get(&call.name)?;
    capability.validate(&call.arguments)?;

    let Some(action) = capability.edit_action() else {
        return capability.execute(ctx, &call.arguments).await;
    };

    let edit = match stage_edit(ctx, action, &call.arguments).await? {
        Staged::Pending(result) => return Ok(result),
        Staged::Ready(edit) => edit,
    };

    info!("Executing confirmed {} for {}", call.name, ctx.session_id);
    let confirmed = CapabilityContext {
        confirmed_edit: Some(edit),
        ..ctx.clone()
    };
    let result = capability.execute(&confirmed, &call.arguments).await;

    // The edit is spent whether or not the provider accepted it
    ctx.services
        .sessions
        .update(&ctx.session_id, |s| s.pending_edit = None)
        .await;

    result
}

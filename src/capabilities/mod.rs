//! Named capabilities the conversation can invoke
//!
//! Each capability declares an argument schema and is looked up by stable name in a
//! [`CapabilityRegistry`]. Unknown names are a typed error, not a string match.
//!
//! Mutating capabilities (book, reschedule, cancel) declare the [`EditAction`] they
//! perform. The tool node stages their arguments into the session's pending edit and
//! only executes them once every detail is present and the caller said yes.

mod calendar_ops;
mod context;
mod end_call;
mod registry;
mod staging;

pub use calendar_ops::{BookAppointment, CancelAppointment, ListAppointments, RescheduleAppointment};
pub use context::{CallServices, CapabilityContext};
pub use end_call::{EndCall, END_CALL};
pub use registry::CapabilityRegistry;
pub use staging::{stage_edit, Staged};

use crate::error::CapabilityError;
use crate::model::ToolSpec;
use crate::session::EditAction;
use serde_json::Value;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the argument object
    fn parameters(&self) -> Value;

    /// The edit a mutating capability performs
    fn edit_action(&self) -> Option<EditAction> {
        None
    }

    fn is_mutating(&self) -> bool {
        self.edit_action().is_some()
    }

    /// Invoking this capability ends the conversation instead of running it
    fn is_terminal(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &CapabilityContext, args: &Value) -> Result<Value, CapabilityError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Check argument types against the schema. Unknown fields are allowed.
    fn validate(&self, args: &Value) -> Result<(), CapabilityError> {
        let schema = self.parameters();
        let object = match args {
            Value::Null => return check_required(&schema, &serde_json::Map::new()),
            Value::Object(object) => object,
            _ => {
                return Err(CapabilityError::InvalidArguments(
                    "arguments must be an object".to_string(),
                ))
            }
        };

        check_required(&schema, object)?;

        let properties = schema.get("properties").and_then(Value::as_object);
        for (name, value) in object {
            let expected = properties
                .and_then(|p| p.get(name))
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);

            let valid = match expected {
                Some("string") => value.is_string() || value.is_null(),
                Some("integer") => value.is_i64() || value.is_u64() || value.is_null(),
                Some("boolean") => value.is_boolean() || value.is_null(),
                _ => true,
            };

            if !valid {
                return Err(CapabilityError::InvalidArguments(format!(
                    "field '{}' must be of type '{}'",
                    name,
                    expected.unwrap_or("any")
                )));
            }
        }

        Ok(())
    }
}

fn check_required(schema: &Value, object: &serde_json::Map<String, Value>) -> Result<(), CapabilityError> {
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);

    for field in required {
        if !object.contains_key(field) {
            return Err(CapabilityError::InvalidArguments(format!(
                "missing required field: {}",
                field
            )));
        }
    }
    Ok(())
}

/// Optional string argument, trimmed; empty counts as absent
pub(crate) fn string_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Registry with every built-in capability
pub fn default_registry() -> CapabilityRegistry {
    CapabilityRegistry::new()
        .with(Arc::new(ListAppointments))
        .with(Arc::new(RescheduleAppointment))
        .with(Arc::new(CancelAppointment))
        .with(Arc::new(BookAppointment))
        .with(Arc::new(EndCall))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry_contents() {
        let registry = default_registry();
        assert_eq!(
            registry.names(),
            vec![
                "book_appointment",
                "cancel_appointment",
                "end_call",
                "list_appointments",
                "reschedule_appointment",
            ]
        );
        assert!(registry.is_mutating("cancel_appointment"));
        assert!(!registry.is_mutating("list_appointments"));
        assert!(registry.is_terminal(END_CALL));
        assert!(!registry.is_mutating("teleport"));
    }

    #[test]
    fn test_unknown_name_is_typed_error() {
        let err = default_registry().get("teleport").err().unwrap();
        assert_eq!(err, CapabilityError::UnknownCapability("teleport".to_string()));
    }

    #[test]
    fn test_validate_checks_types() {
        let list = ListAppointments;
        assert!(list.validate(&json!({ "refresh": true })).is_ok());
        assert!(list.validate(&Value::Null).is_ok());
        assert!(matches!(
            list.validate(&json!({ "refresh": "yes" })),
            Err(CapabilityError::InvalidArguments(_))
        ));
        assert!(list.validate(&json!(["refresh"])).is_err());
    }

    #[test]
    fn test_string_arg_ignores_blank() {
        let args = json!({ "date": "  Friday ", "time": "   " });
        assert_eq!(string_arg(&args, "date"), Some("Friday"));
        assert_eq!(string_arg(&args, "time"), None);
        assert_eq!(string_arg(&args, "missing"), None);
    }
}

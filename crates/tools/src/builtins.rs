//! Built-in tools.
//!
//! `getWeatherInformation` is gated behind human confirmation;
//! `getLocalTime` is trusted to auto-run. Tool names are part of the wire
//! contract with the model and stay camelCase.

use std::sync::Arc;

use serde_json::{json, Value};

use ga_domain::error::Error;

use crate::registry::{ToolDescriptor, ToolHandler, ToolRegistry};

/// A registry pre-loaded with the built-in tools.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(get_weather_information());
    registry.register(get_local_time());
    registry
}

/// Weather lookup. Gated: the human must approve each call before it runs.
pub fn get_weather_information() -> ToolDescriptor {
    ToolDescriptor {
        name: "getWeatherInformation".into(),
        description: "Show the weather in a given city to the user.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "City to look up" }
            },
            "required": ["city"]
        }),
        handler: ToolHandler::Gated(Arc::new(|args, _ctx| {
            Box::pin(async move {
                let city = required_str(&args, "city")?;
                Ok(json!(format!("The weather in {city} is sunny")))
            })
        })),
    }
}

/// Local time lookup. Trusted to auto-run without confirmation.
pub fn get_local_time() -> ToolDescriptor {
    ToolDescriptor {
        name: "getLocalTime".into(),
        description: "Get the local time for a specified location.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "Location to look up" }
            },
            "required": ["location"]
        }),
        handler: ToolHandler::Auto(Arc::new(|args, _ctx| {
            Box::pin(async move {
                let location = required_str(&args, "location")?;
                tracing::debug!(%location, "getLocalTime");
                Ok(json!("10am"))
            })
        })),
    }
}

fn required_str(args: &Value, key: &str) -> Result<String, Error> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::Other(format!("missing required argument: {key}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;

    #[test]
    fn builtin_registry_contents() {
        let reg = builtin_registry();
        assert_eq!(reg.len(), 2);
        assert!(reg.requires_confirmation("getWeatherInformation"));
        assert!(!reg.requires_confirmation("getLocalTime"));
    }

    #[tokio::test]
    async fn weather_executes_with_city() {
        let desc = get_weather_information();
        let f = desc.handler.execute_fn();
        let out = f(json!({"city": "Paris"}), ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(out, json!("The weather in Paris is sunny"));
    }

    #[tokio::test]
    async fn weather_missing_city_errors() {
        let desc = get_weather_information();
        let f = desc.handler.execute_fn();
        assert!(f(json!({}), ExecutionContext::new()).await.is_err());
    }

    #[tokio::test]
    async fn local_time_executes() {
        let desc = get_local_time();
        let f = desc.handler.execute_fn();
        let out = f(json!({"location": "Paris"}), ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(out, json!("10am"));
    }
}

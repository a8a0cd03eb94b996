//! Synchronous tool listing endpoint.

use agui_core::ToolDescriptor;
use axum::Json;
use serde_json::json;

/// GET /tools
pub async fn handler() -> Json<serde_json::Value> {
    Json(json!({ "tools": catalog() }))
}

/// The tools the producer recipes reference.
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "generate_haiku".to_string(),
            description: "Compose a haiku in Japanese with an English translation".to_string(),
            tags: vec!["creative".to_string(), "text".to_string()],
            capabilities: vec!["generative-ui".to_string()],
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Subject of the haiku"
                    }
                },
                "required": ["topic"]
            }),
        },
        ToolDescriptor {
            name: "get_weather".to_string(),
            description: "Look up current weather conditions for a location".to_string(),
            tags: vec!["data".to_string()],
            capabilities: vec!["chat".to_string()],
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City or region name"
                    },
                    "unit": {
                        "type": "string",
                        "enum": ["celsius", "fahrenheit"]
                    }
                },
                "required": ["location"]
            }),
        },
        ToolDescriptor {
            name: "generate_task_steps".to_string(),
            description: "Propose an ordered task plan for operator approval".to_string(),
            tags: vec!["planning".to_string()],
            capabilities: vec!["human-in-the-loop".to_string()],
            parameters: json!({
                "type": "object",
                "properties": {
                    "steps": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "step": { "type": "integer" },
                                "description": { "type": "string" }
                            },
                            "required": ["step", "description"]
                        }
                    }
                },
                "required": ["steps"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let tools = catalog();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn test_catalog_parameters_are_object_schemas() {
        for tool in catalog() {
            assert_eq!(tool.parameters["type"], "object", "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }
}

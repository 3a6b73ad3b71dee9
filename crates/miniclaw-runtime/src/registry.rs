use miniclaw_core::{AgentTool, MiniclawError, Result, Tool, ToolContext};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed catalogue of the tools the model may call.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the filesystem, shell and web tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::tools::register_builtins(&mut registry);
        registry
    }

    /// Add a tool, replacing any tool already registered under its name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool schemas for the chat backend, sorted by name.
    pub fn definitions(&self) -> Vec<Tool> {
        let mut defs: Vec<Tool> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate `input` against the tool's schema and run it.
    pub async fn execute(&self, ctx: &ToolContext, name: &str, input: Value) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| MiniclawError::ToolNotFound(name.to_string()))?;
        let input = if input.is_null() {
            Value::Object(Default::default())
        } else {
            input
        };
        validate_input(&tool.definition(), &input)?;
        tool.execute(ctx, input).await
    }
}

/// Check required fields and the primitive `type` of each declared property.
pub fn validate_input(def: &Tool, input: &Value) -> Result<()> {
    let invalid = |reason: String| MiniclawError::InvalidToolInput {
        tool: def.name.clone(),
        reason,
    };

    let Some(obj) = input.as_object() else {
        return Err(invalid("input must be a JSON object".into()));
    };

    for field in def.parameters["required"].as_array().into_iter().flatten() {
        let Some(field) = field.as_str() else { continue };
        if obj.get(field).is_none_or(Value::is_null) {
            return Err(invalid(format!("missing required field '{field}'")));
        }
    }

    let Some(props) = def.parameters["properties"].as_object() else {
        return Ok(());
    };
    for (key, value) in obj {
        let Some(expected) = props.get(key).and_then(|p| p["type"].as_str()) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !matches {
            return Err(invalid(format!("field '{key}' must be of type {expected}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def() -> Tool {
        Tool {
            name: "t".into(),
            description: String::new(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "count": {"type": "integer"},
                    "ratio": {"type": "number"},
                    "flags": {"type": "array"}
                },
                "required": ["path"]
            }),
        }
    }

    #[test]
    fn test_accepts_matching_input() {
        let input = json!({"path": "a", "count": 3, "ratio": 0.5, "flags": [], "extra": true});
        assert!(validate_input(&def(), &input).is_ok());
    }

    #[test]
    fn test_rejects_missing_required() {
        let err = validate_input(&def(), &json!({"count": 1})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid input for t: missing required field 'path'"
        );
        assert!(validate_input(&def(), &json!({"path": null})).is_err());
    }

    #[test]
    fn test_rejects_wrong_types() {
        assert!(validate_input(&def(), &json!({"path": 5})).is_err());
        assert!(validate_input(&def(), &json!({"path": "a", "count": 1.5})).is_err());
        assert!(validate_input(&def(), &json!({"path": "a", "ratio": "x"})).is_err());
        assert!(validate_input(&def(), &json!("not an object")).is_err());
    }
}

//! Tool metadata: typed signatures and parameter schemas.
//!
//! Tools are records, not a class hierarchy. A [`ToolSpec`] describes a
//! path tool (a graph edge transforming one [`WorkflowType`] into
//! another); an [`AgentToolSpec`] describes a utility an agent may call
//! during its LLM reasoning. Both carry parameter schemas as data so the
//! Router and the argument binder can consume them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::workflow::WorkflowType;

/// The primitive or file kind of a tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    /// A file artifact of the given workflow type.
    File {
        file_type: WorkflowType,
    },
}

impl ParamKind {
    /// JSON-schema type string for this kind.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::Str | ParamKind::File { .. } => "string",
            ParamKind::Int => "integer",
            ParamKind::Float => "number",
            ParamKind::Bool => "boolean",
        }
    }

    /// Whether a bound JSON value is acceptable for this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Str | ParamKind::File { .. } => value.is_string(),
            ParamKind::Int => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::Bool => value.is_boolean(),
        }
    }
}

/// One entry in a tool's ordered parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
    /// Optional default, used as the last binding fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParam {
    /// A required parameter with no default.
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
            default: None,
        }
    }

    /// An optional parameter, with or without a default.
    pub fn optional(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
            default,
        }
    }
}

/// Metadata for a path tool: a directed edge in the type graph.
///
/// The handler itself is opaque to this crate; `genesis-core` pairs the
/// spec with an `Arc<dyn ToolHandler>` at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_type: WorkflowType,
    pub output_type: WorkflowType,
    /// Ordered parameter schema.
    pub params: Vec<ToolParam>,
    /// Relative preference weight used as a sort tiebreaker between
    /// candidate paths of equal length. Defaults to 0.
    #[serde(default)]
    pub preferred: i32,
}

impl ToolSpec {
    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ToolParam> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON schema (object form) for this tool's parameters, suitable
    /// for inclusion in an agent prompt or function-calling payload.
    pub fn params_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            let mut prop = json!({
                "type": p.kind.json_type(),
                "description": p.description,
            });
            if let ParamKind::File { file_type } = &p.kind {
                prop["format"] = json!("path");
                prop["file_type"] = serde_json::to_value(file_type).unwrap_or(Value::Null);
            }
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            properties.insert(p.name.clone(), prop);
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Metadata for an agent tool: invoked directly by an agent during its
/// LLM call. Never participates in path planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_spec() -> ToolSpec {
        ToolSpec {
            name: "image_overlay".into(),
            description: "Draw a caption onto an image".into(),
            input_type: WorkflowType::Image,
            output_type: WorkflowType::Image,
            params: vec![
                ToolParam::required(
                    "image",
                    ParamKind::File {
                        file_type: WorkflowType::Image,
                    },
                    "Image to draw on",
                ),
                ToolParam::required("caption_text", ParamKind::Str, "Text to overlay"),
                ToolParam::optional(
                    "font_size",
                    ParamKind::Int,
                    "Font size in points",
                    Some(json!(24)),
                ),
            ],
            preferred: 0,
        }
    }

    #[test]
    fn param_lookup() {
        let spec = overlay_spec();
        assert!(spec.param("caption_text").is_some());
        assert!(spec.param("nope").is_none());
    }

    #[test]
    fn schema_lists_required_params() {
        let schema = overlay_spec().params_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["image", "caption_text"]);
        assert_eq!(schema["properties"]["font_size"]["default"], json!(24));
    }

    #[test]
    fn file_params_carry_their_type() {
        let schema = overlay_spec().params_schema();
        assert_eq!(schema["properties"]["image"]["file_type"], json!("IMAGE"));
    }

    #[test]
    fn param_kind_accepts_values() {
        assert!(ParamKind::Str.accepts(&json!("hi")));
        assert!(!ParamKind::Str.accepts(&json!(3)));
        assert!(ParamKind::Int.accepts(&json!(3)));
        assert!(!ParamKind::Int.accepts(&json!(3.5)));
        assert!(ParamKind::Float.accepts(&json!(3)));
        assert!(ParamKind::Bool.accepts(&json!(true)));
    }

    #[test]
    fn spec_roundtrips_through_serde() {
        let spec = overlay_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let back: ToolSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}

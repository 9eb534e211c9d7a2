//! Capability definitions and request/response types
//!
//! A [`CapabilityDefinition`] is the static allowlist entry for one remote
//! Termux command: its template, its typed parameters, and the shape its
//! output is expected to take.

use crate::errors::{BridgeError, Result};
use crate::tools::template::CommandTemplate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Expected shape of a capability's standard output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultShape {
    /// One mapping of field name to value
    StructuredKv,

    /// Repeated record blocks
    ListOfRecords,

    /// Trimmed output returned verbatim
    RawText,
}

/// How a non-zero exit status is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NonZeroExit {
    /// Always a failure carrying stderr
    Failure,

    /// Non-zero exit with empty output means "no data"
    EmptyResult,
}

/// Declared type of a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Integer (JSON number or numeric string) within an inclusive range
    Integer { min: i64, max: i64 },

    /// Decimal number within an inclusive range
    Float { min: f64, max: f64 },

    /// Integer within a range, or one of a few keywords (e.g. brightness `auto`)
    IntegerOrKeyword {
        min: i64,
        max: i64,
        keywords: Vec<String>,
    },

    Boolean,

    /// Enumerated choice
    Choice(Vec<String>),

    /// Bounded-length free text
    Text { max_len: usize },

    /// Comma-separated phone numbers
    PhoneList,

    /// Device filesystem path
    Path { max_len: usize },

    /// List of device filesystem paths, rendered as separate words
    PathList { max_items: usize },

    /// http(s) URL
    Url,

    /// Comma-separated integers (e.g. an infrared pattern)
    IntList { max_items: usize },
}

impl ParamKind {
    pub fn integer(min: i64, max: i64) -> Self {
        ParamKind::Integer { min, max }
    }

    pub fn choice(options: &[&str]) -> Self {
        ParamKind::Choice(options.iter().map(|s| s.to_string()).collect())
    }

    pub fn text(max_len: usize) -> Self {
        ParamKind::Text { max_len }
    }

    pub fn path() -> Self {
        ParamKind::Path { max_len: 1024 }
    }

    /// JSON Schema fragment for this kind
    pub fn json_schema(&self) -> Value {
        match self {
            ParamKind::Integer { min, max } => {
                json!({ "type": "integer", "minimum": min, "maximum": max })
            }
            ParamKind::Float { min, max } => {
                json!({ "type": "number", "minimum": min, "maximum": max })
            }
            ParamKind::IntegerOrKeyword { min, max, keywords } => json!({
                "anyOf": [
                    { "type": "integer", "minimum": min, "maximum": max },
                    { "type": "string", "enum": keywords }
                ]
            }),
            ParamKind::Boolean => json!({ "type": "boolean" }),
            ParamKind::Choice(options) => json!({ "type": "string", "enum": options }),
            ParamKind::Text { max_len } => json!({ "type": "string", "maxLength": max_len }),
            ParamKind::PhoneList => json!({
                "type": "string",
                "description": "Phone number(s), comma-separated"
            }),
            ParamKind::Path { max_len } => json!({ "type": "string", "maxLength": max_len }),
            ParamKind::PathList { max_items } => json!({
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
                "maxItems": max_items
            }),
            ParamKind::Url => json!({ "type": "string", "format": "uri" }),
            ParamKind::IntList { .. } => json!({
                "type": "string",
                "description": "Comma-separated non-negative integers"
            }),
        }
    }
}

/// One declared parameter of a capability
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Value used when the caller omits this parameter
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Static allowlist entry for one remote command
#[derive(Debug, Clone)]
pub struct CapabilityDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub template: CommandTemplate,
    pub shape: ResultShape,
    pub non_zero_exit: NonZeroExit,

    /// Per-capability deadline; falls back to the configured default
    pub timeout: Option<Duration>,

    /// Text returned when an action succeeds with no output
    pub ack: Option<String>,

    /// Exactly one of these parameters must be supplied
    pub one_of: Vec<String>,
}

impl CapabilityDefinition {
    /// Create a definition, compiling its command template
    pub fn new(name: &str, description: &str, template: &str, shape: ResultShape) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
            template: CommandTemplate::parse(template)?,
            shape,
            non_zero_exit: NonZeroExit::Failure,
            timeout: None,
            ack: None,
            one_of: Vec::new(),
        })
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_ack(mut self, ack: &str) -> Self {
        self.ack = Some(ack.to_string());
        self
    }

    /// Declare that non-zero exit with empty output means "no data"
    pub fn empty_on_non_zero(mut self) -> Self {
        self.non_zero_exit = NonZeroExit::EmptyResult;
        self
    }

    pub fn exactly_one_of(mut self, names: &[&str]) -> Self {
        self.one_of = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Look up a parameter spec by name
    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Tool name published over MCP (`termux_battery_status`)
    pub fn tool_name(&self) -> String {
        format!("termux_{}", self.name.replace('-', "_"))
    }

    /// JSON Schema describing the accepted arguments
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for spec in &self.params {
            let mut schema = spec.kind.json_schema();
            if let Value::Object(ref mut obj) = schema {
                if !spec.description.is_empty() {
                    obj.insert("description".into(), Value::String(spec.description.clone()));
                }
                if let Some(default) = &spec.default {
                    obj.insert("default".into(), default.clone());
                }
            }
            properties.insert(spec.name.clone(), schema);
            if spec.required {
                required.push(Value::String(spec.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

/// A parameter value that passed validation and is safe to interpolate
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),

    /// Already shell-quoted word
    Quoted(String),

    /// Several already shell-quoted words
    QuotedList(Vec<String>),
}

impl ValidatedValue {
    /// Words this value contributes to a command line
    pub fn render_words(&self) -> Vec<String> {
        match self {
            ValidatedValue::Integer(n) => vec![n.to_string()],
            ValidatedValue::Float(f) => vec![f.to_string()],
            ValidatedValue::Boolean(b) => vec![b.to_string()],
            ValidatedValue::Quoted(s) => vec![s.clone()],
            ValidatedValue::QuotedList(items) => items.clone(),
        }
    }
}

/// Validated parameters keyed by name
pub type ValidatedParams = BTreeMap<String, ValidatedValue>;

/// One inbound invocation after validation
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub capability: String,
    pub params: ValidatedParams,
}

impl ExecutionRequest {
    pub fn new(capability: impl Into<String>, params: ValidatedParams) -> Self {
        Self {
            capability: capability.into(),
            params,
        }
    }

    /// Substitute the validated parameters into the capability's template
    pub fn command_line(&self, definition: &CapabilityDefinition) -> String {
        definition.template.render(&self.params)
    }
}

/// Interpreted output of one capability
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedBody {
    /// structured-kv
    Fields { fields: Map<String, Value> },

    /// list-of-records; `skipped` counts malformed blocks
    Records {
        records: Vec<Map<String, Value>>,
        skipped: usize,
    },

    /// raw-text
    Text { text: String },
}

impl ParsedBody {
    /// JSON object suitable for MCP `structuredContent`
    pub fn to_structured(&self) -> Value {
        match self {
            ParsedBody::Fields { fields } => Value::Object(fields.clone()),
            ParsedBody::Records { records, skipped } => json!({
                "records": records,
                "skipped": skipped
            }),
            ParsedBody::Text { text } => json!({ "text": text }),
        }
    }

    /// Human-readable rendering for text content blocks
    pub fn to_display_text(&self) -> String {
        match self {
            ParsedBody::Text { text } => text.clone(),
            other => serde_json::to_string_pretty(&other.to_structured())
                .unwrap_or_else(|_| other.to_structured().to_string()),
        }
    }
}

/// Result handed back to the protocol adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResponse {
    pub capability: String,
    pub success: bool,
    pub exit_code: i32,
    pub body: ParsedBody,

    /// stderr (or a synthesized message) when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// stdout was cut at the output cap
    pub truncated: bool,
}

/// Inbound tool invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Outbound protocol-level response
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse {
    Ok { response: ParsedResponse },
    Error {
        kind: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
}

impl ToolResponse {
    /// Typed error response; malformed output keeps its raw text
    pub fn from_error(error: &BridgeError) -> Self {
        let raw = match error {
            BridgeError::MalformedOutput { raw, .. } => Some(raw.clone()),
            _ => None,
        };
        ToolResponse::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder() {
        let def = CapabilityDefinition::new(
            "vibrate",
            "Vibrate the device",
            "termux-vibrate [-d {duration}] [-f {force}]",
            ResultShape::RawText,
        )
        .unwrap()
        .param(
            ParamSpec::optional("duration", ParamKind::integer(1, 10_000), "Milliseconds")
                .with_default(json!(1000)),
        )
        .param(ParamSpec::optional("force", ParamKind::Boolean, "Vibrate in silent mode"))
        .with_ack("Vibration triggered");

        assert_eq!(def.tool_name(), "termux_vibrate");
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.non_zero_exit, NonZeroExit::Failure);
        assert!(def.param_spec("force").is_some());
        assert!(def.param_spec("missing").is_none());
    }

    #[test]
    fn test_input_schema_required_and_defaults() {
        let def = CapabilityDefinition::new(
            "sms-send",
            "Send SMS",
            "termux-sms-send -n {numbers} {text}",
            ResultShape::RawText,
        )
        .unwrap()
        .param(ParamSpec::required("numbers", ParamKind::PhoneList, "Recipients"))
        .param(ParamSpec::required("text", ParamKind::text(1600), "Body"));

        let schema = def.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["numbers", "text"]));
        assert_eq!(schema["properties"]["text"]["maxLength"], 1600);
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_body_structured_forms() {
        let body = ParsedBody::Records {
            records: vec![],
            skipped: 2,
        };
        assert_eq!(body.to_structured()["skipped"], 2);

        let text = ParsedBody::Text {
            text: "hello".into(),
        };
        assert_eq!(text.to_display_text(), "hello");
        assert_eq!(text.to_structured()["text"], "hello");
    }

    #[test]
    fn test_error_response_keeps_raw() {
        let err = BridgeError::MalformedOutput {
            capability: "battery-status".into(),
            reason: "no key/value pairs found".into(),
            raw: "???".into(),
        };
        let value = serde_json::to_value(ToolResponse::from_error(&err)).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "malformed_output");
        assert_eq!(value["raw"], "???");

        let err = BridgeError::CommandNotAllowed { name: "rm".into() };
        let value = serde_json::to_value(ToolResponse::from_error(&err)).unwrap();
        assert!(value.get("raw").is_none());
    }

    #[test]
    fn test_validated_value_words() {
        assert_eq!(ValidatedValue::Integer(5).render_words(), vec!["5"]);
        assert_eq!(ValidatedValue::Boolean(false).render_words(), vec!["false"]);
        assert_eq!(
            ValidatedValue::QuotedList(vec!["'a'".into(), "'b'".into()]).render_words(),
            vec!["'a'", "'b'"]
        );
    }
}

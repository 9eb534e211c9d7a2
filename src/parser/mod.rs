//! Result parser
//!
//! One entry point, [`parse`], interprets an [`ExecutionResult`] according to
//! the capability's declared [`ResultShape`]. Adding a capability never adds
//! parsing control flow here; it only picks a shape.

mod kv;
mod records;

use crate::errors::{BridgeError, Result};
use crate::execution::ExecutionResult;
use crate::tools::types::{CapabilityDefinition, NonZeroExit, ParsedBody, ParsedResponse, ResultShape};
use serde_json::{Map, Value};
use tracing::debug;

/// Interpret one command's output
///
/// Structured shapes never parse a stdout that was cut at the output cap;
/// raw text is returned as-is with `truncated` set.
pub fn parse(definition: &CapabilityDefinition, result: &ExecutionResult) -> Result<ParsedResponse> {
    if !result.success() {
        return Ok(parse_non_zero(definition, result));
    }

    if result.truncated && definition.shape != ResultShape::RawText {
        return Err(malformed(
            &definition.name,
            &format!("output exceeded the cap and was truncated at {} bytes", result.stdout.len()),
            &result.stdout,
        ));
    }

    let body = match definition.shape {
        ResultShape::StructuredKv => {
            kv::parse_fields(&definition.name, definition.ack.as_deref(), &result.stdout)?
        }
        ResultShape::ListOfRecords => records::parse_records(&definition.name, &result.stdout)?,
        ResultShape::RawText => parse_text(definition.ack.as_deref(), &result.stdout),
    };

    Ok(ParsedResponse {
        capability: definition.name.clone(),
        success: true,
        exit_code: result.exit_code,
        body,
        error: None,
        truncated: result.truncated,
    })
}

fn parse_text(ack: Option<&str>, stdout: &str) -> ParsedBody {
    let text = stdout.trim();
    let text = match ack {
        Some(ack) if text.is_empty() => ack,
        _ => text,
    };
    ParsedBody::Text {
        text: text.to_string(),
    }
}

fn parse_non_zero(definition: &CapabilityDefinition, result: &ExecutionResult) -> ParsedResponse {
    let no_output = result.stdout.trim().is_empty();

    if definition.non_zero_exit == NonZeroExit::EmptyResult && no_output {
        debug!(
            capability = %definition.name,
            exit_code = result.exit_code,
            "non-zero exit with no output treated as empty result"
        );
        return ParsedResponse {
            capability: definition.name.clone(),
            success: true,
            exit_code: result.exit_code,
            body: empty_body(definition.shape),
            error: None,
            truncated: false,
        };
    }

    let stderr = result.stderr.trim();
    let error = if stderr.is_empty() {
        format!("exited with code {}", result.exit_code)
    } else {
        stderr.to_string()
    };

    let body = if no_output {
        empty_body(definition.shape)
    } else {
        ParsedBody::Text {
            text: result.stdout.trim().to_string(),
        }
    };

    ParsedResponse {
        capability: definition.name.clone(),
        success: false,
        exit_code: result.exit_code,
        body,
        error: Some(error),
        truncated: result.truncated,
    }
}

fn empty_body(shape: ResultShape) -> ParsedBody {
    match shape {
        ResultShape::StructuredKv => ParsedBody::Fields { fields: Map::new() },
        ResultShape::ListOfRecords => ParsedBody::Records {
            records: Vec::new(),
            skipped: 0,
        },
        ResultShape::RawText => ParsedBody::Text {
            text: String::new(),
        },
    }
}

/// Parse output that opens like a JSON document
///
/// `Ok(None)` when it does not start with `{` or `[`. Output that starts
/// like JSON but does not parse is malformed, never re-read as text.
fn json_document(capability: &str, trimmed: &str, raw: &str) -> Result<Option<Value>> {
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| malformed(capability, &format!("invalid JSON: {}", e), raw))
}

fn malformed(capability: &str, reason: &str, raw: &str) -> BridgeError {
    BridgeError::MalformedOutput {
        capability: capability.to_string(),
        reason: reason.to_string(),
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
            truncated: false,
        }
    }

    fn def(name: &str, shape: ResultShape) -> CapabilityDefinition {
        CapabilityDefinition::new(name, name, &format!("termux-{}", name), shape).unwrap()
    }

    #[test]
    fn test_battery_structured_kv() {
        let parsed = parse(
            &def("get-battery-status", ResultShape::StructuredKv),
            &result(0, "level: 82\nstatus: charging\n", ""),
        )
        .unwrap();

        assert!(parsed.success);
        assert_eq!(parsed.capability, "get-battery-status");
        match parsed.body {
            ParsedBody::Fields { fields } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["level"], "82");
                assert_eq!(fields["status"], "charging");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_raw_text_trimmed() {
        let parsed = parse(
            &def("clipboard-get", ResultShape::RawText),
            &result(0, "\n  copied text \n", ""),
        )
        .unwrap();
        assert_eq!(parsed.body, ParsedBody::Text { text: "copied text".into() });
    }

    #[test]
    fn test_ack_for_silent_action() {
        let definition = def("toast", ResultShape::RawText).with_ack("Toast shown");
        let parsed = parse(&definition, &result(0, "", "")).unwrap();
        assert_eq!(parsed.body, ParsedBody::Text { text: "Toast shown".into() });
    }

    #[test]
    fn test_empty_result_convention() {
        let definition = def("call-log", ResultShape::ListOfRecords).empty_on_non_zero();
        let parsed = parse(&definition, &result(1, "", "")).unwrap();

        assert!(parsed.success);
        assert_eq!(parsed.exit_code, 1);
        assert_eq!(
            parsed.body,
            ParsedBody::Records {
                records: vec![],
                skipped: 0
            }
        );
    }

    #[test]
    fn test_empty_result_convention_needs_empty_output() {
        let definition = def("call-log", ResultShape::ListOfRecords).empty_on_non_zero();
        let parsed = parse(&definition, &result(1, "partial", "boom")).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_non_zero_without_convention_is_failure() {
        let definition = def("sms-list", ResultShape::ListOfRecords);

        let parsed = parse(&definition, &result(2, "", "Permission denied: READ_SMS\n")).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("Permission denied: READ_SMS"));

        let parsed = parse(&definition, &result(3, "", "")).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("exited with code 3"));
    }

    #[test]
    fn test_malformed_propagates() {
        let err = parse(
            &def("battery-status", ResultShape::StructuredKv),
            &result(0, "???\n", ""),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "malformed_output");
    }

    #[test]
    fn test_json_document_detection() {
        assert!(json_document("x", "{\"a\": 1}", "").unwrap().is_some());
        assert!(json_document("x", "[1]", "").unwrap().is_some());
        assert!(json_document("x", "a: 1", "").unwrap().is_none());

        let err = json_document("x", "[ERROR] nope", "[ERROR] nope\n").unwrap_err();
        assert_eq!(err.kind(), "malformed_output");
    }

    #[test]
    fn test_broken_json_is_malformed() {
        let stdout = "{\n  \"latitude\": 52.52,\n  \"longitude\": 13.4";
        match parse(&def("location", ResultShape::StructuredKv), &result(0, stdout, "")) {
            Err(BridgeError::MalformedOutput { raw, reason, .. }) => {
                assert_eq!(raw, stdout);
                assert!(reason.contains("JSON"));
            }
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_structured_output_is_malformed() {
        let mut cut = result(0, "level: 82\nstatus: char", "");
        cut.truncated = true;

        let err = parse(&def("battery-status", ResultShape::StructuredKv), &cut).unwrap_err();
        assert_eq!(err.kind(), "malformed_output");

        let err = parse(&def("sms-list", ResultShape::ListOfRecords), &cut).unwrap_err();
        assert_eq!(err.kind(), "malformed_output");
    }

    #[test]
    fn test_truncated_text_is_flagged() {
        let mut cut = result(0, "first part of a long clip", "");
        cut.truncated = true;

        let parsed = parse(&def("clipboard-get", ResultShape::RawText), &cut).unwrap();
        assert!(parsed.success);
        assert!(parsed.truncated);

        let whole = parse(&def("clipboard-get", ResultShape::RawText), &result(0, "all", "")).unwrap();
        assert!(!whole.truncated);
    }
}

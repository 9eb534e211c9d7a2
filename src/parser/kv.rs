//! structured-kv parsing

use crate::errors::Result;
use crate::parser::{json_document, malformed};
use crate::tools::types::ParsedBody;
use serde_json::{Map, Value};

/// Split `key: value` or `key=value` on the first delimiter.
/// Returns `None` for lines without a delimiter or with an empty key.
pub(crate) fn parse_line(line: &str) -> Option<(String, String)> {
    let idx = line.find([':', '='])?;
    let key = line[..idx].trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), line[idx + 1..].trim().to_string()))
}

/// Parse one mapping of fields
///
/// A JSON object is taken as-is. Otherwise each line is a key/value pair;
/// lines that do not parse are dropped individually.
pub(crate) fn parse_fields(capability: &str, ack: Option<&str>, stdout: &str) -> Result<ParsedBody> {
    let trimmed = stdout.trim();

    if trimmed.is_empty() {
        return Ok(match ack {
            Some(ack) => ParsedBody::Text {
                text: ack.to_string(),
            },
            None => ParsedBody::Fields { fields: Map::new() },
        });
    }

    if let Some(document) = json_document(capability, trimmed, stdout)? {
        return match document {
            Value::Object(fields) => Ok(ParsedBody::Fields { fields }),
            _ => Err(malformed(capability, "expected a JSON object", stdout)),
        };
    }

    let fields: Map<String, Value> = trimmed
        .lines()
        .filter_map(parse_line)
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    if fields.is_empty() {
        return Err(malformed(capability, "no key/value pairs found", stdout));
    }

    Ok(ParsedBody::Fields { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BridgeError;
    use serde_json::json;

    fn fields(body: ParsedBody) -> Map<String, Value> {
        match body {
            ParsedBody::Fields { fields } => fields,
            other => panic!("expected fields, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("level: 82"), Some(("level".into(), "82".into())));
        assert_eq!(parse_line("status=charging"), Some(("status".into(), "charging".into())));
        assert_eq!(
            parse_line("time: 12:30:01"),
            Some(("time".into(), "12:30:01".into()))
        );
        assert_eq!(parse_line("no delimiter here"), None);
        assert_eq!(parse_line(": orphan value"), None);
    }

    #[test]
    fn test_line_format() {
        let body = parse_fields("battery-status", None, "level: 82\nstatus: charging\n").unwrap();
        let fields = fields(body);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["level"], "82");
        assert_eq!(fields["status"], "charging");
    }

    #[test]
    fn test_bad_lines_dropped() {
        let body = parse_fields("x", None, "level: 82\ngarbage\n\ntemperature=31.5").unwrap();
        let fields = fields(body);
        assert_eq!(fields.len(), 2);
        assert!(fields.contains_key("temperature"));
    }

    #[test]
    fn test_json_object() {
        let out = r#"{"health": "GOOD", "percentage": 82, "plugged": "PLUGGED_USB"}"#;
        let fields = fields(parse_fields("battery-status", None, out).unwrap());
        assert_eq!(fields["percentage"], json!(82));
    }

    #[test]
    fn test_broken_json_not_read_as_lines() {
        let out = "{\n  \"percentage\": 82,\n  \"status\": \"CHARG";
        match parse_fields("battery-status", None, out) {
            Err(BridgeError::MalformedOutput { raw, .. }) => assert_eq!(raw, out),
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_json_array_is_malformed() {
        let err = parse_fields("x", None, "[1, 2]").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedOutput { .. }));
    }

    #[test]
    fn test_zero_fields_is_malformed_with_raw() {
        match parse_fields("battery-status", None, "termux-api not installed\n") {
            Err(BridgeError::MalformedOutput { capability, raw, .. }) => {
                assert_eq!(capability, "battery-status");
                assert_eq!(raw, "termux-api not installed\n");
            }
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(
            parse_fields("x", None, "  \n").unwrap(),
            ParsedBody::Fields { fields: Map::new() }
        );
        assert_eq!(
            parse_fields("x", Some("Done"), "").unwrap(),
            ParsedBody::Text { text: "Done".into() }
        );
    }
}

//! Parameter validation and shell quoting
//!
//! Every caller-supplied value crosses this boundary before it can reach a
//! command line. Validation is all-or-nothing: the first offending field
//! produces [`BridgeError::InvalidParameter`] and no template is rendered.
//!
//! Two independent layers apply to every string-typed value:
//! 1. Rejection of shell metacharacters, control characters and a leading
//!    `-` (which the remote command would read as an option).
//! 2. Single-quoting with embedded `'` rewritten as `'\''`, so even a value
//!    that slipped past layer 1 is one literal word to the remote shell.

use crate::errors::{BridgeError, Result};
use crate::tools::types::{CapabilityDefinition, ParamKind, ValidatedParams, ValidatedValue};
use serde_json::{Map, Value};

/// Characters that can alter command structure in a POSIX shell
pub const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '`', '$', '<', '>', '\n', '\r', '\0'];

/// Maximum length of a single phone number (digits and optional '+')
const MAX_PHONE_LEN: usize = 20;

/// Quote a value as one literal shell word
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Validate raw arguments against a capability's parameter specs
pub fn validate(
    definition: &CapabilityDefinition,
    raw: &Map<String, Value>,
) -> Result<ValidatedParams> {
    for name in raw.keys() {
        if definition.param_spec(name).is_none() {
            return Err(BridgeError::invalid_parameter(name, "unknown parameter"));
        }
    }

    let mut validated = ValidatedParams::new();

    for spec in &definition.params {
        let supplied = raw.get(&spec.name).filter(|v| !v.is_null());

        let value = match (supplied, &spec.default) {
            (Some(value), _) => value,
            (None, _) if spec.required => {
                return Err(BridgeError::invalid_parameter(
                    &spec.name,
                    "required parameter is missing",
                ))
            }
            (None, Some(default)) => default,
            (None, None) => continue,
        };

        let checked = check_value(&spec.name, &spec.kind, value)?;
        validated.insert(spec.name.clone(), checked);
    }

    if !definition.one_of.is_empty() {
        let present: Vec<&String> = definition
            .one_of
            .iter()
            .filter(|name| validated.contains_key(name.as_str()))
            .collect();
        if present.len() != 1 {
            return Err(BridgeError::invalid_parameter(
                definition.one_of.join("|"),
                format!(
                    "exactly one of [{}] must be supplied",
                    definition.one_of.join(", ")
                ),
            ));
        }
    }

    Ok(validated)
}

/// Check one value against its declared kind
pub fn check_value(field: &str, kind: &ParamKind, value: &Value) -> Result<ValidatedValue> {
    match kind {
        ParamKind::Integer { min, max } => {
            let n = as_integer(field, value)?;
            check_range(field, n, *min, *max)?;
            Ok(ValidatedValue::Integer(n))
        }

        ParamKind::Float { min, max } => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|f| f.is_finite())
            .ok_or_else(|| BridgeError::invalid_parameter(field, "expected a number"))?;
            if f < *min || f > *max {
                return Err(BridgeError::invalid_parameter(
                    field,
                    format!("{} is outside the range {}..={}", f, min, max),
                ));
            }
            Ok(ValidatedValue::Float(f))
        }

        ParamKind::IntegerOrKeyword { min, max, keywords } => {
            if let Value::String(s) = value {
                if keywords.iter().any(|k| k == s) {
                    return Ok(ValidatedValue::Quoted(shell_quote(s)));
                }
            }
            let n = as_integer(field, value).map_err(|_| {
                BridgeError::invalid_parameter(
                    field,
                    format!("expected an integer or one of: {}", keywords.join(", ")),
                )
            })?;
            check_range(field, n, *min, *max)?;
            Ok(ValidatedValue::Integer(n))
        }

        ParamKind::Boolean => match value {
            Value::Bool(b) => Ok(ValidatedValue::Boolean(*b)),
            Value::String(s) if s == "true" => Ok(ValidatedValue::Boolean(true)),
            Value::String(s) if s == "false" => Ok(ValidatedValue::Boolean(false)),
            _ => Err(BridgeError::invalid_parameter(field, "expected a boolean")),
        },

        ParamKind::Choice(options) => {
            let s = as_str(field, value)?;
            if options.iter().any(|o| o == s) {
                Ok(ValidatedValue::Quoted(shell_quote(s)))
            } else {
                Err(BridgeError::invalid_parameter(
                    field,
                    format!("'{}' is not one of: {}", s, options.join(", ")),
                ))
            }
        }

        ParamKind::Text { max_len } => {
            let s = as_str(field, value)?;
            check_free_text(field, s, *max_len)?;
            Ok(ValidatedValue::Quoted(shell_quote(s)))
        }

        ParamKind::PhoneList => {
            let s = as_str(field, value)?;
            check_free_text(field, s, 256)?;
            for number in s.split(',') {
                check_phone_number(field, number)?;
            }
            Ok(ValidatedValue::Quoted(shell_quote(s)))
        }

        ParamKind::Path { max_len } => {
            let s = as_str(field, value)?;
            check_path(field, s, *max_len)?;
            Ok(ValidatedValue::Quoted(shell_quote(s)))
        }

        ParamKind::PathList { max_items } => {
            let items = value
                .as_array()
                .ok_or_else(|| BridgeError::invalid_parameter(field, "expected an array of paths"))?;
            if items.is_empty() || items.len() > *max_items {
                return Err(BridgeError::invalid_parameter(
                    field,
                    format!("expected between 1 and {} paths", max_items),
                ));
            }
            let mut quoted = Vec::with_capacity(items.len());
            for item in items {
                let s = as_str(field, item)?;
                check_path(field, s, 1024)?;
                quoted.push(shell_quote(s));
            }
            Ok(ValidatedValue::QuotedList(quoted))
        }

        ParamKind::Url => {
            let s = as_str(field, value)?;
            check_free_text(field, s, 2048)?;
            if !(s.starts_with("http://") || s.starts_with("https://")) {
                return Err(BridgeError::invalid_parameter(
                    field,
                    "URL must start with http:// or https://",
                ));
            }
            if s.chars().any(char::is_whitespace) {
                return Err(BridgeError::invalid_parameter(field, "URL must not contain whitespace"));
            }
            Ok(ValidatedValue::Quoted(shell_quote(s)))
        }

        ParamKind::IntList { max_items } => {
            let s = as_str(field, value)?;
            let parts: Vec<&str> = s.split(',').map(str::trim).collect();
            if parts.len() > *max_items {
                return Err(BridgeError::invalid_parameter(
                    field,
                    format!("at most {} values allowed", max_items),
                ));
            }
            let mut normalized = Vec::with_capacity(parts.len());
            for part in parts {
                let n: i64 = part.parse().map_err(|_| {
                    BridgeError::invalid_parameter(field, format!("'{}' is not an integer", part))
                })?;
                if n < 0 {
                    return Err(BridgeError::invalid_parameter(
                        field,
                        format!("'{}' must not be negative", part),
                    ));
                }
                normalized.push(n.to_string());
            }
            Ok(ValidatedValue::Quoted(shell_quote(&normalized.join(","))))
        }
    }
}

fn as_str<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| BridgeError::invalid_parameter(field, "expected a string"))
}

fn as_integer(field: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| BridgeError::invalid_parameter(field, "expected an integer")),
        Value::String(s) => {
            let digits = s.strip_prefix('-').unwrap_or(s);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(BridgeError::invalid_parameter(
                    field,
                    "expected a numeric string",
                ));
            }
            s.parse::<i64>()
                .map_err(|_| BridgeError::invalid_parameter(field, "integer out of range"))
        }
        _ => Err(BridgeError::invalid_parameter(field, "expected an integer")),
    }
}

fn check_range(field: &str, n: i64, min: i64, max: i64) -> Result<()> {
    if n < min || n > max {
        return Err(BridgeError::invalid_parameter(
            field,
            format!("{} is outside the range {}..={}", n, min, max),
        ));
    }
    Ok(())
}

/// Metacharacter, control-character, option-injection and length checks
fn check_free_text(field: &str, s: &str, max_len: usize) -> Result<()> {
    if let Some(c) = s.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(BridgeError::invalid_parameter(
            field,
            format!("contains shell metacharacter {:?}", c),
        ));
    }
    if s.chars().any(char::is_control) {
        return Err(BridgeError::invalid_parameter(
            field,
            "contains a control character",
        ));
    }
    if s.starts_with('-') {
        return Err(BridgeError::invalid_parameter(field, "must not begin with '-'"));
    }
    let len = s.chars().count();
    if len > max_len {
        return Err(BridgeError::invalid_parameter(
            field,
            format!("length {} exceeds maximum {}", len, max_len),
        ));
    }
    Ok(())
}

fn check_path(field: &str, s: &str, max_len: usize) -> Result<()> {
    check_free_text(field, s, max_len)?;
    if s.trim().is_empty() {
        return Err(BridgeError::invalid_parameter(field, "path must not be empty"));
    }
    Ok(())
}

fn check_phone_number(field: &str, number: &str) -> Result<()> {
    let digits = number.strip_prefix('+').unwrap_or(number);
    let valid = !digits.is_empty()
        && number.len() <= MAX_PHONE_LEN
        && digits.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(BridgeError::invalid_parameter(
            field,
            format!("'{}' is not a phone number", number),
        ));
    }
    Ok(())
}

//! list-of-records parsing
//!
//! Accepts a JSON array of objects, or text blocks of `key: value` lines
//! separated by blank lines or `---`.

use crate::errors::Result;
use crate::parser::kv::parse_line;
use crate::parser::{json_document, malformed};
use crate::tools::types::ParsedBody;
use serde_json::{Map, Value};
use tracing::warn;

type Record = Map<String, Value>;

pub(crate) fn parse_records(capability: &str, stdout: &str) -> Result<ParsedBody> {
    let trimmed = stdout.trim();

    if trimmed.is_empty() {
        return Ok(ParsedBody::Records {
            records: Vec::new(),
            skipped: 0,
        });
    }

    let (records, skipped) = match json_document(capability, trimmed, stdout)? {
        Some(Value::Array(items)) => {
            let total = items.len();
            let records: Vec<Record> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect();
            let skipped = total - records.len();
            (records, skipped)
        }
        Some(Value::Object(record)) => (vec![record], 0),
        Some(_) => return Err(malformed(capability, "expected a JSON array of records", stdout)),
        None => {
            let blocks = split_blocks(trimmed);
            let total = blocks.len();
            let records: Vec<Record> = blocks.iter().filter_map(|block| parse_block(block)).collect();
            let skipped = total - records.len();
            (records, skipped)
        }
    };

    if records.is_empty() && skipped > 0 {
        return Err(malformed(
            capability,
            &format!("all {} record blocks were malformed", skipped),
            stdout,
        ));
    }

    if skipped > 0 {
        warn!(capability, skipped, parsed = records.len(), "skipped malformed records");
    }

    Ok(ParsedBody::Records { records, skipped })
}

/// Group lines into blocks on blank lines and `---` separators
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line == "---" {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// A block is well-formed only if every line is a key/value pair
fn parse_block(lines: &[&str]) -> Option<Record> {
    let mut record = Record::new();
    for line in lines {
        let (key, value) = parse_line(line)?;
        record.insert(key, Value::String(value));
    }
    (!record.is_empty()).then_some(record)
}

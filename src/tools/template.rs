//! Static command templates
//!
//! A template is a whitespace-separated list of words. `{name}` occupies a
//! whole word and is replaced by a validated value. `[ ... ]` marks an
//! optional group that is emitted only when every placeholder inside it was
//! supplied; a boolean placeholder inside a group gates the group and emits
//! nothing itself.
//!
//! ```text
//! termux-call-log [-l {limit}] [-o {offset}]
//! termux-vibrate [-d {duration}] [-f {force}]
//! ```
//!
//! Values never pass through string concatenation with unvalidated input:
//! the only words a render can produce are template literals and
//! [`ValidatedValue`] renderings.

use crate::errors::{BridgeError, Result};
use crate::tools::types::{ValidatedParams, ValidatedValue};

#[derive(Debug, Clone, PartialEq)]
enum Word {
    Literal(String),
    Placeholder(String),
    Group(Vec<Word>),
}

/// Compiled command template
#[derive(Debug, Clone, PartialEq)]
pub struct CommandTemplate {
    source: String,
    words: Vec<Word>,
}

impl CommandTemplate {
    /// Compile a template string
    pub fn parse(source: &str) -> Result<Self> {
        // Stack of open groups; the bottom entry is the top-level word list
        let mut stack: Vec<Vec<Word>> = vec![Vec::new()];

        for raw in source.split_whitespace() {
            let mut token = raw;

            while let Some(rest) = token.strip_prefix('[') {
                stack.push(Vec::new());
                token = rest;
            }

            let mut closing = 0;
            while let Some(rest) = token.strip_suffix(']') {
                closing += 1;
                token = rest;
            }

            if !token.is_empty() {
                let word = Self::parse_word(source, token)?;
                // Stack always has at least the top-level entry
                if let Some(current) = stack.last_mut() {
                    current.push(word);
                }
            }

            for _ in 0..closing {
                if stack.len() < 2 {
                    return Err(BridgeError::ConfigError(format!(
                        "Unbalanced ']' in template: {}",
                        source
                    )));
                }
                let group = stack.pop().unwrap_or_default();
                if let Some(parent) = stack.last_mut() {
                    parent.push(Word::Group(group));
                }
            }
        }

        if stack.len() != 1 {
            return Err(BridgeError::ConfigError(format!(
                "Unclosed '[' in template: {}",
                source
            )));
        }

        let words = stack.pop().unwrap_or_default();
        match words.first() {
            Some(Word::Literal(_)) => {}
            _ => {
                return Err(BridgeError::ConfigError(format!(
                    "Template must start with a literal command name: {}",
                    source
                )))
            }
        }

        Ok(Self {
            source: source.to_string(),
            words,
        })
    }

    fn parse_word(source: &str, token: &str) -> Result<Word> {
        if let Some(inner) = token.strip_prefix('{') {
            let name = inner.strip_suffix('}').ok_or_else(|| {
                BridgeError::ConfigError(format!("Malformed placeholder '{}' in: {}", token, source))
            })?;
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(BridgeError::ConfigError(format!(
                    "Invalid placeholder name '{}' in: {}",
                    name, source
                )));
            }
            return Ok(Word::Placeholder(name.to_string()));
        }

        if token.contains('{') || token.contains('}') {
            return Err(BridgeError::ConfigError(format!(
                "Placeholder must occupy a whole word: '{}' in: {}",
                token, source
            )));
        }

        Ok(Word::Literal(token.to_string()))
    }

    /// Original template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every placeholder name, in template order
    pub fn placeholders(&self) -> Vec<&str> {
        fn collect<'a>(words: &'a [Word], out: &mut Vec<&'a str>) {
            for word in words {
                match word {
                    Word::Placeholder(name) => out.push(name),
                    Word::Group(inner) => collect(inner, out),
                    Word::Literal(_) => {}
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.words, &mut out);
        out
    }

    /// Placeholders outside any optional group
    pub fn mandatory_placeholders(&self) -> Vec<&str> {
        self.words
            .iter()
            .filter_map(|w| match w {
                Word::Placeholder(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Render with validated values
    pub fn render(&self, params: &ValidatedParams) -> String {
        let mut out = Vec::new();
        Self::render_words(&self.words, params, false, &mut out);
        out.join(" ")
    }

    /// Returns false if a group must be dropped
    fn render_words(
        words: &[Word],
        params: &ValidatedParams,
        in_group: bool,
        out: &mut Vec<String>,
    ) -> bool {
        for word in words {
            match word {
                Word::Literal(text) => out.push(text.clone()),
                Word::Placeholder(name) => match (params.get(name), in_group) {
                    (None, true) => return false,
                    (None, false) => {}
                    (Some(ValidatedValue::Boolean(flag)), true) => {
                        if !flag {
                            return false;
                        }
                    }
                    (Some(value), _) => out.extend(value.render_words()),
                },
                Word::Group(inner) => {
                    let mut rendered = Vec::new();
                    if Self::render_words(inner, params, true, &mut rendered) {
                        out.extend(rendered);
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn params(pairs: &[(&str, ValidatedValue)]) -> ValidatedParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_plain_command() {
        let t = CommandTemplate::parse("termux-battery-status").unwrap();
        assert_eq!(t.render(&ValidatedParams::new()), "termux-battery-status");
        assert!(t.placeholders().is_empty());
    }

    #[test]
    fn test_optional_groups() {
        let t = CommandTemplate::parse("termux-call-log [-l {limit}] [-o {offset}]").unwrap();
        assert_eq!(t.placeholders(), vec!["limit", "offset"]);
        assert!(t.mandatory_placeholders().is_empty());

        let p = params(&[("limit", ValidatedValue::Integer(5))]);
        assert_eq!(t.render(&p), "termux-call-log -l 5");

        let p = params(&[
            ("limit", ValidatedValue::Integer(5)),
            ("offset", ValidatedValue::Integer(10)),
        ]);
        assert_eq!(t.render(&p), "termux-call-log -l 5 -o 10");
    }

    #[test]
    fn test_boolean_flag_gates_group() {
        let t = CommandTemplate::parse("termux-vibrate [-d {duration}] [-f {force}]").unwrap();

        let on = params(&[("force", ValidatedValue::Boolean(true))]);
        assert_eq!(t.render(&on), "termux-vibrate -f");

        let off = params(&[("force", ValidatedValue::Boolean(false))]);
        assert_eq!(t.render(&off), "termux-vibrate");
    }

    #[test]
    fn test_boolean_outside_group_renders_literal() {
        let t = CommandTemplate::parse("termux-wifi-enable {state}").unwrap();
        let p = params(&[("state", ValidatedValue::Boolean(false))]);
        assert_eq!(t.render(&p), "termux-wifi-enable false");
    }

    #[test]
    fn test_quoted_values_and_lists() {
        let t = CommandTemplate::parse("termux-media-scan [-r {recursive}] {files}").unwrap();
        let p = params(&[(
            "files",
            ValidatedValue::QuotedList(vec!["'/sdcard/a.mp3'".into(), "'/sdcard/b c.mp3'".into()]),
        )]);
        assert_eq!(t.render(&p), "termux-media-scan '/sdcard/a.mp3' '/sdcard/b c.mp3'");
    }

    #[test]
    fn test_nested_groups() {
        let t = CommandTemplate::parse("cmd [-a {a} [-b {b}]]").unwrap();
        let p = params(&[("a", ValidatedValue::Integer(1))]);
        assert_eq!(t.render(&p), "cmd -a 1");
        let p = params(&[("b", ValidatedValue::Integer(2))]);
        assert_eq!(t.render(&p), "cmd");
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert!(CommandTemplate::parse("cmd [-l {limit}").is_err());
        assert!(CommandTemplate::parse("cmd -l {limit}]").is_err());
        assert!(CommandTemplate::parse("cmd -f{force}").is_err());
        assert!(CommandTemplate::parse("cmd {bad-name}").is_err());
        assert!(CommandTemplate::parse("{first} cmd").is_err());
        assert!(CommandTemplate::parse("").is_err());
    }

    // Rendering only ever emits template literals and the supplied words
    #[quickcheck]
    fn prop_render_uses_only_supplied_words(n: i64, flag: bool) -> bool {
        let t = CommandTemplate::parse("cmd [-n {n}] [-f {flag}] {n}").unwrap();
        let p = params(&[
            ("n", ValidatedValue::Integer(n)),
            ("flag", ValidatedValue::Boolean(flag)),
        ]);
        let rendered = t.render(&p);
        let expected = if flag {
            format!("cmd -n {n} -f {n}")
        } else {
            format!("cmd -n {n} {n}")
        };
        rendered == expected
    }
}

//! The on-disk record grammar (`spec.md` §4.2, §6.1).
//!
//! A record is UTF-8, newline-terminated, `key: value` pairs one per line.
//! A value that starts with a newline followed by indented `- ` lines is a
//! list; a value that starts with a newline followed by more deeply indented
//! `key: value` lines is a nested block (used for Consideration options and
//! Quality metrics). Unknown keys are preserved verbatim and rewritten on
//! save, so foreign tooling that adds fields is tolerated.
//!
//! This is the one place Zeus does not reach for `serde`: the wire format is
//! a bespoke human-editable grammar fixed by the spec, not a format a
//! derive macro can target directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, ZeusError};

/// The current schema version this implementation writes and reads.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A single field's value: scalar, list of scalars, or a nested block
/// (itself a list of scalar/list key-value pairs — one level of nesting,
/// which is all the grammar needs for Consideration options and Quality
/// metrics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Scalar(String),
    List(Vec<String>),
    Block(Vec<Record>),
}

/// An ordered key → field map, preserving insertion order so a
/// load-then-save round-trip with no field change is byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    order: Vec<String>,
    fields: BTreeMap<String, Field>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        if !self.fields.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.fields.insert(key.to_string(), Field::Scalar(value.into()));
    }

    pub fn set_list(&mut self, key: &str, values: Vec<String>) {
        if !self.fields.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.fields.insert(key.to_string(), Field::List(values));
    }

    pub fn set_block(&mut self, key: &str, blocks: Vec<Record>) {
        if !self.fields.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.fields.insert(key.to_string(), Field::Block(blocks));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Field::Scalar(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.fields.get(key) {
            Some(Field::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_block(&self, key: &str) -> Option<&[Record]> {
        match self.fields.get(key) {
            Some(Field::Block(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Required scalar field; fails naming the first missing key, per
    /// `spec.md` §4.2 and §7's "validation errors always name the first
    /// offending field".
    pub fn require(&self, key: &str, path: &Path) -> Result<String> {
        self.get(key).map(str::to_string).ok_or_else(|| ZeusError::Codec {
            path: path.to_path_buf(),
            message: format!("missing required key `{key}`"),
        })
    }

    /// Case-folds an enum value read from disk, per §4.2.
    #[must_use]
    pub fn get_enum(&self, key: &str) -> Option<String> {
        self.get(key).map(|s| s.to_lowercase())
    }

    /// All keys currently present, in the order first set. Used by handlers
    /// to know which keys are "known" vs. foreign/unknown when rewriting.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Serializes this record to the on-disk text grammar.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        write_record(&mut out, self, 0);
        out
    }

    /// Parses the on-disk text grammar into a `Record`.
    pub fn from_text(text: &str, path: &Path) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let mut pos = 0;
        let record = parse_block(&lines, &mut pos, 0, path)?;
        Ok(record)
    }
}

fn write_record(out: &mut String, record: &Record, depth: usize) {
    let indent = "  ".repeat(depth);
    for key in &record.order {
        let Some(field) = record.fields.get(key) else {
            continue;
        };
        match field {
            Field::Scalar(value) => {
                out.push_str(&indent);
                out.push_str(key);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
            Field::List(values) => {
                out.push_str(&indent);
                out.push_str(key);
                out.push_str(":\n");
                let item_indent = "  ".repeat(depth + 1);
                for value in values {
                    out.push_str(&item_indent);
                    out.push_str("- ");
                    out.push_str(value);
                    out.push('\n');
                }
            }
            Field::Block(blocks) => {
                out.push_str(&indent);
                out.push_str(key);
                out.push_str(":\n");
                let item_indent = "  ".repeat(depth + 1);
                for block in blocks {
                    out.push_str(&item_indent);
                    out.push_str("- item:\n");
                    write_record(out, block, depth + 2);
                }
            }
        }
    }
}

/// Parses a sequence of `key: value` lines at a fixed indentation depth,
/// consuming list/block continuations that indent one level deeper.
fn parse_block(lines: &[&str], pos: &mut usize, depth: usize, path: &Path) -> Result<Record> {
    let mut record = Record::new();
    let indent = "  ".repeat(depth);

    while *pos < lines.len() {
        let raw = lines[*pos];
        if raw.trim().is_empty() {
            *pos += 1;
            continue;
        }
        let line_indent = leading_spaces(raw);
        if line_indent < indent.len() {
            break;
        }
        if line_indent > indent.len() {
            return Err(ZeusError::Codec {
                path: path.to_path_buf(),
                message: format!("unexpected indentation at line {}", *pos + 1),
            });
        }

        let content = &raw[indent.len()..];
        let Some((key, rest)) = content.split_once(':') else {
            return Err(ZeusError::Codec {
                path: path.to_path_buf(),
                message: format!("expected `key: value` at line {}", *pos + 1),
            });
        };
        let key = key.trim().to_string();
        let rest = rest.trim();
        *pos += 1;

        if rest.is_empty() {
            // Either a list or a block continuation, or a genuinely empty
            // scalar value if nothing deeper follows.
            let child_indent_width = indent.len() + 2;
            let mut saw_list = false;
            let mut saw_block = false;
            if *pos < lines.len() {
                let next = lines[*pos];
                if !next.trim().is_empty() && leading_spaces(next) == child_indent_width {
                    let item = &next[child_indent_width..];
                    if let Some(value) = item.strip_prefix("- ").or_else(|| item.strip_prefix('-'))
                    {
                        if value.trim_start() == "item:" || item.trim() == "item:" {
                            saw_block = true;
                        } else {
                            saw_list = true;
                        }
                        let _ = value;
                    }
                }
            }

            if saw_block {
                let mut blocks = Vec::new();
                loop {
                    if *pos >= lines.len() {
                        break;
                    }
                    let next = lines[*pos];
                    if next.trim().is_empty() {
                        *pos += 1;
                        continue;
                    }
                    if leading_spaces(next) != child_indent_width {
                        break;
                    }
                    let trimmed = next[child_indent_width..].trim_start();
                    if trimmed != "- item:" {
                        break;
                    }
                    *pos += 1;
                    let nested = parse_block(lines, pos, depth + 2, path)?;
                    blocks.push(nested);
                }
                record.set_block(&key, blocks);
            } else if saw_list {
                let mut values = Vec::new();
                loop {
                    if *pos >= lines.len() {
                        break;
                    }
                    let next = lines[*pos];
                    if next.trim().is_empty() {
                        *pos += 1;
                        continue;
                    }
                    if leading_spaces(next) != child_indent_width {
                        break;
                    }
                    let item = next[child_indent_width..].trim_start();
                    let Some(value) = item.strip_prefix("- ").or_else(|| item.strip_prefix('-'))
                    else {
                        break;
                    };
                    values.push(value.to_string());
                    *pos += 1;
                }
                record.set_list(&key, values);
            } else {
                record.set(&key, String::new());
            }
        } else {
            record.set(&key, rest.to_string());
        }
    }

    Ok(record)
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Rejects a newer-than-supported schema version ("fail closed").
pub fn check_schema_version(record: &Record, path: &Path) -> Result<u32> {
    let raw = record.require("schema", path)?;
    let version: u32 = raw.parse().map_err(|_| ZeusError::Codec {
        path: path.to_path_buf(),
        message: format!("schema version `{raw}` is not a number"),
    })?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(ZeusError::SchemaVersion {
            path: path.to_path_buf(),
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> PathBuf {
        PathBuf::from("test-record")
    }

    #[test]
    fn round_trip_scalars() {
        let mut r = Record::new();
        r.set("schema", "1");
        r.set("kind", "objective");
        r.set("id", "obj-001");
        r.set("title", "Ship the thing");

        let text = r.to_text();
        let parsed = Record::from_text(&text, &p()).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn round_trip_lists() {
        let mut r = Record::new();
        r.set("id", "risk-001");
        r.set_list("tags", vec!["urgent".into(), "backend".into()]);

        let text = r.to_text();
        let parsed = Record::from_text(&text, &p()).unwrap();
        assert_eq!(parsed.get_list("tags"), Some(&["urgent".to_string(), "backend".to_string()][..]));
    }

    #[test]
    fn round_trip_blocks() {
        let mut opt1 = Record::new();
        opt1.set("id", "opt-1");
        opt1.set("title", "Option A");
        let mut opt2 = Record::new();
        opt2.set("id", "opt-2");
        opt2.set("title", "Option B");

        let mut r = Record::new();
        r.set("id", "con-001");
        r.set_block("options", vec![opt1, opt2]);

        let text = r.to_text();
        let parsed = Record::from_text(&text, &p()).unwrap();
        let blocks = parsed.get_block("options").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].get("id"), Some("opt-1"));
        assert_eq!(blocks[1].get("title"), Some("Option B"));
    }

    #[test]
    fn missing_required_key_names_it() {
        let r = Record::new();
        let err = r.require("schema", &p()).unwrap_err();
        assert!(matches!(err, ZeusError::Codec { message, .. } if message.contains("schema")));
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let mut r = Record::new();
        r.set("id", "task-001");
        r.set("x-foreign-field", "kept");

        let text = r.to_text();
        let parsed = Record::from_text(&text, &p()).unwrap();
        assert_eq!(parsed.get("x-foreign-field"), Some("kept"));
    }

    #[test]
    fn enum_fold_lowercases() {
        let mut r = Record::new();
        r.set("status", "ACTIVE");
        assert_eq!(r.get_enum("status"), Some("active".to_string()));
    }

    #[test]
    fn schema_version_too_new_fails_closed() {
        let mut r = Record::new();
        r.set("schema", "99");
        let err = check_schema_version(&r, &p()).unwrap_err();
        assert!(matches!(err, ZeusError::SchemaVersion { found: 99, .. }));
    }
}

//! LDIF reader for directory search result exports.
//!
//! Handles the subset of RFC 2849 that `ldapsearch` and `ldifde` emit for
//! search results: blank-line separated records, `#` comments, folded
//! continuation lines, plain and base64 (`::`) values, attribute options
//! (`cn;lang-en`), the `version:` header and `search:`/`result:` trailers.
use std::convert::Infallible;
use std::io;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;

use crate::entry::RawEntry;

#[derive(Debug, thiserror::Error)]
pub enum LdifError {
    #[error("failed to read LDIF input: {0}")]
    Io(#[from] io::Error),
}

/// Counters for input that was skipped while reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LdifStats {
    pub malformed_lines: usize,
    pub records_without_dn: usize,
    pub binary_values: usize,
}

impl LdifStats {
    pub fn merge(&mut self, other: LdifStats) {
        self.malformed_lines += other.malformed_lines;
        self.records_without_dn += other.records_without_dn;
        self.binary_values += other.binary_values;
    }
}

/// Parse LDIF text already in memory. Reading cannot fail here.
pub fn parse_ldif_str(contents: &str) -> (Vec<RawEntry>, LdifStats) {
    let lines = contents.lines().map(|l| Ok::<_, Infallible>(l.to_string()));
    match read_records(lines) {
        Ok(parsed) => parsed,
        Err(never) => match never {},
    }
}

/// Parse LDIF from a line iterator (see [`crate::io::iter_lines_auto`]).
pub fn parse_ldif_lines<I>(lines: I) -> Result<(Vec<RawEntry>, LdifStats), LdifError>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    Ok(read_records(lines)?)
}

fn read_records<I, E>(lines: I) -> Result<(Vec<RawEntry>, LdifStats), E>
where
    I: IntoIterator<Item = Result<String, E>>,
{
    let mut stats = LdifStats::default();
    let mut entries = Vec::new();
    let mut block: Vec<String> = Vec::new();
    let mut logical: Option<String> = None;
    let mut in_comment = false;

    for line in lines {
        let line = line?;
        if let Some(rest) = line.strip_prefix(' ') {
            if in_comment {
                continue;
            }
            match logical.as_mut() {
                Some(l) => l.push_str(rest),
                None => stats.malformed_lines += 1,
            }
            continue;
        }
        block.extend(logical.take());
        in_comment = false;
        if line.trim().is_empty() {
            finish_block(&mut block, &mut entries, &mut stats);
        } else if line.starts_with('#') {
            in_comment = true;
        } else {
            logical = Some(line);
        }
    }
    block.extend(logical.take());
    finish_block(&mut block, &mut entries, &mut stats);
    Ok((entries, stats))
}

enum Value {
    Text(String),
    Binary,
    Unsupported,
}

fn finish_block(block: &mut Vec<String>, entries: &mut Vec<RawEntry>, stats: &mut LdifStats) {
    if block.is_empty() {
        return;
    }
    let mut entry: Option<RawEntry> = None;
    for line in block.drain(..) {
        let Some((attr, value)) = split_line(&line) else {
            stats.malformed_lines += 1;
            continue;
        };
        if entry.is_none() {
            // version header and search trailers carry no dn
            if attr.eq_ignore_ascii_case("dn") {
                match value {
                    Value::Text(dn) => entry = Some(RawEntry::new(&dn)),
                    _ => {
                        stats.malformed_lines += 1;
                        break;
                    }
                }
            }
            continue;
        }
        let Some(e) = entry.as_mut() else {
            continue;
        };
        match value {
            Value::Text(v) => e.push(attr, &v),
            Value::Binary => stats.binary_values += 1,
            Value::Unsupported => stats.malformed_lines += 1,
        }
    }
    match entry {
        Some(e) => entries.push(e),
        None => {
            debug!("skipping LDIF record without dn");
            stats.records_without_dn += 1;
        }
    }
}

/// Split `attr: value`, `attr:: base64` or `attr:< url` into name and value.
/// Attribute options after ';' are dropped.
fn split_line(line: &str) -> Option<(&str, Value)> {
    let (attr, rest) = line.split_once(':')?;
    let attr = attr.split(';').next().unwrap_or(attr).trim();
    if attr.is_empty() {
        return None;
    }
    let value = if let Some(b64) = rest.strip_prefix(':') {
        match STANDARD.decode(b64.trim()).map(String::from_utf8) {
            Ok(Ok(s)) => Value::Text(s),
            Ok(Err(_)) => Value::Binary,
            Err(e) => {
                debug!("invalid base64 value for {}: {}", attr, e);
                Value::Unsupported
            }
        }
    } else if rest.starts_with('<') {
        Value::Unsupported
    } else {
        Value::Text(rest.trim_start().to_string())
    };
    Some((attr, value))
}

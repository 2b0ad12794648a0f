//! ASCII armor for pasting containers into text channels
//!
//! Format:
//! ```text
//! ----- BEGIN VESSEL MESSAGE -----
//! Format: v3
//! Title: Night Drive
//!
//! U01TRwE...
//! (base64, 64 columns)
//! ----- END VESSEL MESSAGE -----
//! ```
//!
//! Armor headers are informational copies of the public header; the
//! container bytes remain the source of truth.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::codec::get_header;
use crate::error::{SmsgError, SmsgResult};

const LINE_WIDTH: usize = 64;

/// Types of armored content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorType {
    Message,
    Bundle,
}

impl ArmorType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Bundle => "BUNDLE",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "MESSAGE" => Some(Self::Message),
            "BUNDLE" => Some(Self::Bundle),
            _ => None,
        }
    }
}

/// Parsed armor block
#[derive(Debug)]
pub struct ArmorBlock {
    pub armor_type: ArmorType,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
}

fn begin_line(armor_type: ArmorType) -> String {
    format!("----- BEGIN VESSEL {} -----", armor_type.label())
}

fn end_line(armor_type: ArmorType) -> String {
    format!("----- END VESSEL {} -----", armor_type.label())
}

/// Encode bytes as an armor block.
pub fn armor_encode(armor_type: ArmorType, headers: &[(&str, &str)], payload: &[u8]) -> String {
    let b64 = BASE64.encode(payload);
    let mut out = String::with_capacity(b64.len() + b64.len() / LINE_WIDTH + 128);

    out.push_str(&begin_line(armor_type));
    out.push('\n');
    for (key, value) in headers {
        // Header values are single-line
        let value = value.replace(['\r', '\n'], " ");
        out.push_str(&format!("{key}: {value}\n"));
    }
    out.push('\n');

    // base64 output is ASCII, so byte offsets are char boundaries
    let mut rest = b64.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(LINE_WIDTH));
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }

    out.push_str(&end_line(armor_type));
    out.push('\n');
    out
}

/// Decode the first armor block found in `s`.
pub fn armor_decode(s: &str) -> SmsgResult<ArmorBlock> {
    let lines: Vec<&str> = s.lines().map(str::trim_end).collect();

    let begin_idx = lines
        .iter()
        .position(|l| l.starts_with("----- BEGIN VESSEL "))
        .ok_or_else(|| SmsgError::ArmorParse("missing BEGIN line".into()))?;

    let label = lines[begin_idx]
        .strip_prefix("----- BEGIN VESSEL ")
        .and_then(|s| s.strip_suffix(" -----"))
        .ok_or_else(|| SmsgError::ArmorParse("invalid BEGIN line".into()))?;
    let armor_type = ArmorType::from_label(label)
        .ok_or_else(|| SmsgError::ArmorParse(format!("unknown armor type: {label}")))?;

    let end_marker = end_line(armor_type);
    let end_idx = lines[begin_idx..]
        .iter()
        .position(|l| *l == end_marker)
        .map(|i| begin_idx + i)
        .ok_or_else(|| SmsgError::ArmorParse("missing END line".into()))?;

    // Headers run until the first blank line
    let body = &lines[begin_idx + 1..end_idx];
    let blank = body.iter().position(|l| l.is_empty());
    let (header_lines, payload_lines) = match blank {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => (&body[..0], body),
    };

    let mut headers = HashMap::new();
    for line in header_lines {
        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| SmsgError::ArmorParse(format!("malformed header line: {line}")))?;
        headers.insert(key.to_string(), value.to_string());
    }

    let b64: String = payload_lines
        .iter()
        .flat_map(|l| l.chars())
        .filter(|c| !c.is_whitespace())
        .collect();
    let payload = BASE64.decode(b64.as_bytes())?;

    Ok(ArmorBlock {
        armor_type,
        headers,
        payload,
    })
}

/// Armor an SMSG container, copying `Format` and `Title` from its header.
pub fn to_armor(container: &[u8]) -> SmsgResult<String> {
    let header = get_header(container)?;
    let title = header.manifest.as_ref().map(|m| m.title.as_str()).unwrap_or("");

    let mut headers = vec![("Format", header.format.as_str())];
    if !title.is_empty() {
        headers.push(("Title", title));
    }
    Ok(armor_encode(ArmorType::Message, &headers, container))
}

/// Recover SMSG container bytes from armored text.
pub fn from_armor(text: &str) -> SmsgResult<Vec<u8>> {
    let block = armor_decode(text)?;
    if block.armor_type != ArmorType::Message {
        return Err(SmsgError::ArmorParse(format!(
            "expected MESSAGE armor, found {}",
            block.armor_type.label()
        )));
    }
    // Reject armor that does not wrap a readable container
    get_header(&block.payload)?;
    Ok(block.payload)
}

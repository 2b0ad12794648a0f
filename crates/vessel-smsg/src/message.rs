//! Message model and its two plaintext encodings
//!
//! - **JSON** (v1): the whole message as JSON, attachment bytes base64.
//! - **Binary body** (v2/v3): raw attachment bytes after a JSON descriptor:
//!
//! ```text
//! META_LEN u32 LE | META (JSON) | attachment 0 bytes | attachment 1 bytes | ...
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SmsgResult, payload};

/// A file carried inside a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    #[serde(with = "vessel_core::b64")]
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }
}

/// The encrypted content of a container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// Unix seconds
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            timestamp: chrono::Utc::now().timestamp(),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.name == name)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentMeta {
    name: String,
    mime_type: String,
    size: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyMeta {
    #[serde(default)]
    from: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    extra: BTreeMap<String, String>,
    #[serde(default)]
    attachments: Vec<AttachmentMeta>,
}

pub(crate) fn encode_json(message: &Message) -> SmsgResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| payload(format!("message JSON: {e}")))
}

pub(crate) fn decode_json(bytes: &[u8]) -> SmsgResult<Message> {
    serde_json::from_slice(bytes).map_err(|e| payload(format!("message JSON: {e}")))
}

pub(crate) fn encode_binary(message: &Message) -> SmsgResult<Vec<u8>> {
    let meta = BodyMeta {
        from: message.from.clone(),
        subject: message.subject.clone(),
        body: message.body.clone(),
        timestamp: message.timestamp,
        extra: message.extra.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| AttachmentMeta {
                name: a.name.clone(),
                mime_type: a.mime_type.clone(),
                size: a.content.len() as u64,
            })
            .collect(),
    };
    let meta_bytes = serde_json::to_vec(&meta).map_err(|e| payload(format!("body meta: {e}")))?;
    let meta_len = u32::try_from(meta_bytes.len()).map_err(|_| payload("body meta too large"))?;

    let attachments: usize = message.attachments.iter().map(|a| a.content.len()).sum();
    let mut out = Vec::with_capacity(4 + meta_bytes.len() + attachments);
    out.extend(meta_len.to_le_bytes());
    out.extend_from_slice(&meta_bytes);
    for attachment in &message.attachments {
        out.extend_from_slice(&attachment.content);
    }
    Ok(out)
}

pub(crate) fn decode_binary(bytes: &[u8]) -> SmsgResult<Message> {
    let len_bytes: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| payload("body truncated before meta length"))?;
    let meta_end = 4usize
        .checked_add(u32::from_le_bytes(len_bytes) as usize)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| payload("body truncated inside meta"))?;
    let meta: BodyMeta = serde_json::from_slice(&bytes[4..meta_end])
        .map_err(|e| payload(format!("body meta: {e}")))?;

    let mut rest = &bytes[meta_end..];
    let mut attachments = Vec::with_capacity(meta.attachments.len());
    for entry in meta.attachments {
        let size = usize::try_from(entry.size)
            .ok()
            .filter(|size| *size <= rest.len())
            .ok_or_else(|| payload(format!("attachment {} exceeds body", entry.name)))?;
        let (content, tail) = rest.split_at(size);
        attachments.push(Attachment {
            name: entry.name,
            mime_type: entry.mime_type,
            content: content.to_vec(),
        });
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(payload(format!("{} trailing bytes after attachments", rest.len())));
    }

    Ok(Message {
        from: meta.from,
        subject: meta.subject,
        body: meta.body,
        timestamp: meta.timestamp,
        extra: meta.extra,
        attachments,
    })
}

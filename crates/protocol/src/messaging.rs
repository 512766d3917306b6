//! Messaging-event notification payloads and the signed download descriptor.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of a `MessagingEventNotification`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_id: Option<String>,
    #[serde(default)]
    pub changes: Vec<MessagingChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_id: Option<String>,
    pub event: MessagingEvent,
}

impl MessagingChange {
    /// Relative path of the attached file, if this change is a file upload.
    #[must_use]
    pub fn attachment_path(&self) -> Option<&str> {
        match &self.event {
            MessagingEvent::ContentEvent {
                message: Some(MessageBody::File(file)),
                ..
            } => file
                .relative_path
                .as_deref()
                .filter(|path| !path.is_empty()),
            _ => None,
        }
    }
}

/// Event carried by a messaging change, tagged by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessagingEvent {
    #[serde(rename_all = "camelCase")]
    ContentEvent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<MessageBody>,
    },
    AcceptStatusEvent,
    ChatStateEvent,
    #[serde(other)]
    Other,
}

/// A content event's message: plain text, or a hosted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    File(FileMessage),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Response body of `GenerateURLForDownloadFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDescriptor {
    pub relative_path: String,
    pub query_params: QueryParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub temp_url_sig: String,
    #[serde(deserialize_with = "string_or_number")]
    pub temp_url_expires: String,
}

/// The platform sends the expiry either as a JSON number or a string.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

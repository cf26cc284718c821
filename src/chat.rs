use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub enum ChatRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
}

impl ChatRole {
    /// Speaker label used when rendering history for the rewriter prompt.
    #[must_use]
    pub const fn speaker(&self) -> &'static str {
        match self {
            Self::User => "Human",
            Self::Assistant | Self::System => "Assistant",
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    fn format(&self) -> String {
        format!("{}: {}", self.role.speaker(), self.content)
    }
}

/// Body of `POST /api/chat`.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Content of the final message, if there is one and it is not blank.
    #[must_use]
    pub fn last_message(&self) -> Option<&str> {
        self.messages
            .last()
            .map(|msg| msg.content.as_str())
            .filter(|content| !content.trim().is_empty())
    }

    /// Every message but the last, one `Speaker: content` line each.
    #[must_use]
    pub fn formatted_history(&self) -> String {
        let Some((_, previous)) = self.messages.split_last() else {
            return String::new();
        };
        previous.iter().map(ChatMessage::format).collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_history_scenario() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::user("Hi"),
                ChatMessage::assistant("Hello"),
                ChatMessage::user("What about yesterday?"),
            ],
        };

        assert_eq!(request.formatted_history(), "Human: Hi\nAssistant: Hello");
        assert_eq!(request.last_message(), Some("What about yesterday?"));
    }

    #[test]
    fn test_single_message_has_empty_history() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("Hi")],
        };
        assert_eq!(request.formatted_history(), "");
    }

    #[test]
    fn test_last_message_missing_or_blank() {
        let empty = ChatRequest { messages: vec![] };
        assert_eq!(empty.last_message(), None);
        assert_eq!(empty.formatted_history(), "");

        let blank = ChatRequest {
            messages: vec![ChatMessage::user("  ")],
        };
        assert_eq!(blank.last_message(), None);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&ChatRole::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&ChatRole::Assistant).unwrap(), r#""assistant""#);
    }

    #[test]
    fn test_message_without_id_deserializes() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"Find all nodes"}]}"#).unwrap();
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].id.is_none());
    }

    #[test]
    fn test_missing_messages_field_is_empty() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.messages.is_empty());
    }

    #[test]
    fn test_system_role_renders_as_assistant() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    id: None,
                    role: ChatRole::System,
                    content: "Be brief".to_string(),
                },
                ChatMessage::user("Hi"),
            ],
        };
        assert_eq!(request.formatted_history(), "Assistant: Be brief");
    }
}

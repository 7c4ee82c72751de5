//! Prompt construction: the fixed instruction/template pair and the two-turn
//! conversation built from it for each comment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StanceError};

/// The role of a message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions that guide the model's behavior.
    System,
    /// A message from the user.
    User,
    /// A response from the assistant/model.
    Assistant,
}

impl Role {
    /// Returns the role as a lowercase string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    /// Helper to construct a system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
        }
    }

    /// Helper to construct a user message.
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
        }
    }

    /// Helper to construct an assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }

    /// Returns the message's role.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the message content.
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Substitution point the user template must contain exactly once.
pub const COMMENT_SLOT: &str = "{comment}";

const DEFAULT_SYSTEM_INSTRUCTION: &str = "Instruction: You have assumed the role of a stakeholder that is presented \
     with a reddit comment from likely federal workers related to the current policies \
     on reducing the federal workforce. Please determine the author of the comment's stance \
     on this topic, and only provide the answer.";

const DEFAULT_USER_TEMPLATE: &str = "Is this comment in 'favor', 'neutral', or 'oppose' the reduction in federal workforce? \
     Provide one word answer only!\n\nComment: {comment}";

/// The instruction/template pair driving classification.
///
/// Built once at startup and never mutated. Changing these strings changes
/// classification behavior without any code change, so they can be loaded
/// from a JSON file instead of the built-in default.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSpec {
    system_instruction: String,
    user_template: String,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            user_template: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

impl PromptSpec {
    /// Create a spec, rejecting templates without exactly one `{comment}` slot.
    pub fn new(system_instruction: &str, user_template: &str) -> Result<Self> {
        let spec = Self {
            system_instruction: system_instruction.to_string(),
            user_template: user_template.to_string(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Load a spec from a JSON file with `system_instruction` and
    /// `user_template` fields.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StanceError::Config(format!(
                "Failed to read prompt spec '{}': {e}",
                path.display()
            ))
        })?;
        let spec: PromptSpec = serde_json::from_str(&content).map_err(|e| {
            StanceError::Config(format!(
                "Failed to parse prompt spec '{}': {e}",
                path.display()
            ))
        })?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        let slots = self.user_template.matches(COMMENT_SLOT).count();
        if slots != 1 {
            return Err(StanceError::Config(format!(
                "user_template must contain '{COMMENT_SLOT}' exactly once, found {slots}"
            )));
        }
        Ok(())
    }

    /// Build the two-turn conversation for one comment.
    ///
    /// The comment text is substituted verbatim: no escaping, truncation, or
    /// sanitization happens here, so adversarial comment content reaches the
    /// model unchanged.
    pub fn conversation(&self, comment: &str) -> Vec<Message> {
        vec![
            Message::system(&self.system_instruction),
            Message::user(&self.user_template.replace(COMMENT_SLOT, comment)),
        ]
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn user_template(&self) -> &str {
        &self.user_template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_has_two_turns() {
        let spec = PromptSpec::default();
        let messages = spec.conversation("some comment");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), &Role::System);
        assert_eq!(messages[1].role(), &Role::User);
    }

    #[test]
    fn comment_is_substituted_verbatim() {
        let spec = PromptSpec::new("sys", "Classify: {comment}").unwrap();
        let messages = spec.conversation("Cutting federal jobs is wrong ");
        assert_eq!(messages[0].content(), "sys");
        assert_eq!(
            messages[1].content(),
            "Classify: Cutting federal jobs is wrong "
        );
    }

    #[test]
    fn conversation_is_deterministic() {
        let spec = PromptSpec::default();
        let a = spec.conversation("same input");
        let b = spec.conversation("same input");
        assert_eq!(a, b);
    }

    #[test]
    fn template_without_slot_is_rejected() {
        let err = PromptSpec::new("sys", "no slot here").unwrap_err();
        assert!(matches!(err, StanceError::Config(_)));
    }

    #[test]
    fn template_with_two_slots_is_rejected() {
        let err = PromptSpec::new("sys", "{comment} and {comment}").unwrap_err();
        assert!(matches!(err, StanceError::Config(_)));
    }

    #[test]
    fn default_template_has_one_slot() {
        assert_eq!(
            PromptSpec::default()
                .user_template()
                .matches(COMMENT_SLOT)
                .count(),
            1
        );
    }

    #[test]
    fn spec_loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.json");
        std::fs::write(
            &path,
            r#"{"system_instruction": "sys", "user_template": "Q: {comment}"}"#,
        )
        .unwrap();

        let spec = PromptSpec::from_path(&path).unwrap();
        assert_eq!(spec.system_instruction(), "sys");
        assert_eq!(spec.conversation("x")[1].content(), "Q: x");
    }
}

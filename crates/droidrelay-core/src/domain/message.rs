//! Conversation turns and their visibility.

use serde::{Deserialize, Serialize};

/// Who authored a turn, and whether the UI may render it.
///
/// `User` and `VisibleUser` share the `user` wire role: the first is the
/// model-facing copy of an instruction, the second is what the person typed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    VisibleUser,
    Assistant,
}

impl Role {
    /// Role string sent to the completion service.
    pub fn wire(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User | Role::VisibleUser => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Whether turns with this role are shown in the UI by default.
    pub fn is_visible(&self) -> bool {
        matches!(self, Role::VisibleUser | Role::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire())
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub visible: bool,
}

impl Message {
    /// Create a turn whose visibility follows its role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            visible: role.is_visible(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn visible_user(content: impl Into<String>) -> Self {
        Self::new(Role::VisibleUser, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Same turn, forced out of the UI projection.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

//! Identity of the caller

use crate::types::UserId;

pub trait CurrentUser: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;

    fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }
}

/// A caller resolved up front, or an anonymous one
#[derive(Debug, Clone, Default)]
pub struct FixedUser(Option<UserId>);

impl FixedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Some(UserId::new(id)))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }

    /// The local account running the CLI
    pub fn local() -> Self {
        let name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "local".to_string());
        Self::new(name)
    }
}

impl CurrentUser for FixedUser {
    fn current_user_id(&self) -> Option<UserId> {
        self.0.clone()
    }
}

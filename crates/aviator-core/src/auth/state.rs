use std::fmt;

/// Authentication state published by the session controller.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthState {
    /// A startup exchange or login is in flight
    Loading,
    Unauthenticated,
    Authenticated { session_token: String },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    /// Session token for authenticated API calls
    pub fn session_token(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { session_token } => Some(session_token),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Loading => "loading",
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticated { .. } => "authenticated",
        }
    }
}

// Tokens must never reach logs through `{:?}`
impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Loading => f.write_str("Loading"),
            AuthState::Unauthenticated => f.write_str("Unauthenticated"),
            AuthState::Authenticated { session_token } => f
                .debug_struct("Authenticated")
                .field("session_token", &format_args!("<{} chars>", session_token.len()))
                .finish(),
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

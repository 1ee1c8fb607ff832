//! Commands for the Identity context.

use casefile_core::command::Command;
use uuid::Uuid;

/// Command to register a new account.
#[derive(Clone)]
pub struct SignUp {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Email address, not yet normalized.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// Command to authenticate an existing account.
#[derive(Clone)]
pub struct LogIn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Email address, not yet normalized.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

macro_rules! redacted_debug {
    ($name:ident) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("correlation_id", &self.correlation_id)
                    .field("email", &self.email)
                    .field("password", &"[redacted]")
                    .finish()
            }
        }
    };
}

redacted_debug!(SignUp);
redacted_debug!(LogIn);

impl Command for SignUp {
    fn command_type(&self) -> &'static str {
        "identity.sign_up"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for LogIn {
    fn command_type(&self) -> &'static str {
        "identity.log_in"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to set a user's nickname.
#[derive(Debug, Clone)]
pub struct SetNickname {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user.
    pub user_id: Uuid,
    /// Requested nickname, not yet trimmed.
    pub nickname: String,
}

impl Command for SetNickname {
    fn command_type(&self) -> &'static str {
        "identity.set_nickname"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

//! Command handlers for the Identity context.

use casefile_core::clock::Clock;
use casefile_core::command::Command;
use casefile_core::error::DomainError;
use casefile_core::repository::{UserRecord, UserRepository};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{normalize_email, validate_nickname, validate_password};
use crate::domain::commands::{LogIn, SetNickname, SignUp};
use crate::domain::password::Passwords;
use crate::domain::token::TokenSigner;

/// Response carrying a freshly issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    /// The account the token was issued for. Not part of the response body.
    #[serde(skip)]
    pub user_id: Uuid,
    /// The signed token.
    pub token: String,
}

/// Handles the `SignUp` command: validates the credentials, stores the new
/// account, and issues a token for it.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed email or short
/// password, and `DomainError::Conflict` if the email is already registered.
pub async fn handle_sign_up(
    command: &SignUp,
    clock: &dyn Clock,
    repo: &dyn UserRepository,
    passwords: &Passwords,
    tokens: &TokenSigner,
) -> Result<IssuedToken, DomainError> {
    let email = normalize_email(&command.email)?;
    validate_password(&command.password)?;

    let now = clock.now();
    let user = UserRecord {
        id: Uuid::new_v4(),
        email,
        password_hash: passwords.hash(&command.password)?,
        nickname: None,
        created_at: now,
        updated_at: now,
    };
    repo.insert_user(&user).await?;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        user_id = %user.id,
        "account created"
    );

    Ok(IssuedToken {
        user_id: user.id,
        token: tokens.issue(user.id, now)?,
    })
}

/// Handles the `LogIn` command.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` if the email is unknown or the
/// password does not match; both cases are indistinguishable to the caller.
pub async fn handle_log_in(
    command: &LogIn,
    clock: &dyn Clock,
    repo: &dyn UserRepository,
    passwords: &Passwords,
    tokens: &TokenSigner,
) -> Result<IssuedToken, DomainError> {
    let invalid = || DomainError::Unauthorized("invalid email or password".into());
    let email = normalize_email(&command.email).map_err(|_| invalid())?;

    let user = repo.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !passwords.verify(&command.password, &user.password_hash) {
        warn!(
            correlation_id = %command.correlation_id(),
            user_id = %user.id,
            "login rejected"
        );
        return Err(invalid());
    }

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        user_id = %user.id,
        "login accepted"
    );

    Ok(IssuedToken {
        user_id: user.id,
        token: tokens.issue(user.id, clock.now())?,
    })
}

/// Handles the `SetNickname` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the trimmed nickname is empty or too
/// long, and `DomainError::NotFound` if the user no longer exists.
pub async fn handle_set_nickname(
    command: &SetNickname,
    clock: &dyn Clock,
    repo: &dyn UserRepository,
) -> Result<(), DomainError> {
    let nickname = validate_nickname(&command.nickname)?;
    repo.set_nickname(command.user_id, nickname, clock.now())
        .await?;

    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        user_id = %command.user_id,
        "nickname set"
    );
    Ok(())
}

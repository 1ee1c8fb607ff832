//! Query handlers for the Identity context.

use casefile_core::error::DomainError;
use casefile_core::repository::UserRepository;
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of an account. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    /// User identifier.
    pub id: Uuid,
    /// Normalized email.
    pub email: String,
    /// Display name, if set.
    pub nickname: Option<String>,
}

/// Retrieves the profile of a user.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the user does not exist.
pub async fn get_profile(
    user_id: Uuid,
    repo: &dyn UserRepository,
) -> Result<ProfileView, DomainError> {
    let user = repo
        .find_user(user_id)
        .await?
        .ok_or_else(|| DomainError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
    Ok(ProfileView {
        id: user.id,
        email: user.email,
        nickname: user.nickname,
    })
}

//! Account value rules for the Identity context.

use casefile_core::error::DomainError;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Maximum nickname length, in characters, after trimming.
pub const MAX_NICKNAME_CHARS: usize = 32;

/// Normalizes an email address (trimmed, lowercased) and checks its shape.
///
/// The normalized form is what accounts are keyed on, and what scopes
/// idempotent signup and login requests.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the address has no `@`.
pub fn normalize_email(email: &str) -> Result<String, DomainError> {
    let normalized = email.trim().to_lowercase();
    if !normalized.contains('@') {
        return Err(DomainError::Validation("email must contain '@'".into()));
    }
    Ok(normalized)
}

/// Checks that a password is long enough.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the password is shorter than
/// [`MIN_PASSWORD_CHARS`].
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(DomainError::Validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

/// Trims a nickname and checks its length.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the trimmed nickname is empty or
/// longer than [`MAX_NICKNAME_CHARS`].
pub fn validate_nickname(nickname: &str) -> Result<&str, DomainError> {
    let trimmed = nickname.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_NICKNAME_CHARS {
        return Err(DomainError::Validation(format!(
            "nickname must be 1 to {MAX_NICKNAME_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Holmes@Baker.Street ").unwrap(),
            "holmes@baker.street"
        );
        assert!(matches!(
            normalize_email("holmes.baker.street"),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_password_requires_minimum_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_validate_nickname_bounds() {
        assert_eq!(validate_nickname("  Watson ").unwrap(), "Watson");
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname(&"w".repeat(MAX_NICKNAME_CHARS)).is_ok());
        assert!(validate_nickname(&"w".repeat(MAX_NICKNAME_CHARS + 1)).is_err());
    }
}

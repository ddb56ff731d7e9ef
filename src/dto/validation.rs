//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a nickname has visible content and no control characters.
///
/// Length limits are enforced separately with `#[validate(length)]`.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    if nickname.trim().is_empty() {
        let mut err = ValidationError::new("nickname_blank");
        err.message = Some("Nickname must contain a visible character".into());
        return Err(err);
    }

    if nickname.chars().any(char::is_control) {
        let mut err = ValidationError::new("nickname_format");
        err.message = Some("Nickname must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a bracket match id is made of ASCII letters, digits, `-` and `_`.
///
/// The id ends up in room codes and in the tournament service URL path.
pub fn validate_match_id(match_id: &str) -> Result<(), ValidationError> {
    if match_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(());
    }

    let mut err = ValidationError::new("match_id_format");
    err.message = Some("Match ID may only contain letters, digits, '-' and '_'".into());
    Err(err)
}

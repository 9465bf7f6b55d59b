//! Validation helpers for DTOs.

use validator::ValidationError;

/// Alphabet room codes are drawn from; ambiguous glyphs are excluded.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Fixed length of a room join code.
pub const CODE_LENGTH: usize = 5;

/// Maximum length of a display name or room title.
pub const NAME_MAX: usize = 24;
/// Maximum length of a chat message body.
pub const CHAT_MAX: usize = 280;

/// Validates that a room code is exactly five characters from the code alphabet.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("A7KPQ") // Ok
/// validate_room_code("a7kpq") // Err - lowercase
/// validate_room_code("A7KP")  // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|c| CODE_ALPHABET.contains(&c)) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code contains characters outside the code alphabet".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a trimmed display name or room title: non-empty, bounded length.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_empty");
        err.message = Some("Name must not be empty".into());
        return Err(err);
    }
    if trimmed.chars().count() > NAME_MAX {
        let mut err = ValidationError::new("name_length");
        err.message = Some(format!("Name must be at most {NAME_MAX} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a trimmed chat message body: non-empty, bounded length.
pub fn validate_chat_text(text: &str) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("chat_empty");
        err.message = Some("Chat message must not be empty".into());
        return Err(err);
    }
    if trimmed.chars().count() > CHAT_MAX {
        let mut err = ValidationError::new("chat_length");
        err.message = Some(format!("Chat message must be at most {CHAT_MAX} characters").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("A7KPQ").is_ok());
        assert!(validate_room_code("23456").is_ok());
        assert!(validate_room_code("ZZZZZ").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("A7KP").is_err()); // too short
        assert!(validate_room_code("A7KPQR").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("a7kpq").is_err()); // lowercase
        assert!(validate_room_code("A7KP0").is_err()); // ambiguous zero
        assert!(validate_room_code("A7KP1").is_err()); // ambiguous one
        assert!(validate_room_code("A7K Q").is_err()); // space
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("host").is_ok());
        assert!(validate_display_name("  padded  ").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(NAME_MAX + 1)).is_err());
    }

    #[test]
    fn test_validate_chat_text() {
        assert!(validate_chat_text("gg").is_ok());
        assert!(validate_chat_text("").is_err());
        assert!(validate_chat_text(&"y".repeat(CHAT_MAX + 1)).is_err());
    }
}

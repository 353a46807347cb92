/// Input validation for player names coming from users
use thiserror::Error;

/// Longest name accepted from users. Ledger keys have no limit of their own,
/// but proxied names stay well below this.
pub const MAX_PLAYER_NAME_LEN: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max 64 characters, got {0})")]
    PlayerNameTooLong(usize),

    #[error("Player name contains invalid characters (no spaces, mentions or non-ASCII)")]
    PlayerNameInvalidChars,
}

/// Validates a player name
///
/// Rules:
/// - Cannot be empty
/// - Max 64 characters; Java names stop at 16, proxy prefixed names go past it
/// - Only printable ASCII, no whitespace and none of `<`, `>`, `@`
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    let len = name.chars().count();
    if len > MAX_PLAYER_NAME_LEN {
        return Err(ValidationError::PlayerNameTooLong(len));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_graphic() && !matches!(c, '<' | '>' | '@'))
    {
        return Err(ValidationError::PlayerNameInvalidChars);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_player_names() {
        assert!(validate_player_name("Steve").is_ok());
        assert!(validate_player_name("jeb_").is_ok());
        assert!(validate_player_name("Player_123").is_ok());
        assert!(validate_player_name("1234567890123456").is_ok()); // Java limit
        assert!(validate_player_name(".BedrockPlayer123").is_ok());
        assert!(validate_player_name(&"a".repeat(MAX_PLAYER_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_empty_player_name() {
        assert_eq!(
            validate_player_name(""),
            Err(ValidationError::PlayerNameEmpty)
        );
    }

    #[test]
    fn test_player_name_too_long() {
        assert_eq!(
            validate_player_name(&"a".repeat(65)),
            Err(ValidationError::PlayerNameTooLong(65))
        );
    }

    #[test]
    fn test_player_name_invalid_chars() {
        assert_eq!(
            validate_player_name("Player 123"),
            Err(ValidationError::PlayerNameInvalidChars)
        );
        assert_eq!(
            validate_player_name("<@!1234>"),
            Err(ValidationError::PlayerNameInvalidChars)
        );
        assert_eq!(
            validate_player_name("Spieler_ä"),
            Err(ValidationError::PlayerNameInvalidChars)
        );
    }
}

//! File name validation.

use thiserror::Error;

const RESTRICTED_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Why a name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is too long (max 255 characters)")]
    TooLong,

    #[error("Name cannot contain '{0}'")]
    RestrictedChar(char),

    #[error("'{0}' is a reserved name")]
    Reserved(String),

    #[error("Name cannot start or end with spaces")]
    Whitespace,

    #[error("Name cannot end with a dot")]
    TrailingDot,
}

/// Validate a file name for cross-platform compatibility.
///
/// `allow_colon` permits ':' for stores that expose alternate data streams
/// as "file:stream" names.
pub fn validate_name(name: &str, allow_colon: bool) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.len() > 255 {
        return Err(NameError::TooLong);
    }

    if name.contains('\0') {
        return Err(NameError::RestrictedChar('\0'));
    }
    if let Some(c) = name
        .chars()
        .find(|c| RESTRICTED_CHARS.contains(c) && !(allow_colon && *c == ':'))
    {
        return Err(NameError::RestrictedChar(c));
    }

    // . and .. are reserved
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_string()));
    }

    // Reserved device names, alone or followed by an extension
    let upper = name.to_ascii_uppercase();
    if let Some(reserved) = RESERVED_NAMES.iter().find(|reserved| {
        upper
            .strip_prefix(**reserved)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    }) {
        return Err(NameError::Reserved((*reserved).to_string()));
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(NameError::Whitespace);
    }

    if name.ends_with('.') {
        return Err(NameError::TrailingDot);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_valid() {
        assert!(validate_name("test.txt", false).is_ok());
        assert!(validate_name("my-file", false).is_ok());
        assert!(validate_name(".hidden", false).is_ok());
        assert!(validate_name("file with spaces", false).is_ok());
        assert!(validate_name("CONSOLE.txt", false).is_ok());
        assert!(validate_name("COM10", false).is_ok());
    }

    #[test]
    fn test_validate_name_invalid() {
        assert_eq!(validate_name("", false), Err(NameError::Empty));
        assert_eq!(validate_name("test/file", false), Err(NameError::RestrictedChar('/')));
        assert_eq!(validate_name("what?", false), Err(NameError::RestrictedChar('?')));
        assert!(validate_name(".", false).is_err());
        assert!(validate_name("..", false).is_err());
        assert_eq!(validate_name("file ", false), Err(NameError::Whitespace));
        assert_eq!(validate_name(" file", false), Err(NameError::Whitespace));
        assert_eq!(validate_name("file.", false), Err(NameError::TrailingDot));
        assert_eq!(validate_name(&"x".repeat(256), false), Err(NameError::TooLong));
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(validate_name("con", false), Err(NameError::Reserved("CON".into())));
        assert_eq!(validate_name("Lpt3.log", false), Err(NameError::Reserved("LPT3".into())));
    }

    #[test]
    fn test_colon_for_streams() {
        assert!(validate_name("file.txt:meta", false).is_err());
        assert!(validate_name("file.txt:meta", true).is_ok());
    }
}

use thiserror::Error;
use uuid::Uuid;

const DEV_EUI_LENGTH: usize = 16;
const KEY_LENGTH: usize = 32;
const HYPHENATED_UUID_LENGTH: usize = 36;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is empty")]
    Empty { field: &'static str },
    #[error("{field} is not a valid UUID. Got: '{value}'. Expected format: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx")]
    InvalidUuid { field: &'static str, value: String },
    #[error("{field} must be {expected} hex characters, got {actual}")]
    InvalidLength { field: &'static str, expected: usize, actual: usize },
    #[error("{field} must contain only hexadecimal characters (0-9, A-F)")]
    NotHex { field: &'static str },
}

/// Validates a hyphenated UUID and returns it trimmed.
pub fn validate_uuid<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    // `Uuid::try_parse` also accepts the simple and braced forms, the network server only takes the hyphenated one
    if trimmed.len() != HYPHENATED_UUID_LENGTH || Uuid::try_parse(trimmed).is_err() {
        return Err(ValidationError::InvalidUuid {
            field,
            value: value.to_string(),
        });
    }

    Ok(trimmed)
}

/// Validates a DevEUI and returns it without separators, upper-cased.
pub fn validate_dev_eui(dev_eui: &str) -> Result<String, ValidationError> {
    clean_hex(dev_eui, "DevEUI", DEV_EUI_LENGTH)
}

/// Validates a 128 bit root key and returns it without separators, upper-cased.
pub fn validate_key(key: &str, field: &'static str) -> Result<String, ValidationError> {
    clean_hex(key, field, KEY_LENGTH)
}

fn clean_hex(value: &str, field: &'static str, expected: usize) -> Result<String, ValidationError> {
    let cleaned = value.chars().filter(|c| !c.is_whitespace() && *c != '-').collect::<String>().to_ascii_uppercase();

    if cleaned.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    let actual = cleaned.chars().count();
    if actual != expected {
        return Err(ValidationError::InvalidLength { field, expected, actual });
    }

    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::NotHex { field });
    }

    Ok(cleaned)
}

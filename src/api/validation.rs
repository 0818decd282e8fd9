use super::ApiError;
use crate::constants::limits;

/// Minimal structural check: one `@` with something on both sides and a dot
/// in the domain.
pub fn validate_email(email: &str) -> Result<(), String> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email address".to_string());
    };
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.contains(char::is_whitespace)
        || email.len() > 254
    {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

/// At least 8 characters with one digit and one uppercase letter.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    Ok(())
}

pub fn validate_token_amount(amount: i64) -> Result<i64, ApiError> {
    if amount <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid token amount: {amount}. Amount must be a positive integer"
        )));
    }
    Ok(amount)
}

pub fn validate_variations(variations: u32) -> Result<u32, ApiError> {
    if !(1..=limits::MAX_VARIATIONS_PER_REQUEST).contains(&variations) {
        return Err(ApiError::validation(format!(
            "Invalid variation count: {variations}. Must be between 1 and {}",
            limits::MAX_VARIATIONS_PER_REQUEST
        )));
    }
    Ok(variations)
}

pub fn validate_brief_field(name: &str, value: &str) -> Result<(), ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{name} cannot be empty")));
    }
    if trimmed.chars().count() > limits::MAX_PROMPT_CHARS {
        return Err(ApiError::validation(format!(
            "{name} must be {} characters or less",
            limits::MAX_PROMPT_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user name@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Passw0rd").is_ok());
        assert!(validate_password("short1A").is_err());
        assert!(validate_password("nouppercase1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }

    #[test]
    fn test_validate_token_amount() {
        assert!(validate_token_amount(1).is_ok());
        assert!(validate_token_amount(500).is_ok());
        assert!(validate_token_amount(0).is_err());
        assert!(validate_token_amount(-10).is_err());
    }

    #[test]
    fn test_validate_variations() {
        assert!(validate_variations(1).is_ok());
        assert!(validate_variations(10).is_ok());
        assert!(validate_variations(0).is_err());
        assert!(validate_variations(11).is_err());
    }
}

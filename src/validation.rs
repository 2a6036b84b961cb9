//! Presence and format checks run before any write.

use crate::auth::MIN_PASSWORD_LEN;
use crate::error::ApiError;
use crate::nearby::Coordinate;

/// Returns the trimmed value, or a 400 naming the missing field.
pub fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::bad_request(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// `local@domain.tld` with no whitespace; deliberately loose.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

pub fn email(value: &str) -> Result<String, ApiError> {
    let value = required("email", value)?;
    if is_valid_email(&value) {
        Ok(value.to_lowercase())
    } else {
        Err(ApiError::bad_request("email is not a valid address"))
    }
}

pub fn password(value: &str) -> Result<(), ApiError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Latitude and longitude must be given together and be in range.
pub fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ApiError> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng)
            .validate()
            .map_err(ApiError::BadRequest),
        _ => Err(ApiError::bad_request(
            "latitude and longitude must be provided together",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("tenant@domuseye.ph"));
        assert!(is_valid_email("  a.b+c@mail.example.com "));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("@domain.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@c.x"));
    }

    #[test]
    fn email_is_lowercased() {
        assert_eq!(email(" Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(email("").is_err());
    }

    #[test]
    fn required_trims() {
        assert_eq!(required("title", "  Loft ").unwrap(), "Loft");
        let err = required("title", "   ").unwrap_err();
        assert_eq!(err.to_string(), "title is required");
    }

    #[test]
    fn coordinates_come_in_pairs() {
        assert!(coordinates(None, None).is_ok());
        assert!(coordinates(Some(6.1), Some(125.1)).is_ok());
        assert!(coordinates(Some(6.1), None).is_err());
        assert!(coordinates(Some(100.0), Some(0.0)).is_err());
    }

    #[test]
    fn password_length() {
        assert!(password("short").is_err());
        assert!(password("long enough").is_ok());
    }
}

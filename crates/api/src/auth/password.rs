//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Validate password strength
pub fn validate_password_strength(password: &str) -> Result<(), PasswordValidationError> {
    let length = password.chars().count();
    if length < 10 {
        return Err(PasswordValidationError::TooShort);
    }
    if length > 128 {
        return Err(PasswordValidationError::TooLong);
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(PasswordValidationError::MissingVariety);
    }

    if is_common_password(password) {
        return Err(PasswordValidationError::TooCommon);
    }

    Ok(())
}

fn is_common_password(password: &str) -> bool {
    const COMMON_PASSWORDS: &[&str] = &[
        "password123",
        "password1234",
        "passwort123",
        "passwort1234",
        "1234567890",
        "qwertz1234",
        "qwerty12345",
        "sternblitz1",
        "sternblitz123",
        "willkommen1",
        "willkommen123",
        "hallo12345",
        "geheim12345",
        "abc1234567",
        "admin12345",
        "letmein123",
    ];

    let password_lower = password.to_lowercase();
    COMMON_PASSWORDS.contains(&password_lower.as_str())
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordValidationError {
    #[error("Passwort muss mindestens 10 Zeichen lang sein")]
    TooShort,
    #[error("Passwort darf höchstens 128 Zeichen lang sein")]
    TooLong,
    #[error("Passwort muss Buchstaben und Ziffern enthalten")]
    MissingVariety,
    #[error("Dieses Passwort ist zu verbreitet")]
    TooCommon,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "Sternblitz2025!";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).expect("Verification failed"));
        assert!(!verify_password("wrong_password", &hash).expect("Verification failed"));
    }

    #[test]
    fn test_invalid_hash() {
        assert!(matches!(
            verify_password("irrelevant", "not-a-hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_password_validation() {
        assert!(matches!(
            validate_password_strength("kurz1"),
            Err(PasswordValidationError::TooShort)
        ));
        assert!(matches!(
            validate_password_strength("nurbuchstaben"),
            Err(PasswordValidationError::MissingVariety)
        ));
        assert!(matches!(
            validate_password_strength("1234567890123"),
            Err(PasswordValidationError::MissingVariety)
        ));
        assert!(matches!(
            validate_password_strength("Passwort123"),
            Err(PasswordValidationError::TooCommon)
        ));
        assert!(matches!(
            validate_password_strength(&"a1".repeat(65)),
            Err(PasswordValidationError::TooLong)
        ));

        assert!(validate_password_strength("Bewertung2025").is_ok());
        // Umlauts count as one character each
        assert!(validate_password_strength("Grüße12345").is_ok());
    }
}

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use std::sync::LazyLock;

/// Stand-in hash verified when the user does not exist, so unknown and known
/// usernames take comparable time.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::encode_b64(b"idp-bridge-dummy-salt").ok()?;
    password_hasher().hash_password(b"dummy_startup_value", &salt).ok().map(|h| h.to_string())
});

pub fn password_hasher() -> Argon2<'static> {
    // Argon2id, 19 MiB, two passes: the OWASP baseline for interactive logins
    const MEMORY_COST_KIB: u32 = 19 * 1024;
    const ITERATIONS: u32 = 2;
    const PARALLELISM: u32 = 1;
    match Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32)) {
        Ok(params) => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        Err(_) => Argon2::default(),
    }
}

/// Hash a password into a PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())?;
    Ok(password_hasher().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Check `password` against a stored hash. Argon2 PHC strings and bcrypt
/// (`$2a$`/`$2b$`/`$2y$`) hashes are accepted; anything else never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with("$2") {
        return bcrypt::verify(password, stored).unwrap_or(false);
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => password_hasher().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Burn one verification for a user that does not exist.
pub fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn bcrypt_hashes_verify() {
        let hash = bcrypt::hash("legacy", 4).unwrap();
        assert!(verify_password("legacy", &hash));
        assert!(!verify_password("other", &hash));
    }

    #[test]
    fn unknown_formats_never_match() {
        assert!(!verify_password("plain", "plain"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn dummy_hash_is_available() {
        assert!(DUMMY_HASH.is_some());
        verify_dummy("anything");
    }
}

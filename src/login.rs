use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::role::Role;
use crate::session::SessionUpdate;

/// Credential data submitted by the login form
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Username as typed
    pub username: String,

    /// Password as typed (only transmitted, never stored)
    pub password: String,
}

/// Result of a successful credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Identity recorded in the session
    ///
    /// The normalized username for main users, the username digest for
    /// admins.
    pub identity: String,

    /// Role granted by the matching credential set
    pub role: Role,
}

impl LoginOutcome {
    /// The session fields a successful login sets
    pub fn session_update(&self) -> SessionUpdate {
        SessionUpdate {
            logged_in: Some(true),
            username: Some(self.identity.clone()),
            is_admin: Some(self.role == Role::Admin),
        }
    }
}

/// Trim surrounding whitespace and lower-case
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lower-case hex SHA-256 digest of `text`
pub fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Check a username/password pair against both credential sets
///
/// Main-user accounts are tried first. An account secret may be stored as
/// plain text or as an argon2 PHC string. If no account matches, the
/// SHA-256 digests of the normalized username and password are compared
/// with the configured admin digests.
///
/// # Arguments
/// * `config` - The loaded configuration holding both credential sets
/// * `username` - Username as typed
/// * `password` - Password as typed
///
/// # Returns
/// * `Result<LoginOutcome>` - The identity and role on success
///
/// # Errors
/// * `PortalError::Authentication` for any mismatch; the error never says
///   which part was wrong
pub fn authenticate(config: &PortalConfig, username: &str, password: &str) -> Result<LoginOutcome> {
    let username = normalize(username);
    let password = normalize(password);

    if let Some(stored) = config.accounts.get(&username) {
        if secret_matches(&password, stored) {
            return Ok(LoginOutcome {
                identity: username,
                role: Role::Main,
            });
        }
    }

    let user_digest = sha256_hex(&username);
    let pass_digest = sha256_hex(&password);
    if user_digest.eq_ignore_ascii_case(&config.admin_user)
        && pass_digest.eq_ignore_ascii_case(&config.admin_pass)
    {
        return Ok(LoginOutcome {
            identity: user_digest,
            role: Role::Admin,
        });
    }

    Err(PortalError::Authentication)
}

/// Check the shared passphrase of the simplified page
///
/// # Errors
/// * `PortalError::Passphrase` if the digest differs or no passphrase is
///   configured
pub fn verify_passphrase(config: &PortalConfig, passphrase: &str) -> Result<()> {
    let expected = config
        .simple
        .as_ref()
        .map(|simple| simple.passphrase.as_str())
        .ok_or(PortalError::Passphrase)?;

    if sha256_hex(&normalize(passphrase)).eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(PortalError::Passphrase)
    }
}

fn secret_matches(password: &str, stored: &str) -> bool {
    if stored.starts_with("$argon2") {
        verify_password(password, stored).unwrap_or(false)
    } else {
        password == stored
    }
}

/// Hash a password using Argon2
///
/// Creates a salted Argon2id PHC string suitable for the `accounts` table.
///
/// # Arguments
/// * `password` - The plaintext password to hash
///
/// # Returns
/// * `Result<String, String>` - The password hash or an error
pub fn hash_password(password: &str) -> std::result::Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `Result<bool, String>` - True if the password matches, false if not, or an error
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
pub fn verify_password(password: &str, hash: &str) -> std::result::Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;

    #[test]
    fn main_user_matches_after_normalizing() {
        let config = sample();
        for (user, pass) in [("alice", "secret"), ("  Alice ", "SECRET\n"), ("ALICE", " Secret")] {
            let outcome = authenticate(&config, user, pass).unwrap();
            assert_eq!(outcome.identity, "alice");
            assert_eq!(outcome.role, Role::Main);
        }
    }

    #[test]
    fn single_character_deviation_fails_generically() {
        let config = sample();
        for (user, pass) in [("alice", "secrey"), ("alicf", "secret"), ("alice", "secret!")] {
            let err = authenticate(&config, user, pass).unwrap_err();
            assert_eq!(err, PortalError::Authentication);
        }
    }

    #[test]
    fn unknown_user_and_wrong_password_look_the_same() {
        let config = sample();
        let unknown = authenticate(&config, "mallory", "secret").unwrap_err();
        let wrong = authenticate(&config, "alice", "nope").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn admin_matches_by_digest() {
        let config = sample();
        let outcome = authenticate(&config, " Root", "TOOR ").unwrap();
        assert_eq!(outcome.role, Role::Admin);
        assert_eq!(outcome.identity, sha256_hex("root"));

        let update = outcome.session_update();
        assert_eq!(update.is_admin, Some(true));
        assert_eq!(update.logged_in, Some(true));
    }

    #[test]
    fn argon2_account_secret_verifies() {
        let mut config = sample();
        let hash = hash_password("letmein").unwrap();
        config.accounts.insert("carol".to_string(), hash);

        assert_eq!(authenticate(&config, "Carol", "LetMeIn").unwrap().role, Role::Main);
        assert!(authenticate(&config, "carol", "letmeout").is_err());
    }

    #[test]
    fn digest_is_lower_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn passphrase_is_normalized_then_hashed() {
        let config = sample();
        assert!(verify_passphrase(&config, "  Open Sesame ").is_ok());
        assert_eq!(
            verify_passphrase(&config, "open sesame!").unwrap_err(),
            PortalError::Passphrase
        );
    }
}

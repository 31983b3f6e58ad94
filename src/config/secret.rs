//! Credential handling using the secrecy crate
//!
//! The CRM client secret, the OAuth refresh token and the database connection
//! string are held as [`SecretString`]. Memory is zeroed on drop and `Debug`
//! output is redacted, so configuration structs can be logged safely.
//!
//! # Example
//!
//! ```rust
//! use ccfsync::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("1000.abc".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "1000.abc");
//! assert!(!format!("{token:?}").contains("1000.abc"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if the secret value starts with a prefix
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A zeroize-on-drop string that must be exposed explicitly
pub type SecretString = Secret<SecretValue>;

/// Wrap a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("refresh-token".to_string());
        assert!(secret.expose_secret() == "refresh-token");
        assert!(!secret.expose_secret().is_empty());
        assert!(secret.expose_secret().starts_with("refresh"));
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("client-secret-value".to_string());
        let debug_output = format!("{secret:?}");

        assert!(!debug_output.contains("client-secret-value"));
        assert!(debug_output.contains("REDACTED") || debug_output.contains("Secret"));
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            refresh_token: SecretString,
        }

        let section: Section = toml::from_str("refresh_token = \"1000.xyz\"").unwrap();
        assert_eq!(section.refresh_token.expose_secret().as_ref(), "1000.xyz");
    }
}

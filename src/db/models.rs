//! Record types persisted in the JSON collections.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Collection file for switches.
pub const SWITCHES_FILE: &str = "switches.json";

/// Collection file for encrypted credentials.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Collection file for web users.
pub const USERS_FILE: &str = "users.json";

/// Timestamp format used for `created_at`/`updated_at` fields.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A network switch in the inventory, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    #[serde(rename = "addr")]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    /// ID of a stored credential or credential template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl Switch {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            group: String::new(),
            credential: None,
        }
    }

    /// Display name, falling back to the address when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

/// A credential as stored on disk, with username and password encrypted
/// independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A decrypted credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fields to change on an existing credential. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Fields to change on an existing switch.
///
/// `credential: Some(None)` clears the reference.
#[derive(Debug, Clone, Default)]
pub struct SwitchUpdate {
    pub address: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    pub credential: Option<Option<String>>,
}

/// A web application user. Only read by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_role() -> String {
    "admin".to_string()
}

//! Credential resolution for switch logins.
//!
//! Which username/password a switch gets is decided by an ordered list of
//! strategies; the first one that produces a login wins. The default order:
//!
//! 1. **Referenced**: the credential the switch names, looked up among stored
//!    credentials first and then among templates with that ID.
//! 2. **FirstStored**: the first stored credential, as a fleet-wide default.
//! 3. **MatchingTemplate**: the template whose ID the switch declares.
//! 4. **FirstTemplate**: the first configured template.
//! 5. **Session**: credentials supplied explicitly by the operator.
//!
//! Step 2 means an unreferenced switch picks up whatever credential happens
//! to be stored first. Swap the strategy list to change that.

use std::fmt;

use tracing::debug;

use crate::db::{Credential, Switch};
use crate::error::{BackupError, Result};

/// A statically configured username/password pair, addressable by ID.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialTemplate {
    pub id: String,
    pub name: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CredentialTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialTemplate")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Where a resolved login came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Stored { id: String },
    Template { id: String },
    Session,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Stored { id } => write!(f, "stored credential {}", id),
            CredentialSource::Template { id } => write!(f, "template {}", id),
            CredentialSource::Session => write!(f, "session credentials"),
        }
    }
}

/// A username/password pair ready to use for login.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
    pub source: CredentialSource,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl LoginCredentials {
    /// Operator-supplied credentials (the last-resort strategy).
    pub fn session(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            source: CredentialSource::Session,
        }
    }

    fn from_stored(cred: &Credential) -> Self {
        Self {
            username: cred.username.clone(),
            password: cred.password.clone(),
            source: CredentialSource::Stored {
                id: cred.id.clone(),
            },
        }
    }

    fn from_template(tpl: &CredentialTemplate) -> Self {
        Self {
            username: tpl.username.clone(),
            password: tpl.password.clone(),
            source: CredentialSource::Template { id: tpl.id.clone() },
        }
    }

    fn is_usable(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Everything credential resolution may consult, passed explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext<'a> {
    /// Decrypted stored credentials, in stored order.
    pub stored: &'a [Credential],
    pub templates: &'a [CredentialTemplate],
    pub session: Option<&'a LoginCredentials>,
}

/// One step of the precedence chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStrategy {
    Referenced,
    FirstStored,
    MatchingTemplate,
    FirstTemplate,
    Session,
}

impl CredentialStrategy {
    /// Try this strategy alone.
    pub fn resolve(&self, switch: &Switch, ctx: &ResolveContext<'_>) -> Option<LoginCredentials> {
        let reference = switch.credential.as_deref().filter(|r| !r.is_empty());
        let found = match self {
            CredentialStrategy::Referenced => {
                let id = reference?;
                ctx.stored
                    .iter()
                    .find(|c| c.id == id)
                    .map(LoginCredentials::from_stored)
                    .or_else(|| {
                        ctx.templates
                            .iter()
                            .find(|t| t.id == id)
                            .map(LoginCredentials::from_template)
                    })
            }
            CredentialStrategy::FirstStored => ctx.stored.first().map(LoginCredentials::from_stored),
            CredentialStrategy::MatchingTemplate => {
                let id = reference?;
                ctx.templates
                    .iter()
                    .find(|t| t.id == id)
                    .map(LoginCredentials::from_template)
            }
            CredentialStrategy::FirstTemplate => {
                ctx.templates.first().map(LoginCredentials::from_template)
            }
            CredentialStrategy::Session => ctx.session.cloned(),
        };
        found.filter(LoginCredentials::is_usable)
    }
}

/// Ordered list of strategies; first usable result wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialChain {
    strategies: Vec<CredentialStrategy>,
}

impl Default for CredentialChain {
    fn default() -> Self {
        Self::new(vec![
            CredentialStrategy::Referenced,
            CredentialStrategy::FirstStored,
            CredentialStrategy::MatchingTemplate,
            CredentialStrategy::FirstTemplate,
            CredentialStrategy::Session,
        ])
    }
}

impl CredentialChain {
    pub fn new(strategies: Vec<CredentialStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[CredentialStrategy] {
        &self.strategies
    }

    /// Resolve a login for `switch`, or fail with `NoCredentials`.
    pub fn resolve(&self, switch: &Switch, ctx: &ResolveContext<'_>) -> Result<LoginCredentials> {
        for strategy in &self.strategies {
            if let Some(login) = strategy.resolve(switch, ctx) {
                debug!(switch = %switch.address, ?strategy, source = %login.source, "resolved credentials");
                return Ok(login);
            }
        }
        Err(BackupError::NoCredentials {
            address: switch.address.clone(),
        })
    }
}

//! Inventory access over the JSON datastore.
//!
//! Switches and credentials are plain data access with a little integrity
//! checking: addresses are unique, and a credential cannot be deleted while a
//! switch still references it. Credential fields are encrypted through the
//! [`SecretStore`] on the way in and decrypted on the way out.

use chrono::Local;
use tracing::warn;

use super::models::{
    CREDENTIALS_FILE, Credential, CredentialUpdate, RECORD_TIME_FORMAT, SWITCHES_FILE,
    StoredCredential, Switch, SwitchUpdate, USERS_FILE, User,
};
use super::store::{JsonStore, generate_id};
use crate::crypto::SecretStore;
use crate::error::{BackupError, Result};

/// ID prefix for stored credentials.
pub const CREDENTIAL_ID_PREFIX: &str = "cred_";

fn now_stamp() -> String {
    Local::now().format(RECORD_TIME_FORMAT).to_string()
}

/// Switch, credential and user records in one data directory.
pub struct Inventory {
    store: JsonStore,
    secrets: SecretStore,
    fallback_switches: Vec<Switch>,
}

impl Inventory {
    /// Open the inventory in `store`'s directory, with the key file alongside.
    pub fn new(store: JsonStore) -> Self {
        let secrets = SecretStore::new(store.root());
        Self {
            store,
            secrets,
            fallback_switches: Vec::new(),
        }
    }

    /// Switches to report when `switches.json` is empty (from the config file).
    pub fn with_fallback_switches(mut self, switches: Vec<Switch>) -> Self {
        self.fallback_switches = switches;
        self
    }

    /// The underlying secret store.
    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// The underlying record store.
    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    // ========================================================================
    // Switch operations
    // ========================================================================

    fn stored_switches(&self) -> Vec<Switch> {
        self.store.read(SWITCHES_FILE, Vec::new())
    }

    /// Stored switches, or the fallback list when nothing is stored yet.
    ///
    /// Mutations seed the stored collection from this list first, so the
    /// fallback switches are never silently dropped.
    fn editable_switches(&self) -> Vec<Switch> {
        let stored = self.stored_switches();
        if stored.is_empty() {
            self.fallback_switches.clone()
        } else {
            stored
        }
    }

    /// All switches in inventory order.
    pub fn list_switches(&self) -> Vec<Switch> {
        self.editable_switches()
    }

    /// Look up a switch by address.
    pub fn get_switch(&self, address: &str) -> Option<Switch> {
        self.list_switches()
            .into_iter()
            .find(|s| s.address == address)
    }

    /// Add a switch. Fails if the address is already present.
    pub fn create_switch(&self, switch: Switch) -> Result<()> {
        if switch.address.trim().is_empty() {
            return Err(BackupError::validation("switch address is required"));
        }
        let mut switches = self.editable_switches();
        if switches.iter().any(|s| s.address == switch.address) {
            return Err(BackupError::validation(format!(
                "switch with address {} already exists",
                switch.address
            )));
        }
        switches.push(switch);
        self.store.write(SWITCHES_FILE, &switches)
    }

    /// Update a switch identified by its current address.
    pub fn update_switch(&self, address: &str, update: SwitchUpdate) -> Result<()> {
        let mut switches = self.editable_switches();

        if let Some(new_addr) = &update.address
            && new_addr != address
            && switches.iter().any(|s| &s.address == new_addr)
        {
            return Err(BackupError::validation(format!(
                "switch with address {} already exists",
                new_addr
            )));
        }

        let switch = switches
            .iter_mut()
            .find(|s| s.address == address)
            .ok_or_else(|| BackupError::not_found(format!("switch not found: {}", address)))?;

        if let Some(new_addr) = update.address {
            switch.address = new_addr;
        }
        if let Some(name) = update.name {
            switch.name = name;
        }
        if let Some(group) = update.group {
            switch.group = group;
        }
        if let Some(credential) = update.credential {
            switch.credential = credential.filter(|c| !c.is_empty());
        }

        self.store.write(SWITCHES_FILE, &switches)
    }

    /// Copy switches into the stored collection, skipping addresses that are
    /// already stored. Returns how many were added.
    pub fn import_switches(&self, switches: &[Switch]) -> Result<usize> {
        let mut stored = self.stored_switches();
        let mut added = 0;
        for switch in switches {
            if switch.address.trim().is_empty()
                || stored.iter().any(|s| s.address == switch.address)
            {
                continue;
            }
            stored.push(switch.clone());
            added += 1;
        }
        if added > 0 {
            self.store.write(SWITCHES_FILE, &stored)?;
        }
        Ok(added)
    }

    /// Remove a switch by address.
    pub fn delete_switch(&self, address: &str) -> Result<()> {
        let mut switches = self.editable_switches();
        let before = switches.len();
        switches.retain(|s| s.address != address);
        if switches.len() == before {
            return Err(BackupError::not_found(format!("switch not found: {}", address)));
        }
        self.store.write(SWITCHES_FILE, &switches)
    }

    // ========================================================================
    // Credential operations
    // ========================================================================

    fn stored_credentials(&self) -> Vec<StoredCredential> {
        self.store.read(CREDENTIALS_FILE, Vec::new())
    }

    fn decrypt_credential(&self, stored: &StoredCredential) -> Result<Credential> {
        Ok(Credential {
            id: stored.id.clone(),
            name: stored.name.clone(),
            username: self.secrets.decrypt_str(&stored.username)?,
            password: self.secrets.decrypt_str(&stored.password)?,
            created_at: stored.created_at.clone(),
            updated_at: stored.updated_at.clone(),
        })
    }

    /// All credentials that decrypt successfully, in stored order.
    ///
    /// A credential that fails to decrypt is logged and skipped so it can't
    /// hide the others.
    pub fn list_credentials(&self) -> Vec<Credential> {
        self.stored_credentials()
            .iter()
            .filter_map(|stored| match self.decrypt_credential(stored) {
                Ok(cred) => Some(cred),
                Err(e) => {
                    warn!(id = %stored.id, error = %e, "skipping unreadable credential");
                    None
                }
            })
            .collect()
    }

    /// Look up and decrypt a credential by ID.
    ///
    /// Returns `None` if the ID is unknown or the record cannot be decrypted.
    pub fn get_credential(&self, id: &str) -> Option<Credential> {
        let stored = self.stored_credentials().into_iter().find(|c| c.id == id)?;
        match self.decrypt_credential(&stored) {
            Ok(cred) => Some(cred),
            Err(e) => {
                warn!(id = %id, error = %e, "credential cannot be decrypted");
                None
            }
        }
    }

    /// Encrypt and store a new credential. Returns its generated ID.
    pub fn create_credential(&self, name: &str, username: &str, password: &str) -> Result<String> {
        let mut creds = self.stored_credentials();
        let id = generate_id(CREDENTIAL_ID_PREFIX);
        let now = now_stamp();
        creds.push(StoredCredential {
            id: id.clone(),
            name: name.to_string(),
            username: self.secrets.encrypt_str(username)?,
            password: self.secrets.encrypt_str(password)?,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        });
        self.store.write(CREDENTIALS_FILE, &creds)?;
        Ok(id)
    }

    /// Update a credential, re-encrypting username and password when either
    /// changes.
    pub fn update_credential(&self, id: &str, update: CredentialUpdate) -> Result<()> {
        let mut creds = self.stored_credentials();
        let stored = creds
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| BackupError::not_found(format!("credential not found: {}", id)))?;

        if let Some(name) = update.name {
            stored.name = name;
        }

        if update.username.is_some() || update.password.is_some() {
            let current = self.decrypt_credential(stored)?;
            let username = update.username.unwrap_or(current.username);
            let password = update.password.unwrap_or(current.password);
            stored.username = self.secrets.encrypt_str(&username)?;
            stored.password = self.secrets.encrypt_str(&password)?;
        }

        stored.updated_at = Some(now_stamp());
        self.store.write(CREDENTIALS_FILE, &creds)
    }

    /// Delete a credential unless a switch still references it.
    pub fn delete_credential(&self, id: &str) -> Result<()> {
        let mut creds = self.stored_credentials();
        let before = creds.len();
        creds.retain(|c| c.id != id);
        if creds.len() == before {
            return Err(BackupError::not_found(format!("credential not found: {}", id)));
        }

        let users: Vec<String> = self
            .list_switches()
            .into_iter()
            .filter(|s| s.credential.as_deref() == Some(id))
            .map(|s| s.address)
            .collect();
        if !users.is_empty() {
            return Err(BackupError::CredentialInUse {
                id: id.to_string(),
                switches: users,
            });
        }

        self.store.write(CREDENTIALS_FILE, &creds)
    }

    // ========================================================================
    // User operations
    // ========================================================================

    /// Web users, read-only.
    pub fn list_users(&self) -> Vec<User> {
        self.store.read(USERS_FILE, Vec::new())
    }
}

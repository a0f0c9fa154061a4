//! JSON datastore for switches, credentials and users.

pub mod location;
mod models;
mod repository;
mod store;

pub use models::{
    CREDENTIALS_FILE, Credential, CredentialUpdate, SWITCHES_FILE, StoredCredential, Switch,
    SwitchUpdate, USERS_FILE, User,
};
pub use repository::{CREDENTIAL_ID_PREFIX, Inventory};
pub use store::{JsonStore, generate_id};

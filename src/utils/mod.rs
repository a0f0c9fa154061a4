//! Utility functions shared across the application.

pub(crate) mod permissions;
mod redact;

pub use permissions::{
    OWNER_ONLY_MODE, is_dir_writable, open_for_update, restrict_file_permissions,
};
pub use redact::{mask_secret, redact_text, redact_url};

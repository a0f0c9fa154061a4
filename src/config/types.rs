//! Configuration type definitions.

use std::path::PathBuf;
use std::time::Duration;

use knuffel::Decode;

use crate::backup::DEFAULT_RETENTION;
use crate::credentials::CredentialTemplate;
use crate::db::Switch;
use crate::fetch::FetchOptions;

/// Expand tilde (~) prefix to the user's home directory.
/// Handles both "~" alone and "~/path/to/something" patterns.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Main configuration structure parsed from switchback.kdl.
#[derive(Debug, Decode, Clone, Default)]
pub struct Config {
    #[knuffel(child)]
    pub defaults: Option<Defaults>,

    #[knuffel(children(name = "template"))]
    pub templates: Vec<TemplateConfig>,

    #[knuffel(children(name = "switch"))]
    pub switches: Vec<SwitchConfig>,
}

/// Default settings for switchback.
#[derive(Debug, Decode, Clone, Default)]
pub struct Defaults {
    #[knuffel(property(name = "data_dir"))]
    pub data_dir: Option<String>,

    #[knuffel(property(name = "backup_dir"))]
    pub backup_dir: Option<String>,

    /// Snapshots kept per switch; zero or negative keeps everything.
    #[knuffel(property)]
    pub retention: Option<i64>,

    /// Seconds allowed for one running-config fetch.
    #[knuffel(property(name = "fetch_timeout"))]
    pub fetch_timeout: Option<u64>,

    #[knuffel(property(name = "ssh_port"))]
    pub ssh_port: Option<u16>,
}

/// A statically configured credential template.
#[derive(Debug, Decode, Clone, PartialEq, Eq)]
pub struct TemplateConfig {
    #[knuffel(argument)]
    pub id: String,

    #[knuffel(property)]
    pub name: Option<String>,

    #[knuffel(property)]
    pub username: String,

    #[knuffel(property)]
    pub password: String,
}

impl TemplateConfig {
    pub fn to_template(&self) -> CredentialTemplate {
        CredentialTemplate {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// A switch listed in the config file, used when the datastore has none.
#[derive(Debug, Decode, Clone, PartialEq, Eq)]
pub struct SwitchConfig {
    #[knuffel(argument)]
    pub address: String,

    #[knuffel(property)]
    pub name: Option<String>,

    #[knuffel(property)]
    pub group: Option<String>,

    /// Credential or template ID.
    #[knuffel(property)]
    pub credential: Option<String>,
}

impl SwitchConfig {
    pub fn to_switch(&self) -> Switch {
        Switch {
            address: self.address.clone(),
            name: self.name.clone().unwrap_or_default(),
            group: self.group.clone().unwrap_or_default(),
            credential: self.credential.clone().filter(|c| !c.is_empty()),
        }
    }
}

impl Config {
    /// Explicit data directory, if configured. `None` means the system/exe
    /// fallback policy applies.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.defaults
            .as_ref()
            .and_then(|d| d.data_dir.as_deref())
            .map(expand_tilde)
    }

    /// Explicit backup root, if configured.
    pub fn backup_dir(&self) -> Option<PathBuf> {
        self.defaults
            .as_ref()
            .and_then(|d| d.backup_dir.as_deref())
            .map(expand_tilde)
    }

    /// Get the retention count, defaulting to 30
    pub fn retention(&self) -> i64 {
        self.defaults
            .as_ref()
            .and_then(|d| d.retention)
            .unwrap_or(DEFAULT_RETENTION)
    }

    /// Get the fetch timeout, defaulting to 60 seconds
    pub fn fetch_timeout(&self) -> Duration {
        self.defaults
            .as_ref()
            .and_then(|d| d.fetch_timeout)
            .map(Duration::from_secs)
            .unwrap_or_else(|| FetchOptions::default().timeout)
    }

    pub fn ssh_port(&self) -> u16 {
        self.defaults
            .as_ref()
            .and_then(|d| d.ssh_port)
            .unwrap_or_else(|| FetchOptions::default().port)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            port: self.ssh_port(),
            timeout: self.fetch_timeout(),
            ..FetchOptions::default()
        }
    }

    pub fn credential_templates(&self) -> Vec<CredentialTemplate> {
        self.templates.iter().map(TemplateConfig::to_template).collect()
    }

    pub fn fallback_switches(&self) -> Vec<Switch> {
        self.switches.iter().map(SwitchConfig::to_switch).collect()
    }

    /// Look up a template by ID.
    pub fn template(&self, id: &str) -> Option<&TemplateConfig> {
        self.templates.iter().find(|t| t.id == id)
    }
}

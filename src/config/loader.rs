//! Configuration file loading and saving.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::error::{BackupError, Result};

/// Config file name looked up in every search location.
pub const CONFIG_FILE_NAME: &str = "switchback.kdl";

/// System-wide config location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/switchback/switchback.kdl";

impl Config {
    /// Get the explicit ~/.config/switchback/switchback.kdl path
    fn xdg_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config/switchback").join(CONFIG_FILE_NAME))
    }

    /// Get the list of config file search paths in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. ./switchback.kdl
        paths.push(PathBuf::from(CONFIG_FILE_NAME));

        // 2. ~/.config/switchback/switchback.kdl
        if let Some(xdg_path) = Self::xdg_config_path() {
            paths.push(xdg_path);
        }

        // 3. Platform-native config directory, when it differs from the XDG path
        if let Some(config_dir) = dirs::config_dir() {
            let native_path = config_dir.join("switchback").join(CONFIG_FILE_NAME);
            if Self::xdg_config_path().as_ref() != Some(&native_path) {
                paths.push(native_path);
            }
        }

        // 4. /etc/switchback/switchback.kdl
        paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));

        paths
    }

    /// Find the first existing config file in the search paths.
    pub fn find_existing_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.exists())
    }

    /// Get the default config path (~/.config/switchback/switchback.kdl)
    pub fn default_config_path() -> PathBuf {
        Self::xdg_config_path().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackupError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&path.display().to_string(), &content)
    }

    /// Parse KDL text; `name` is used in error messages.
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        knuffel::parse::<Config>(name, content)
            .map_err(|e| BackupError::config(format!("{}: {}", name, e)))
    }

    /// Load `explicit` if given, otherwise the first config found in the
    /// search paths, otherwise an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_path(path)?, Some(path.to_path_buf())));
        }
        match Self::find_existing_config() {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Ok((Self::load_from_path(&path)?, Some(path)))
            }
            None => {
                debug!("no config file found, using defaults");
                Ok((Config::default(), None))
            }
        }
    }

    /// Write a commented default config file.
    pub fn generate_config_file(path: Option<PathBuf>, overwrite: bool) -> Result<PathBuf> {
        let config_path = path.unwrap_or_else(Self::default_config_path);

        if config_path.exists() && !overwrite {
            return Err(BackupError::validation(format!(
                "Config file already exists at: {}. Use --overwrite to replace it.",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let kdl_content = r#"// switchback configuration
// Unset directories fall back to /var/lib/switchback/{data,backups} when
// writable, otherwise to data/ and backups/ next to the executable.
// retention is snapshots kept per switch (0 keeps everything).
// fetch_timeout is in seconds.
defaults retention=30 fetch_timeout=60 ssh_port=22
// data_dir="/var/lib/switchback/data" backup_dir="/var/lib/switchback/backups"

// Credential templates, referenced from switches by ID
// template "tpl1" name="Core switches" username="admin" password="changeme"

// Switches used when the datastore has none
// switch "10.0.0.1" name="core-1" group="core" credential="tpl1"
"#;

        std::fs::write(&config_path, kdl_content)?;
        Ok(config_path)
    }

    /// Serialize config to KDL format
    pub fn to_kdl(&self) -> String {
        let mut output = String::new();
        output.push_str("// switchback configuration file\n\n");

        output.push_str("defaults");
        if let Some(d) = &self.defaults {
            if let Some(data_dir) = &d.data_dir {
                output.push_str(&format!(" data_dir={}", quote(data_dir)));
            }
            if let Some(backup_dir) = &d.backup_dir {
                output.push_str(&format!(" backup_dir={}", quote(backup_dir)));
            }
            if let Some(retention) = d.retention {
                output.push_str(&format!(" retention={}", retention));
            }
            if let Some(timeout) = d.fetch_timeout {
                output.push_str(&format!(" fetch_timeout={}", timeout));
            }
            if let Some(port) = d.ssh_port {
                output.push_str(&format!(" ssh_port={}", port));
            }
        }
        output.push('\n');

        if !self.templates.is_empty() {
            output.push('\n');
        }
        for t in &self.templates {
            output.push_str(&format!("template {}", quote(&t.id)));
            if let Some(name) = &t.name {
                output.push_str(&format!(" name={}", quote(name)));
            }
            output.push_str(&format!(
                " username={} password={}\n",
                quote(&t.username),
                quote(&t.password)
            ));
        }

        if !self.switches.is_empty() {
            output.push('\n');
        }
        for s in &self.switches {
            output.push_str(&format!("switch {}", quote(&s.address)));
            if let Some(name) = &s.name {
                output.push_str(&format!(" name={}", quote(name)));
            }
            if let Some(group) = &s.group {
                output.push_str(&format!(" group={}", quote(group)));
            }
            if let Some(credential) = &s.credential {
                output.push_str(&format!(" credential={}", quote(credential)));
            }
            output.push('\n');
        }

        output
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_kdl())?;
        Ok(())
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

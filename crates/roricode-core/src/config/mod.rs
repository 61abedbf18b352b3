//! Profile configuration file support.
//!
//! The configuration lives in `$RORICODE_HOME/.roricode/config.toml`, falling
//! back to the user's home directory when `RORICODE_HOME` is unset. A missing
//! file is created with a single empty `default` profile.

mod profile;

pub use profile::{DEFAULT_MODEL, Profile};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the profile created for a fresh installation.
pub const DEFAULT_PROFILE: &str = "default";

/// Environment variable that overrides the configuration root.
pub const HOME_ENV: &str = "RORICODE_HOME";

/// Errors that can occur while loading or editing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `RORICODE_HOME` nor a home directory is available.
    #[error("Cannot determine configuration directory: set RORICODE_HOME")]
    NoHomeDirectory,

    /// Failed to read the configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to write the configuration file.
    #[error("Failed to write configuration file: {0}")]
    WriteError(String),

    /// Failed to parse or serialize the configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// The configuration has no profiles at all.
    #[error("No profiles defined")]
    NoProfiles,

    /// The named profile does not exist.
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),

    /// A profile with that name already exists.
    #[error("Profile '{0}' already exists")]
    ProfileExists(String),

    /// The last remaining profile cannot be deleted.
    #[error("Cannot delete '{0}': it is the only profile")]
    LastProfile(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// The on-disk configuration: a set of named profiles and the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the profile used when none is requested explicitly.
    #[serde(default)]
    pub active_profile: String,

    /// All known profiles, ordered by name.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), Profile::default());
        Self { active_profile: DEFAULT_PROFILE.to_string(), profiles }
    }
}

impl Config {
    /// Returns the path of the configuration file.
    pub fn default_path() -> ConfigResult<PathBuf> {
        let root = match std::env::var(HOME_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?,
        };
        Ok(root.join(".roricode").join("config.toml"))
    }

    /// Loads the configuration from the default path, creating it if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Loads the configuration from `path`, creating a default file if missing.
    ///
    /// The active profile is resolved on load: when it names a profile that
    /// does not exist, the first profile by name becomes active.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Configuration missing, writing defaults");
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        config.resolve_active()?;
        Ok(config)
    }

    /// Saves the configuration to the default path.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Saves the configuration to `path`, readable only by the owner.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(format!("Failed to create directory: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", path.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| ConfigError::WriteError(format!("{}: {}", path.display(), e)))?;
        }

        Ok(())
    }

    /// Makes sure `active_profile` names an existing profile.
    pub fn resolve_active(&mut self) -> ConfigResult<()> {
        if self.profiles.contains_key(&self.active_profile) {
            return Ok(());
        }
        let first = self.profiles.keys().next().cloned().ok_or(ConfigError::NoProfiles)?;
        if !self.active_profile.is_empty() {
            warn!(
                requested = %self.active_profile,
                using = %first,
                "Active profile not found, falling back to first profile"
            );
        }
        self.active_profile = first;
        Ok(())
    }

    /// The profile currently in effect, if any.
    pub fn current_profile(&self) -> Option<&Profile> {
        self.profiles.get(&self.active_profile)
    }

    /// True if the active profile exists and carries an API key.
    pub fn is_valid(&self) -> bool {
        self.current_profile().is_some_and(Profile::is_configured)
    }

    /// Looks up a profile by name.
    pub fn profile(&self, name: &str) -> ConfigResult<&Profile> {
        self.profiles.get(name).ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))
    }

    /// Adds a new profile. Fails if the name is taken.
    pub fn add_profile(&mut self, name: &str, profile: Profile) -> ConfigResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidValue("profile name cannot be empty".to_string()));
        }
        if self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileExists(name.to_string()));
        }
        self.profiles.insert(name.to_string(), profile);
        if self.active_profile.is_empty() {
            self.active_profile = name.to_string();
        }
        Ok(())
    }

    /// Updates fields of an existing profile. `None` leaves a field unchanged;
    /// an empty base URL clears it.
    pub fn update_profile(
        &mut self,
        name: &str,
        api_key: Option<String>,
        base_url: Option<String>,
        model: Option<String>,
    ) -> ConfigResult<()> {
        let profile = self
            .profiles
            .get_mut(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;
        if let Some(key) = api_key {
            profile.api_key = key;
        }
        if let Some(url) = base_url {
            profile.base_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if let Some(model) = model {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidValue("model cannot be empty".to_string()));
            }
            profile.model = model;
        }
        Ok(())
    }

    /// Removes a profile. Deleting the active profile activates the first remaining one.
    pub fn remove_profile(&mut self, name: &str) -> ConfigResult<Profile> {
        if !self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        if self.profiles.len() == 1 {
            return Err(ConfigError::LastProfile(name.to_string()));
        }
        let removed = self
            .profiles
            .remove(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;
        if self.active_profile == name {
            self.resolve_active()?;
        }
        Ok(removed)
    }

    /// Makes `name` the active profile.
    pub fn switch_profile(&mut self, name: &str) -> ConfigResult<()> {
        if !self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        self.active_profile = name.to_string();
        Ok(())
    }
}

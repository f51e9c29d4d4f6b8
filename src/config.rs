// Credential persistence: a flat JSON record stored in the user's home
// directory. A missing file is an empty configuration, not an error.

use crate::error::{Result, ValidatorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// File name of the configuration inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".validator_config.json";

/// Jenkins server URL plus the username/API token pair used for basic auth.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    #[serde(rename = "jenkins_url", default)]
    pub server_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
}

impl Credentials {
    /// All three fields must be set before any request is made.
    pub fn is_complete(&self) -> bool {
        !self.server_url.is_empty() && !self.username.is_empty() && !self.token.is_empty()
    }

    /// True when nothing has been configured yet.
    pub fn is_empty(&self) -> bool {
        self.server_url.is_empty() && self.username.is_empty() && self.token.is_empty()
    }

    /// One `*` per token character.
    pub fn masked_token(&self) -> String {
        "*".repeat(self.token.chars().count())
    }

    /// Server URL without trailing slashes, ready for endpoint paths.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("token", &self.masked_token())
            .finish()
    }
}

/// Reads and writes [`Credentials`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at `~/.validator_config.json`.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ValidatorError::HomeDirUnavailable)?;
        Ok(Self::at(home.join(CONFIG_FILE_NAME)))
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credentials; a missing file gives an empty record.
    pub fn load(&self) -> Result<Credentials> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config file, using empty settings");
                return Ok(Credentials::default());
            }
            Err(source) => {
                return Err(ValidatorError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let creds = serde_json::from_str(&raw).map_err(|source| ValidatorError::Parse {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "loaded config");
        Ok(creds)
    }

    /// Overwrites the file with pretty-printed JSON.
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        let data = serde_json::to_string_pretty(creds).map_err(|e| ValidatorError::Write {
            path: self.path.clone(),
            source: io::Error::new(ErrorKind::InvalidData, e),
        })?;
        fs::write(&self.path, data).map_err(|source| ValidatorError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "saved config");
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fs, io};
use thiserror::Error as ThisError;

use crate::opt::Opts;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to load configuration - {0}")]
    Load(io::Error),
    #[error("failed to deserialize configuration - {0}")]
    Deserialize(serde_yaml::Error),
    #[error("failed to determine user config directory")]
    FindUserDir,
}

const CONFIG_FILE: &str = "xattr.yml";

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub pretty_output: bool,
    #[serde(default)]
    pub keep_going: bool,
    #[serde(default)]
    pub no_dereference: bool,
}

impl Config {
    /// Loads Config from provided `path` by appending [CONFIG_FILE](CONFIG_FILE) name to it and
    /// reading the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().join(CONFIG_FILE);
        serde_yaml::from_slice(&fs::read(path).map_err(ConfigError::Load)?)
            .map_err(ConfigError::Deserialize)
    }

    /// Loads config file from config directory of user executing the program
    pub fn load_default_location() -> Result<Self, ConfigError> {
        Self::load(dirs::config_dir().ok_or(ConfigError::FindUserDir)?)
    }

    /// Like [load_default_location](Config::load_default_location) but falls back to defaults.
    /// A missing file is expected, anything else is worth a warning.
    pub fn load_or_default() -> Self {
        match Self::load_default_location() {
            Ok(config) => config,
            Err(ConfigError::Load(e)) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("{e}, using defaults");
                Self::default()
            }
        }
    }
}

/// Effective behavior of a run. Each switch is on if either the flag or the config enables it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub keep_going: bool,
    pub no_dereference: bool,
    pub pretty: bool,
}

impl Settings {
    pub fn new(opts: &Opts, config: &Config) -> Self {
        Self {
            keep_going: opts.keep_going || config.keep_going,
            no_dereference: opts.no_dereference || config.no_dereference,
            pretty: opts.pretty || config.pretty_output,
        }
    }
}

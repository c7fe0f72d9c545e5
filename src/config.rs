use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Name of the MP2D executable to look up on `PATH`, or a path to it if
    /// the name contains a path separator
    pub program: String,

    /// Directory in which to create the per-call scratch directories. Defaults
    /// to the system temporary directory
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: String::from("mp2d"),
            scratch_dir: None,
        }
    }
}

impl Config {
    pub fn load(filename: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(filename)?;
        Ok(toml::from_str(&contents)?)
    }
}

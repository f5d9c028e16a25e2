//! Configuration management for arbor
//!
//! The configuration is stored as TOML at `$HOME/.arbor/config.toml` and supplies defaults for
//! the structurizer flags a user does not pass explicitly.

/// Error types for the configuration module
pub mod error;

use std::path::PathBuf;

use crate::error::Error;
use arbor_common::utils::io::file::{delete_path, read_file, write_file};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Command line arguments for the configuration command
#[derive(Debug, Clone, Parser)]
#[clap(
    about = "Display and edit the current configuration",
    override_usage = "arbor config [OPTIONS]"
)]
pub struct ConfigArgs {
    /// The target key to update.
    #[clap(required = false, default_value = "")]
    key: String,

    /// The value to set the key to.
    #[clap(required = false, default_value = "")]
    value: String,
}

/// The [`Configuration`] struct holds the defaults the cli applies to every structurize run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Configuration {
    /// The prefix of synthesized guard variable names
    pub guard_prefix: String,

    /// The number of spaces per indentation level of printed pseudo code
    pub indent_width: usize,

    /// Whether printed pseudo code marks the start of every basic block
    pub emit_block_markers: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            guard_prefix: "guard".to_string(),
            indent_width: 4,
            emit_block_markers: false,
        }
    }
}

/// The location of the configuration file.
#[allow(deprecated)]
fn config_path() -> Result<String, Error> {
    let mut home: PathBuf = std::env::home_dir().ok_or_else(|| {
        Error::Generic(
            "failed to get home directory. does your os support `std::env::home_dir()`?"
                .to_string(),
        )
    })?;
    home.push(".arbor");
    home.push("config.toml");

    home.to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Generic("failed to convert path to string".to_string()))
}

impl Configuration {
    /// Returns the current configuration, writing the defaults first if no file exists.
    pub fn load() -> Result<Self, Error> {
        let path = config_path()?;

        if !std::path::Path::new(&path).exists() {
            debug!("no configuration found at '{path}', writing defaults");
            Configuration::default().save()?;
        }

        let contents = read_file(&path)
            .map_err(|e| Error::Generic(format!("failed to read config file: {e}")))?;

        toml::from_str(&contents)
            .map_err(|e| Error::ParseError(format!("failed to parse config file: {e}")))
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> Result<(), Error> {
        let contents = toml::to_string(&self)
            .map_err(|e| Error::ParseError(format!("failed to serialize config: {e}")))?;

        write_file(&config_path()?, &contents)
            .map_err(|e| Error::Generic(format!("failed to write config file: {e}")))
    }

    /// Deletes the configuration file at `$HOME/.arbor/config.toml`.
    pub fn delete() -> Result<(), Error> {
        let path = config_path()?;
        match delete_path(&path) {
            true => Ok(()),
            false => Err(Error::Generic(format!("failed to delete config file '{path}'"))),
        }
    }

    /// Update a single key/value pair in the configuration and save it.
    pub fn update(&mut self, key: &str, value: &str) -> Result<(), Error> {
        match key {
            "guard_prefix" => {
                let is_identifier = value
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_') &&
                    value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !is_identifier {
                    return Err(Error::ParseError(format!(
                        "invalid value: '{value}' is not a valid identifier prefix."
                    )));
                }
                self.guard_prefix = value.to_string();
            }
            "indent_width" => {
                self.indent_width = value.parse().map_err(|_| {
                    Error::ParseError(format!(
                        "invalid value: '{value}' is not a non-negative integer."
                    ))
                })?;
            }
            "emit_block_markers" => {
                self.emit_block_markers = value.parse().map_err(|_| {
                    Error::ParseError(format!("invalid value: '{value}' is not 'true' or 'false'."))
                })?;
            }
            _ => {
                return Err(Error::Generic(format!(
                    "invalid key: \'{key}\' is not a valid configuration key."
                )))
            }
        }

        self.save()
    }
}

/// The `config` command is used to display and edit the current configuration.
pub fn config(args: ConfigArgs) -> Result<(), Error> {
    if !args.key.is_empty() {
        if !args.value.is_empty() {
            let mut config = Configuration::load()?;
            config.update(&args.key, &args.value)?;
            info!("updated configuration! Set \'{}\' = \'{}\' .", &args.key, &args.value);
        } else {
            error!("found key but no value to set. Please specify a value to set, use `arbor config --help` for more information.");
        }
    } else {
        println!("{:#?}", Configuration::load()?);
        info!("use `arbor config <KEY> <VALUE>` to set a key/value pair.");
    }

    Ok(())
}

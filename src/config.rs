use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Formatting and file settings, passed explicitly to everything that reads or writes text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Written before every line and between tokens.
    pub indent: String,
    pub verbosity: Verbosity,
    /// Digits after the decimal point of doubles written in scientific
    /// notation; shortest round-trip form when unset.
    pub float_precision: Option<usize>,
    /// Added to cellid components on write, subtracted on read.
    pub cellid_offset: i64,
    /// Directory relative external file paths are resolved against.
    pub model_ws: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indent: String::from("  "),
            verbosity: Verbosity::Normal,
            float_precision: None,
            cellid_offset: 0,
            model_ws: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Defaults, overridden by an optional settings file and then by
    /// `LISTDATA_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("LISTDATA").try_parsing(true))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.model_ws.join(path)
        }
    }
}

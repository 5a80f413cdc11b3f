use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::error::{PrepError, PrepResult};

/// Options recognized by the preparation core.
///
/// Every field has a default so a partial TOML file (or none at all) is a
/// valid configuration.
///
/// ```
/// use hyprep::utils::conf::ModuleOptions;
///
/// let opts = ModuleOptions::from_toml_str("entry_point = \"start\"\noptimize = true").unwrap();
/// assert_eq!(opts.entry_point, "start");
/// assert!(opts.optimize);
/// assert!(opts.check_div_zero);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleOptions {
    /// Directory holding the prelinked runtime-support libraries.
    pub library_dir: Option<PathBuf>,
    /// Function used as the linking root and kept alive by optimization.
    /// Empty means "no entry point".
    pub entry_point: String,
    pub optimize: bool,
    pub check_div_zero: bool,
    pub check_overshift: bool,
    pub with_fp_runtime: bool,
    pub with_posix_runtime: bool,
    /// Default coverage eligibility of non-internal functions.
    pub track_coverage: bool,
    /// Emit the textual module when manifesting.
    pub output_source: bool,
    /// Emit the binary module when manifesting.
    pub output_module: bool,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            library_dir: None,
            entry_point: "main".to_string(),
            optimize: false,
            check_div_zero: true,
            check_overshift: true,
            with_fp_runtime: false,
            with_posix_runtime: false,
            track_coverage: true,
            output_source: true,
            output_module: false,
        }
    }
}

impl ModuleOptions {
    /// The configured entry point, if any.
    pub fn entry(&self) -> Option<&str> {
        if self.entry_point.is_empty() {
            None
        } else {
            Some(&self.entry_point)
        }
    }

    pub fn from_toml_str(toml_str: &str) -> PrepResult<Self> {
        toml::from_str(toml_str).map_err(|e| PrepError::ConfigParse {
            source: e,
            file: "<inline>".to_string(),
        })
    }

    /// Load options from a TOML file.
    pub fn load_from_toml(path: &Path) -> PrepResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;

        toml::from_str(&toml_str).map_err(|e| PrepError::ConfigParse {
            source: e,
            file: path.display().to_string(),
        })
    }
}

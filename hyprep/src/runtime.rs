//! Runtime-support libraries.
//!
//! The libraries are prelinked modules stored in the binary manifest format
//! under the configured library directory.
use hyinstr::modules::Module;
use log::{debug, info};

use crate::{
    magic::{FP_RUNTIME_LIB_NAME, INTRINSIC_LIB_NAME, POSIX_RUNTIME_LIB_NAME},
    manifest::ModuleStorage,
    utils::{conf::ModuleOptions, error::PrepResult},
};

/// File names of the libraries requested by `opts`, in link order.
pub fn runtime_library_names(opts: &ModuleOptions) -> Vec<&'static str> {
    let mut names = vec![INTRINSIC_LIB_NAME];
    if opts.with_fp_runtime {
        names.push(FP_RUNTIME_LIB_NAME);
    }
    if opts.with_posix_runtime {
        names.push(POSIX_RUNTIME_LIB_NAME);
    }
    names
}

/// Load the runtime-support modules requested by `opts`. Nothing is loaded
/// when no library directory is configured.
pub fn load_runtime_libraries(opts: &ModuleOptions) -> PrepResult<Vec<Module>> {
    let Some(dir) = &opts.library_dir else {
        debug!("No library directory configured; skipping runtime-support libraries");
        return Ok(Vec::new());
    };

    let mut modules = Vec::new();
    for name in runtime_library_names(opts) {
        let path = dir.join(name);
        debug!("Loading runtime library {}", path.display());
        modules.push(ModuleStorage::load(&path)?);
    }
    info!("Loaded {} runtime-support module(s)", modules.len());
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::PrepError;

    #[test]
    fn names_follow_options() {
        let opts = ModuleOptions {
            with_posix_runtime: true,
            ..Default::default()
        };
        assert_eq!(
            runtime_library_names(&opts),
            vec![INTRINSIC_LIB_NAME, POSIX_RUNTIME_LIB_NAME]
        );
    }

    #[test]
    fn no_directory_loads_nothing() {
        assert!(load_runtime_libraries(&ModuleOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn missing_library_is_an_io_error() {
        let opts = ModuleOptions {
            library_dir: Some(std::env::temp_dir().join(format!("hyprep-missing-{}", uuid::Uuid::new_v4()))),
            ..Default::default()
        };
        assert!(matches!(load_runtime_libraries(&opts), Err(PrepError::Io(_))));
    }
}

//! Debugging artifacts of a prepared module.
//!
//! The textual form is the module's `Display` output. The binary form wraps
//! the CBOR encoded module in a [`ModuleStorage`] envelope carrying magic
//! bytes and the exact crate version that wrote it; the runtime-support
//! libraries are stored in the same format.
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use hyinstr::modules::Module;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    magic::{ASSEMBLY_FILE_NAME, MODULE_FILE_NAME},
    utils::error::{PrepError, PrepResult},
};

/// Where manifest artifacts are written.
pub trait ReportHandler {
    fn open_output_file(&self, name: &str) -> std::io::Result<Box<dyn Write>>;
}

/// Writes every artifact as a file of a directory.
#[derive(Debug, Clone)]
pub struct DirectoryHandler {
    dir: PathBuf,
}

impl DirectoryHandler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportHandler for DirectoryHandler {
    fn open_output_file(&self, name: &str) -> std::io::Result<Box<dyn Write>> {
        std::fs::create_dir_all(&self.dir)?;
        let file = std::fs::File::create(self.dir.join(name))?;
        Ok(Box::new(std::io::BufWriter::new(file)))
    }
}

/// Binary module storage format.
///
/// This structure must stay stable: older files are recognized through
/// [`ModuleStorage::MAGIC_BYTES`] and rejected through `version_req` rather
/// than misread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStorage {
    pub magic: [u8; 8],
    pub version_req: semver::VersionReq,
    pub data: Vec<u8>,
}

impl ModuleStorage {
    pub const MAGIC_BYTES: [u8; 8] = *b"\0HYPREP\0";

    fn current_version() -> PrepResult<semver::Version> {
        semver::Version::parse(env!("CARGO_PKG_VERSION"))
            .map_err(|e| PrepError::Encoding(format!("Invalid crate version: {}", e)))
    }

    /// Serialize `module` into the storage format.
    pub fn encode(module: &Module) -> PrepResult<Vec<u8>> {
        let mut buf = Vec::new();
        serde_cbor::to_writer(&mut buf, module)
            .map_err(|e| PrepError::Encoding(format!("Failed to serialize module: {}", e)))?;

        let version = Self::current_version()?;
        let storage = ModuleStorage {
            magic: Self::MAGIC_BYTES,
            version_req: semver::VersionReq {
                comparators: vec![semver::Comparator {
                    op: semver::Op::Exact,
                    major: version.major,
                    minor: Some(version.minor),
                    patch: Some(version.patch),
                    pre: version.pre.clone(),
                }],
            },
            data: buf,
        };

        debug!(
            "Serializing module storage with version requirement {}",
            storage.version_req
        );
        let mut buf = Vec::new();
        serde_cbor::to_writer(&mut buf, &storage).map_err(|e| {
            PrepError::Encoding(format!("Failed to serialize module storage wrapper: {}", e))
        })?;
        Ok(buf)
    }

    /// Deserialize a module written by [`ModuleStorage::encode`].
    pub fn decode(data: &[u8]) -> PrepResult<Module> {
        debug!("Deserializing module storage ({} bytes)", data.len());

        let storage: ModuleStorage = serde_cbor::from_slice(data).map_err(|e| {
            PrepError::Encoding(format!("Failed to deserialize module storage wrapper: {}", e))
        })?;

        if storage.magic != Self::MAGIC_BYTES {
            return Err(PrepError::Encoding(
                "Invalid magic bytes in module storage".to_string(),
            ));
        }

        let version = Self::current_version()?;
        if !storage.version_req.matches(&version) {
            return Err(PrepError::Encoding(format!(
                "Incompatible module storage version: required {}, found {}",
                storage.version_req, version
            )));
        }

        serde_cbor::from_slice(storage.data.as_slice())
            .map_err(|e| PrepError::Encoding(format!("Failed to deserialize module: {}", e)))
    }

    /// Read and decode a module file.
    pub fn load(path: &Path) -> PrepResult<Module> {
        let data = std::fs::read(path)?;
        Self::decode(&data)
    }
}

fn write_artifact(handler: &dyn ReportHandler, name: &str, bytes: &[u8]) {
    let result = handler
        .open_output_file(name)
        .and_then(|mut out| out.write_all(bytes).and_then(|_| out.flush()));
    match result {
        Ok(()) => info!("Wrote {} ({} bytes)", name, bytes.len()),
        Err(e) => warn!("Could not write {}: {}", name, e),
    }
}

/// Write the textual and/or binary form of `module`. Failures are logged
/// and otherwise ignored.
pub fn write_artifacts(
    module: &Module,
    handler: &dyn ReportHandler,
    output_source: bool,
    output_module: bool,
) {
    if output_source {
        write_artifact(handler, ASSEMBLY_FILE_NAME, module.to_string().as_bytes());
    }
    if output_module {
        match ModuleStorage::encode(module) {
            Ok(bytes) => write_artifact(handler, MODULE_FILE_NAME, &bytes),
            Err(e) => warn!("Could not encode {}: {}", MODULE_FILE_NAME, e),
        }
    }
}

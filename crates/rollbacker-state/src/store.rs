//! GoodImageStore — JSON-file persistence for last-known-good images.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rollbacker_core::{ContainerIdentity, ImageReference};
use tracing::debug;

use crate::error::{StateError, StateResult};

/// Container name → image last observed healthy.
pub type GoodImageRecord = BTreeMap<ContainerIdentity, ImageReference>;

/// File-backed good-image store.
///
/// Holds no in-memory copy of the record; every call goes to disk. One
/// supervisor process per state file is assumed.
#[derive(Debug, Clone)]
pub struct GoodImageStore {
    path: PathBuf,
}

impl GoodImageStore {
    /// Point the store at a state file. The file need not exist.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full record. A missing or empty file yields an empty record.
    pub fn load(&self) -> StateResult<GoodImageRecord> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "no good-image record on disk");
                return Ok(GoodImageRecord::new());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(GoodImageRecord::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StateError::Deserialize {
            path: self.path.clone(),
            source,
        })
    }

    /// Last good image recorded for `identity`, if any.
    pub fn get(&self, identity: &ContainerIdentity) -> StateResult<Option<ImageReference>> {
        Ok(self.load()?.remove(identity))
    }

    /// Record `image` as the latest good image for `identity`.
    ///
    /// Read-modify-write against the whole file: entries for other
    /// identities are carried over untouched.
    pub fn save(&self, identity: &ContainerIdentity, image: &ImageReference) -> StateResult<()> {
        let mut record = self.load()?;
        record.insert(identity.clone(), image.clone());
        let encoded = serde_json::to_vec(&record)?;
        self.replace_file(&encoded)?;
        debug!(container = %identity, %image, path = ?self.path, "good image stored");
        Ok(())
    }

    /// Write `contents` to a sibling temp file, then rename it over the target.
    fn replace_file(&self, contents: &[u8]) -> StateResult<()> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| StateError::InvalidPath(self.path.clone()))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let write_err = |source| StateError::Write {
            path: tmp_path.clone(),
            source,
        };
        let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(contents).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

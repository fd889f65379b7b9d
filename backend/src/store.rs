use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use shared::{Ledger, Store, StoreError, VoteLedger};
use tempfile::NamedTempFile;
use tracing::info;

pub type VoteStore = Mutex<VoteLedger<JsonFileStore>>;

/// Keeps the whole ledger in a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates parent directories and an empty `{}` file on first run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if !store.path.exists() {
            store.save(&Ledger::new())?;
            info!("Created empty store at {}", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl Store for JsonFileStore {
    fn load(&self) -> Result<Ledger, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Ledger::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        ledger.serialize(&mut serializer)?;
        buf.push(b'\n');

        // The temp file is removed on drop unless it was persisted.
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

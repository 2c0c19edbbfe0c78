//! Read side of list snapshots
//!
//! A snapshot is an immutable set of raw list files. Providers hand the core each
//! file's content, or `None` when the file is absent from the snapshot.

use crate::error::{Result, ScreeningError};
use crate::sources::{Row, SourceFile, XmlNode};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SNAPSHOTS_DIR: &str = "snapshots";
const LATEST_POINTER: &str = "LATEST";
const AUDIT_LOG: &str = "audit.jsonl";

/// Raw content of one source file, in whichever shape the provider has it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawContent {
    Bytes(Vec<u8>),
    Rows(Vec<Row>),
    Document(XmlNode),
}

pub trait SnapshotProvider: Send + Sync {
    fn snapshot_id(&self) -> &str;

    /// `Ok(None)` means the file is absent, which is not an error.
    fn fetch(&self, file: SourceFile) -> Result<Option<Cow<'_, RawContent>>>;
}

/// In-memory snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotContents {
    snapshot_id: String,
    files: BTreeMap<SourceFile, RawContent>,
}

impl SnapshotContents {
    pub fn new(snapshot_id: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn with(mut self, file: SourceFile, content: RawContent) -> Self {
        self.insert(file, content);
        self
    }

    pub fn with_bytes(self, file: SourceFile, bytes: impl Into<Vec<u8>>) -> Self {
        self.with(file, RawContent::Bytes(bytes.into()))
    }

    pub fn insert(&mut self, file: SourceFile, content: RawContent) {
        self.files.insert(file, content);
    }

    pub fn files(&self) -> impl Iterator<Item = SourceFile> + '_ {
        self.files.keys().copied()
    }
}

impl SnapshotProvider for SnapshotContents {
    fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    fn fetch(&self, file: SourceFile) -> Result<Option<Cow<'_, RawContent>>> {
        Ok(self.files.get(&file).map(Cow::Borrowed))
    }
}

/// Snapshot stored as `<cache_dir>/snapshots/<snapshot_id>/<file name>`
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    snapshot_id: String,
    root: PathBuf,
}

impl DirectorySnapshot {
    pub fn open(cache_dir: impl AsRef<Path>, snapshot_id: &str) -> Result<Self> {
        let root = cache_dir.as_ref().join(SNAPSHOTS_DIR).join(snapshot_id);
        if !root.is_dir() {
            return Err(ScreeningError::SnapshotNotFound(root.display().to_string()));
        }

        Ok(Self {
            snapshot_id: snapshot_id.to_string(),
            root,
        })
    }

    /// Open the snapshot named by the `LATEST` pointer
    pub fn open_latest(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let snapshot_id = latest_snapshot_id(cache_dir.as_ref())?;
        Self::open(cache_dir, &snapshot_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// JSON-lines audit log kept beside the snapshot's files
    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join(AUDIT_LOG)
    }
}

impl SnapshotProvider for DirectorySnapshot {
    fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    fn fetch(&self, file: SourceFile) -> Result<Option<Cow<'_, RawContent>>> {
        match fs::read(self.root.join(file.file_name())) {
            Ok(bytes) => Ok(Some(Cow::Owned(RawContent::Bytes(bytes)))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Snapshot id recorded in `<cache_dir>/LATEST`
pub fn latest_snapshot_id(cache_dir: impl AsRef<Path>) -> Result<String> {
    let pointer = cache_dir.as_ref().join(LATEST_POINTER);
    match fs::read_to_string(&pointer) {
        Ok(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        Ok(_) => Err(ScreeningError::SnapshotNotFound(format!(
            "{} is empty",
            pointer.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ScreeningError::SnapshotNotFound(
            format!("no LATEST pointer in {}", cache_dir.as_ref().display()),
        )),
        Err(e) => Err(e.into()),
    }
}

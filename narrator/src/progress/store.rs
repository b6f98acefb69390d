//! Append-only progress log and manifest persistence.

use super::{Manifest, Result};
use crate::storage;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Indices of the chunks of one document that have been synthesized.
pub type ProgressSet = BTreeSet<usize>;

/// Progress records for all documents under one directory.
///
/// Each document owns `<id>.progress` (one chunk index per line, appended
/// and synced per chunk) and `<id>.json` (its [`Manifest`]).
#[derive(Debug, Clone)]
pub struct ProgressStore {
    root: PathBuf,
}

impl ProgressStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the progress files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn progress_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{}.progress", document_id))
    }

    fn manifest_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", document_id))
    }

    /// Load the completed chunk indices. Unknown documents yield an empty set.
    pub fn load(&self, document_id: &str) -> Result<ProgressSet> {
        let content = match fs::read_to_string(self.progress_path(document_id)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProgressSet::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(parse_progress(document_id, &content))
    }

    /// Record a chunk as complete. The entry is on disk when this returns.
    pub fn mark_complete(&self, document_id: &str, index: usize) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.progress_path(document_id);
        let is_new = !path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        drop_torn_tail(&mut file)?;

        file.write_all(format!("{}\n", index).as_bytes())?;
        file.sync_all()?;

        if is_new {
            storage::sync_dir(&self.root)?;
        }
        Ok(())
    }

    /// Remove one index, e.g. when its segment turned out to be unreadable.
    pub fn forget(&self, document_id: &str, index: usize) -> Result<()> {
        let mut progress = self.load(document_id)?;
        if !progress.remove(&index) {
            return Ok(());
        }

        let content: String = progress.iter().map(|i| format!("{}\n", i)).collect();
        storage::write_atomic(&self.progress_path(document_id), content.as_bytes())?;
        Ok(())
    }

    /// Delete the progress log and manifest of a document.
    pub fn clear(&self, document_id: &str) -> Result<()> {
        for path in [self.progress_path(document_id), self.manifest_path(document_id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Load the manifest written by an earlier run, if any.
    pub fn load_manifest(&self, document_id: &str) -> Result<Option<Manifest>> {
        let content = match fs::read_to_string(self.manifest_path(document_id)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Save the manifest, refreshing its `updated_at`.
    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut manifest = manifest.clone();
        manifest.updated_at = chrono::Utc::now();

        let json = serde_json::to_vec_pretty(&manifest)?;
        storage::write_atomic(&self.manifest_path(&manifest.document_id), &json)?;
        Ok(())
    }
}

fn parse_progress(document_id: &str, content: &str) -> ProgressSet {
    let mut progress = ProgressSet::new();
    let mut lines: Vec<&str> = content.split('\n').collect();

    // Everything after the last newline is an unfinished append.
    if let Some(tail) = lines.pop() {
        if !tail.is_empty() {
            log::warn!("{}: ignoring incomplete progress entry {:?}", document_id, tail);
        }
    }

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<usize>() {
            Ok(index) => {
                progress.insert(index);
            }
            Err(_) => log::warn!("{}: ignoring malformed progress entry {:?}", document_id, line),
        }
    }

    progress
}

/// Cut an unterminated last line left by an interrupted append.
fn drop_torn_tail(file: &mut File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut content = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;
    let keep = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    file.set_len(keep as u64)?;
    Ok(())
}

//! # ArchiveReader
//!
//! Safe, bounded reading of untrusted VSIX (ZIP) packages.
//!
//! Two invariants are enforced *before* a single byte of an entry is
//! decompressed:
//!
//! - **zip-slip**: an entry name that is absolute, contains a `..` segment,
//!   or normalizes outside the extraction root is rejected.
//! - **zip-bomb**: an entry's *declared* uncompressed size (from the ZIP
//!   central directory, never the compressed size) over the configured cap
//!   is rejected without inflating it.
//!
//! Both checks run once, at [`ArchiveReader::open`], against every entry in
//! the central directory — a hostile archive never gets past `open` in the
//! first place. Grounded in `original_source/core/triage/metadata_scanner.py`'s
//! `_validate_zip_paths`, reworked around the `zip` crate (the dependency the
//! only pack example that parses ZIPs, `PyRo1121-omg`, already carries).

use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};
use triage_core::TriageError;
use zip::ZipArchive;

/// Per-entry metadata surfaced by [`ArchiveReader::entries`].
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Errors raised by a `read` call on an already-opened, already-validated
/// archive. Distinct from the fatal [`TriageError`] variants `open` can
/// raise: these are ordinary "that entry doesn't exist / is too big for this
/// call" conditions a caller is expected to handle per-entry.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry {name:?} is {actual} bytes, exceeds requested cap of {cap}")]
    EntryTooLarge {
        name: String,
        actual: u64,
        cap: u64,
    },

    #[error("failed to decompress entry {0:?}: {1}")]
    Decompress(String, String),
}

/// A validated, open VSIX archive.
pub struct ArchiveReader {
    archive: ZipArchive<File>,
    entries: Vec<EntryInfo>,
}

impl ArchiveReader {
    /// Open and fully validate `path` against the zip-slip and zip-bomb
    /// invariants. `entry_cap_bytes` is the declared-uncompressed-size limit
    /// per entry (spec default 500 MiB, raised when the caller opts into
    /// `HEAVYWEIGHT` scanning).
    pub fn open(path: impl AsRef<Path>, entry_cap_bytes: u64) -> Result<Self, TriageError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TriageError::BadArchive(format!("{}: {e}", path.display())))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| TriageError::BadArchive(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| TriageError::BadArchive(e.to_string()))?;
            let name = entry.name().to_string();
            validate_entry_name(&name)?;

            let size = entry.size();
            if size > entry_cap_bytes {
                return Err(TriageError::ZipBomb {
                    entry: name,
                    declared_size: size,
                    limit: entry_cap_bytes,
                });
            }
            entries.push(EntryInfo {
                name,
                size,
                is_dir: entry.is_dir(),
            });
        }
        debug!(entry_count = entries.len(), "archive validated");
        Ok(Self { archive, entries })
    }

    /// All entries, in central-directory order. Already validated — safe to
    /// iterate and read without re-checking path safety.
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    /// Read the full contents of `name`, refusing to decompress more than
    /// `max_bytes`. `max_bytes` bounds the *decompressed* read itself, not
    /// just the declared size, so a mismatched/lying declared size can't
    /// smuggle a bigger payload through.
    pub fn read(&mut self, name: &str, max_bytes: u64) -> Result<Vec<u8>, ReadError> {
        let declared = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.size)
            .ok_or_else(|| ReadError::NotFound(name.to_string()))?;

        if declared > max_bytes {
            return Err(ReadError::EntryTooLarge {
                name: name.to_string(),
                actual: declared,
                cap: max_bytes,
            });
        }

        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| ReadError::Decompress(name.to_string(), e.to_string()))?;

        let cap = max_bytes.min(u64::from(u32::MAX)) as usize;
        let mut buf = Vec::with_capacity(declared.min(max_bytes) as usize);
        let mut limited = entry.by_ref().take(cap as u64);
        limited
            .read_to_end(&mut buf)
            .map_err(|e| ReadError::Decompress(name.to_string(), e.to_string()))?;

        if buf.len() as u64 > max_bytes {
            warn!(name, "decompressed size exceeded cap despite declared-size check");
            return Err(ReadError::EntryTooLarge {
                name: name.to_string(),
                actual: buf.len() as u64,
                cap: max_bytes,
            });
        }
        Ok(buf)
    }
}

/// Reject entries whose name escapes the archive root: absolute paths,
/// `..` segments, or (defensively) names that fail UTF-8 decoding.
fn validate_entry_name(name: &str) -> Result<(), TriageError> {
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(TriageError::ZipSlip(name.to_string()));
    }
    for segment in name.split(['/', '\\']) {
        if segment == ".." {
            return Err(TriageError::ZipSlip(name.to_string()));
        }
    }
    Ok(())
}

// src/archive/jar.rs

//! Reading and writing jar files
//!
//! Jars are plain zip files. Reading loads every file entry into memory;
//! directory entries are skipped and recreated on write. Writing is
//! deterministic: entries keep archive order, every entry carries the same
//! timestamp and permissions, and the file appears at its final path only
//! once it is complete.

use super::{Archive, ArchiveRole, Entry};
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Largest single entry accepted when reading an archive (512 MB)
pub const MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;

/// Environment variable for reproducible build timestamps
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

/// Modification time stamped on every written entry
///
/// Zip timestamps are local DOS times with two-second resolution covering
/// 1980 through 2107; values outside that range are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTimestamp(NaiveDateTime);

impl Default for EntryTimestamp {
    /// 1980-02-01 00:00:00, the fixed entry time of common jar tooling
    fn default() -> Self {
        Self(date(1980, 2, 1))
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl EntryTimestamp {
    /// Timestamp from seconds since the Unix epoch
    pub fn from_epoch_seconds(secs: i64) -> Result<Self> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| Error::config(format!("timestamp {} is out of range", secs)))?;
        Ok(Self::clamped(dt.naive_utc()))
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS`, an RFC 3339 string, or epoch seconds
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(secs) = s.parse::<i64>() {
            return Self::from_epoch_seconds(secs);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::clamped(dt.naive_utc()));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(Self::clamped)
            .map_err(|e| Error::config(format!("invalid timestamp '{}': {}", s, e)))
    }

    /// Read `SOURCE_DATE_EPOCH`, if set
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(SOURCE_DATE_EPOCH) {
            Ok(value) if !value.trim().is_empty() => {
                let secs = value.trim().parse::<i64>().map_err(|_| {
                    Error::config(format!("{} is not an integer: '{}'", SOURCE_DATE_EPOCH, value))
                })?;
                Self::from_epoch_seconds(secs).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Pick the build timestamp: `SOURCE_DATE_EPOCH`, then the configured
    /// value, then the default
    pub fn resolve(configured: Option<&str>) -> Result<Self> {
        if let Some(ts) = Self::from_env()? {
            debug!("Using {} timestamp {}", SOURCE_DATE_EPOCH, ts);
            return Ok(ts);
        }
        match configured {
            Some(s) => Self::parse(s),
            None => Ok(Self::default()),
        }
    }

    fn clamped(dt: NaiveDateTime) -> Self {
        let min = date(1980, 1, 1);
        let max = date(2107, 12, 31);
        Self(dt.clamp(min, max))
    }

    fn to_zip(self) -> zip::DateTime {
        let dt = self.0;
        zip::DateTime::from_date_and_time(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        )
        .unwrap_or_default()
    }
}

impl std::fmt::Display for EntryTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Read a jar from disk; the archive id is the file name
pub fn read_archive(path: &Path, role: ArchiveRole) -> Result<Archive> {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file = File::open(path).map_err(|e| Error::UnreadableArchive {
        path: path.to_path_buf(),
        source: ZipError::Io(e),
    })?;
    let archive = read_from(file, &id, role).map_err(|source| Error::UnreadableArchive {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Read {} entries from {}", archive.len(), path.display());
    Ok(archive)
}

/// Read a jar held in memory
pub fn read_archive_bytes(bytes: &[u8], id: &str, role: ArchiveRole) -> Result<Archive> {
    read_from(Cursor::new(bytes), id, role).map_err(|source| Error::UnreadableArchive {
        path: id.into(),
        source,
    })
}

fn read_from<R: Read + Seek>(
    reader: R,
    id: &str,
    role: ArchiveRole,
) -> std::result::Result<Archive, ZipError> {
    let mut zip = ZipArchive::new(reader)?;
    let mut archive = Archive::new(id, role);

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if name.starts_with('/') || name.split('/').any(|seg| seg == "..") {
            return Err(ZipError::InvalidArchive("entry path escapes the archive root"));
        }
        if file.size() > MAX_ENTRY_SIZE {
            return Err(ZipError::InvalidArchive("entry exceeds the size limit"));
        }

        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)?;

        // A repeated name in the central directory is a corrupt input
        archive
            .insert(Entry::new(name, content, id))
            .map_err(|_| ZipError::InvalidArchive("repeated entry name"))?;
    }

    Ok(archive)
}

/// Serialize an archive to jar bytes
///
/// Parent directory entries are emitted right before the first entry
/// below them.
pub fn archive_to_bytes(archive: &Archive, timestamp: EntryTimestamp) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mtime = timestamp.to_zip();
    let file_options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(mtime)
        .unix_permissions(FILE_MODE);
    let dir_options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(mtime)
        .unix_permissions(DIR_MODE);

    let mut dirs: HashSet<String> = HashSet::new();
    for entry in archive {
        for dir in parent_dirs(entry.path()) {
            if dirs.insert(dir.to_string()) {
                zip.add_directory(dir, dir_options).map_err(zip_io)?;
            }
        }
        zip.start_file(entry.path(), file_options).map_err(zip_io)?;
        zip.write_all(entry.content())?;
    }

    let cursor = zip.finish().map_err(zip_io)?;
    Ok(cursor.into_inner())
}

/// Write an archive atomically and return the written bytes
///
/// The jar is staged in a temporary file next to `dest` and renamed into
/// place, so a failed build never leaves a partial file behind.
pub fn write_archive(archive: &Archive, dest: &Path, timestamp: EntryTimestamp) -> Result<Vec<u8>> {
    let bytes = archive_to_bytes(archive, timestamp)?;

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| Error::Io(e.error))?;

    info!(
        "Wrote {} ({} entries, {} bytes)",
        dest.display(),
        archive.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// `a/b/c.txt` yields `a/`, `a/b/`
fn parent_dirs(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..=i])
}

fn zip_io(err: ZipError) -> Error {
    match err {
        ZipError::Io(e) => Error::Io(e),
        other => Error::Io(std::io::Error::other(other)),
    }
}

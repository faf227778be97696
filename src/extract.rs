//! Safe zip extraction into a per-archive folder.
//!
//! [`extract_into`] unpacks into a hidden staging directory next to the
//! target and renames it into place only after every member was written, so
//! an extraction folder is either absent, a previous complete result, or a
//! new complete result. Member names that would escape the destination
//! (absolute paths, `..` segments) reject the whole archive before anything
//! is written.
//!
//! Both functions block; async callers run them on
//! `tokio::task::spawn_blocking`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use zip::ZipArchive;
use zip::result::ZipError;

/// Suffix of the staging directory used while an archive is unpacked.
pub const STAGING_SUFFIX: &str = ".partial";

/// Errors raised while unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive file could not be opened.
    #[error("cannot open archive {path}: {source}")]
    Open {
        /// Archive path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The file is not a readable zip archive.
    #[error("corrupt or unsupported archive {path}: {source}")]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ZipError,
    },

    /// A member name points outside the extraction folder.
    #[error("archive {path} contains unsafe member path {member:?}")]
    UnsafePath {
        /// Archive path.
        path: PathBuf,
        /// Member name as stored in the archive.
        member: String,
    },

    /// Writing extracted data failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The blocking extraction task did not complete.
    #[error("extraction task failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
}

impl ExtractError {
    /// Creates an archive-format error.
    pub fn archive(path: impl Into<PathBuf>, source: ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an error for a blocking task that panicked or was cancelled.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}

/// Staging directory used while unpacking into `extract_dir`.
///
/// For `/data/Game` this is `/data/.Game.partial`.
#[must_use]
pub fn staging_dir_for(extract_dir: &Path) -> PathBuf {
    let name = extract_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging_name = format!(".{name}{STAGING_SUFFIX}");
    match extract_dir.parent() {
        Some(parent) => parent.join(staging_name),
        None => PathBuf::from(staging_name),
    }
}

/// Unpacks `archive` into `extract_dir`, replacing any previous contents.
///
/// Returns the number of regular files written. On failure the staging
/// directory is removed and `extract_dir` is left as it was.
///
/// # Errors
///
/// Returns [`ExtractError`] if the archive cannot be read, contains unsafe
/// member paths, or the filesystem rejects a write or the final rename.
#[instrument(skip_all, fields(archive = %archive.display(), extract_dir = %extract_dir.display()))]
pub fn extract_into(archive: &Path, extract_dir: &Path) -> Result<usize, ExtractError> {
    let staging = staging_dir_for(extract_dir);
    if staging.exists() {
        debug!(staging = %staging.display(), "removing leftover staging directory");
        fs::remove_dir_all(&staging).map_err(|e| ExtractError::io(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| ExtractError::io(&staging, e))?;

    let files = match extract_zip(archive, &staging) {
        Ok(files) => files,
        Err(error) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(staging = %staging.display(), error = %cleanup, "failed to remove staging directory");
            }
            return Err(error);
        }
    };

    replace_dir(&staging, extract_dir)?;
    debug!(files, "archive extracted");
    Ok(files)
}

/// Unpacks every member of `archive` under `destination`.
///
/// All member names are validated before the first write. Returns the
/// number of regular files written.
///
/// # Errors
///
/// Returns [`ExtractError::UnsafePath`] for members that would land outside
/// `destination`, [`ExtractError::Archive`] for corrupt archives, and
/// [`ExtractError::Io`] for write failures.
pub fn extract_zip(archive: &Path, destination: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive).map_err(|source| ExtractError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| ExtractError::archive(archive, e))?;

    let mut members = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let member = zip
            .by_index_raw(index)
            .map_err(|e| ExtractError::archive(archive, e))?;
        let Some(relative) = member.enclosed_name() else {
            return Err(ExtractError::UnsafePath {
                path: archive.to_path_buf(),
                member: member.name().to_string(),
            });
        };
        members.push(relative);
    }

    let mut files = 0;
    for (index, relative) in members.into_iter().enumerate() {
        let mut member = zip
            .by_index(index)
            .map_err(|e| ExtractError::archive(archive, e))?;
        let out_path = destination.join(&relative);

        if member.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| ExtractError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
        }
        let mut out_file = File::create(&out_path).map_err(|e| ExtractError::io(&out_path, e))?;
        io::copy(&mut member, &mut out_file).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => ExtractError::archive(archive, ZipError::Io(e)),
            _ => ExtractError::io(&out_path, e),
        })?;
        files += 1;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = member.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                    .map_err(|e| ExtractError::io(&out_path, e))?;
            }
        }
    }

    Ok(files)
}

fn replace_dir(staging: &Path, extract_dir: &Path) -> Result<(), ExtractError> {
    match fs::symlink_metadata(extract_dir) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(extract_dir).map_err(|e| ExtractError::io(extract_dir, e))?;
        }
        Ok(_) => {
            fs::remove_file(extract_dir).map_err(|e| ExtractError::io(extract_dir, e))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(ExtractError::io(extract_dir, e)),
    }
    fs::rename(staging, extract_dir).map_err(|e| ExtractError::io(extract_dir, e))
}

//! Local file and extraction-folder names for remote archives.
//!
//! The [`NameNormalizer`] turns each [`RemoteEntry`] into a [`LocalTarget`]:
//! a clean, collision-free file name under the destination root and the
//! folder its contents are unpacked into.
//!
//! # Collision policy
//!
//! Names are claimed in listing order. The first entry keeps its clean name;
//! later entries that clean to the same name (compared case-insensitively)
//! become `<stem>_2<suffix>`, `<stem>_3<suffix>`, and so on. File names and
//! extraction folder names share one namespace, along with the `.part` file
//! and `.<folder>.partial` staging directory each entry writes while it is
//! being processed. The policy never looks at the disk, so the same listing
//! always yields the same names and re-runs with skip-existing find the files
//! they wrote before.

mod sanitize;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::download::constants::PARTIAL_FILE_SUFFIX;
use crate::extract::STAGING_SUFFIX;
use crate::listing::{RemoteEntry, TargetSuffix};

use sanitize::{clean_file_name, is_single_normal_component, percent_decode_lossy};

/// Upper bound on `_N` suffixes tried before giving up on a name.
pub const MAX_DISAMBIGUATION_ATTEMPTS: usize = 1000;

/// Errors raised while deriving a local name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// Nothing usable is left after decoding and cleaning.
    #[error("invalid file name after cleaning {raw:?}: {reason}")]
    InvalidName {
        /// Name as it appeared in the URL.
        raw: String,
        /// Why the cleaned name was rejected.
        reason: &'static str,
    },

    /// Every disambiguated candidate was already claimed.
    #[error("could not find a unique name for {name} within {attempts} attempts")]
    Collision {
        /// The clean name that kept colliding.
        name: String,
        /// Number of candidates tried.
        attempts: usize,
    },
}

/// Where one archive lives locally and where it is unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    /// Sanitized, collision-free file name.
    pub clean_file_name: String,
    /// `dest_root/clean_file_name`.
    pub dest_path: PathBuf,
    /// `dest_root/<clean_file_name without suffix>`.
    pub extract_dir: PathBuf,
}

/// Derives local targets for a run; remembers every name it handed out.
#[derive(Debug)]
pub struct NameNormalizer {
    dest_root: PathBuf,
    suffix: TargetSuffix,
    claimed: HashSet<String>,
}

impl NameNormalizer {
    /// Creates a normalizer placing targets under `dest_root`.
    #[must_use]
    pub fn new(dest_root: impl Into<PathBuf>, suffix: TargetSuffix) -> Self {
        Self {
            dest_root: dest_root.into(),
            suffix,
            claimed: HashSet::new(),
        }
    }

    /// Destination root targets are placed under.
    #[must_use]
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Derives and claims the local target for `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvalidName`] when the cleaned name is empty,
    /// a dot segment, or only the suffix, and [`NormalizeError::Collision`]
    /// when no unique candidate exists within
    /// [`MAX_DISAMBIGUATION_ATTEMPTS`].
    #[instrument(level = "debug", skip(self, entry), fields(url = %entry.url))]
    pub fn normalize(&mut self, entry: &RemoteEntry) -> Result<LocalTarget, NormalizeError> {
        let raw = entry.raw_name.as_str();
        let cleaned = clean_file_name(&percent_decode_lossy(raw));

        if cleaned.is_empty() {
            return Err(invalid(raw, "name is empty"));
        }
        if !is_single_normal_component(&cleaned) {
            return Err(invalid(raw, "name is a dot segment"));
        }
        let Some(stem) = self.suffix.strip_from(&cleaned) else {
            return Err(invalid(raw, "name lost its archive suffix"));
        };
        let stem = stem.trim_end();
        if stem.is_empty() || !is_single_normal_component(stem) {
            return Err(invalid(raw, "name has no stem before the suffix"));
        }
        let extension = &cleaned[cleaned.len() - self.suffix.as_str().len()..];

        for attempt in 1..=MAX_DISAMBIGUATION_ATTEMPTS {
            let candidate_stem = if attempt == 1 {
                stem.to_string()
            } else {
                format!("{stem}_{attempt}")
            };
            let candidate_name = format!("{candidate_stem}{extension}");

            if self.try_claim(&candidate_name, &candidate_stem) {
                if attempt > 1 {
                    debug!(
                        original = %cleaned,
                        chosen = %candidate_name,
                        "disambiguated colliding name"
                    );
                }
                return Ok(LocalTarget {
                    dest_path: self.dest_root.join(&candidate_name),
                    extract_dir: self.dest_root.join(&candidate_stem),
                    clean_file_name: candidate_name,
                });
            }
        }

        Err(NormalizeError::Collision {
            name: cleaned,
            attempts: MAX_DISAMBIGUATION_ATTEMPTS,
        })
    }

    /// Claims a file name and its extraction folder together with the
    /// working names the download and extract steps create next to them.
    fn try_claim(&mut self, file_name: &str, dir_name: &str) -> bool {
        let keys = [
            file_name.to_lowercase(),
            dir_name.to_lowercase(),
            format!("{file_name}{PARTIAL_FILE_SUFFIX}").to_lowercase(),
            format!(".{dir_name}{STAGING_SUFFIX}").to_lowercase(),
        ];
        if keys.iter().any(|key| self.claimed.contains(key)) {
            return false;
        }
        self.claimed.extend(keys);
        true
    }
}

fn invalid(raw: &str, reason: &'static str) -> NormalizeError {
    NormalizeError::InvalidName {
        raw: raw.to_string(),
        reason,
    }
}

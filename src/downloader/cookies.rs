// Cookie file store - Netscape cookie files uploaded by the user
//
// Files live flat in one directory, one `.txt` per site/account. A job only
// borrows a cookie file by path; the store owns the files and their cleanup.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default age after which uploaded cookies are deleted
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieFile {
    /// File stem, used to reference the file from a download request
    pub name: String,
    pub path: PathBuf,
    pub modified: Option<String>,
}

fn is_cookie_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false)
}

/// Make an uploaded filename safe to store.
///
/// Path separators become `_` and `.txt` is appended unless already present.
pub fn sanitize_cookie_name(filename: &str) -> Result<String> {
    let safe = filename.trim().replace(['/', '\\'], "_");
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        return Err(Error::validation(format!("Invalid cookie file name: '{}'", filename)));
    }

    if safe.to_lowercase().ends_with(".txt") {
        Ok(safe)
    } else {
        Ok(format!("{}.txt", safe))
    }
}

/// Creation time, or modification time where the platform has none
fn file_age_reference(path: &Path) -> std::io::Result<SystemTime> {
    let meta = fs::metadata(path)?;
    meta.created().or_else(|_| meta.modified())
}

#[derive(Debug, Clone)]
pub struct CookieStore {
    dir: PathBuf,
}

impl CookieStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All stored cookie files, sorted by name. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<CookieFile>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable cookie entry");
                    continue;
                }
            };
            if !is_cookie_file(&path) {
                continue;
            }

            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| OffsetDateTime::from(t).format(&Rfc3339).ok());

            files.push(CookieFile { name, path, modified });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Resolve the name of a stored cookie file, with or without `.txt`.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::validation("Empty cookie reference"));
        }

        let stem = reference
            .strip_suffix(".txt")
            .or_else(|| reference.strip_suffix(".TXT"))
            .unwrap_or(reference);
        self.list()?
            .into_iter()
            .find(|c| c.name == stem)
            .map(|c| c.path)
            .ok_or_else(|| Error::not_found("Cookie file", reference))
    }

    /// Like [`resolve`](Self::resolve), but also accepts a path to any
    /// existing file. Only for local callers.
    pub fn resolve_path(&self, reference: &str) -> Result<PathBuf> {
        match self.resolve(reference) {
            Err(Error::NotFound { .. }) if Path::new(reference.trim()).is_file() => {
                Ok(PathBuf::from(reference.trim()))
            }
            other => other,
        }
    }

    /// Store uploaded bytes under a sanitized name, replacing any existing file
    pub fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let safe = sanitize_cookie_name(filename)?;
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(&safe);
        fs::write(&path, data)?;
        info!(path = %path.display(), bytes = data.len(), "Saved cookie file");
        Ok(path)
    }

    /// Remove cookie files older than `max_age`. Returns how many were removed.
    pub fn cleanup_older_than(&self, max_age: Duration) -> Result<usize> {
        self.cleanup_at(max_age, SystemTime::now())
    }

    /// Same as [`cleanup_older_than`](Self::cleanup_older_than) with an explicit clock
    pub fn cleanup_at(&self, max_age: Duration, now: SystemTime) -> Result<usize> {
        let mut removed = 0;
        for cookie in self.list()? {
            let created = match file_age_reference(&cookie.path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %cookie.path.display(), error = %e, "Cannot read cookie age");
                    continue;
                }
            };

            let age = now.duration_since(created).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&cookie.path) {
                Ok(()) => {
                    info!(name = %cookie.name, age_secs = age.as_secs(), "Removed old cookie");
                    removed += 1;
                }
                Err(e) => warn!(path = %cookie.path.display(), error = %e, "Failed to remove cookie"),
            }
        }

        debug!(removed, "Cookie cleanup finished");
        Ok(removed)
    }
}

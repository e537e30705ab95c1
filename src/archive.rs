//! Bundle archives.
//! Packages a materialized working tree into a zip file.

use chrono::{DateTime, TimeZone};
use log::debug;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::constants::{APIPROXY_DIR, SHAREDFLOW_DIR, TEMPLATE_SUFFIX, TIMESTAMP_FORMAT};
use crate::error::{Error, Result};

/// Kind of bundle a template tree produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    ApiProxy,
    SharedFlow,
}

impl AssetKind {
    /// A tree with a top-level `sharedflowbundle` directory is a shared flow,
    /// anything else an API proxy.
    pub fn detect(root: &Path) -> Self {
        if root.join(SHAREDFLOW_DIR).is_dir() {
            AssetKind::SharedFlow
        } else {
            AssetKind::ApiProxy
        }
    }

    /// Label used in archive names.
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::ApiProxy => APIPROXY_DIR,
            AssetKind::SharedFlow => SHAREDFLOW_DIR,
        }
    }

    /// Collection of the management API the bundle is imported into.
    pub fn collection(&self) -> &'static str {
        match self {
            AssetKind::ApiProxy => "apis",
            AssetKind::SharedFlow => "sharedflows",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Derives the logical template name from the source directory:
/// its base name without the `-template` suffix.
pub fn template_name(source: &Path) -> String {
    let base = source
        .components()
        .next_back()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => base,
    }
}

/// Builds `<assetType>-<templateName>-<timestamp>.zip`.
pub fn archive_name<Tz>(kind: AssetKind, template_name: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}-{}.zip", kind.label(), template_name, now.format(TIMESTAMP_FORMAT))
}

/// Lists every file under `root` as (absolute path, `/`-separated relative name),
/// sorted by relative name.
pub fn collect_entries(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).map_err(|e| {
            Error::IoError(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
        })?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((entry.path().to_path_buf(), name));
    }
    entries.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(entries)
}

/// Writes every file under `root` into a new zip archive at `archive_path`.
///
/// # Errors
/// * `Error::ArchiveWriteError` carrying `archive_path`; the file may be
///   partially written and is left for the caller to remove
pub fn write_archive(root: &Path, archive_path: &Path) -> Result<PathBuf> {
    let fail = |message: String| Error::ArchiveWriteError {
        path: archive_path.to_path_buf(),
        message,
    };

    let entries = collect_entries(root)?;
    let file = File::create(archive_path).map_err(|e| fail(e.to_string()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, name) in &entries {
        debug!("Adding {} to archive", name);
        let content = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
        zip.start_file(name.as_str(), options).map_err(|e| fail(e.to_string()))?;
        zip.write_all(&content).map_err(|e| fail(e.to_string()))?;
    }
    zip.finish().map_err(|e| fail(e.to_string()))?;

    Ok(archive_path.to_path_buf())
}

/// Zips a materialized tree into `out_dir`, naming the archive after the
/// asset kind, template name and `now`.
pub fn produce_archive<Tz>(
    root: &Path,
    kind: AssetKind,
    template_name: &str,
    out_dir: &Path,
    now: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let archive_path = out_dir.join(archive_name(kind, template_name, now));
    write_archive(root, &archive_path)
}

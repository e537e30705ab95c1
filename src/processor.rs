//! Working tree materialization.
//! Copies a template source tree into a destination directory, renders every
//! copied file in place and renames the proxy descriptor after the proxy.

use globset::GlobSet;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{
    config::Config,
    constants::APIPROXY_DIR,
    error::{Error, Result},
    ignore::is_skipped,
    renderer::TemplateRenderer,
};

/// Recursively copies `source` into `dest`, calling `on_file` with the
/// destination path of every copied file.
///
/// Directories are created if missing. Files matching `skip` are neither
/// copied nor passed to `on_file`. Once the tree is complete the proxy
/// descriptor is renamed after `proxy_name`, see [`rename_descriptor`].
///
/// # Errors
/// Any traversal, copy or callback failure aborts the walk. Files written
/// before the failure are left in place.
pub fn materialize<F>(
    source: &Path,
    dest: &Path,
    skip: &GlobSet,
    proxy_name: &str,
    mut on_file: F,
) -> Result<()>
where
    F: FnMut(&Path) -> Result<()>,
{
    debug!("Materializing {} into {}", source.display(), dest.display());
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(source).map_err(|e| {
            Error::IoError(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
        })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if is_skipped(skip, path) {
            debug!("Skipping {}", relative.display());
            continue;
        }

        debug!("Copying file: {}", relative.display());
        fs::copy(path, &target)?;
        on_file(&target)?;
    }

    rename_descriptor(dest, proxy_name)?;
    Ok(())
}

/// Renders the file at `path` against `config` and overwrites it with the result.
///
/// Files that are not valid UTF-8 are static assets and stay untouched.
pub fn render_in_place(
    engine: &dyn TemplateRenderer,
    config: &Config,
    path: &Path,
) -> Result<()> {
    let bytes = fs::read(path)?;
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(_) => {
            debug!("Not rendering binary file {}", path.display());
            return Ok(());
        }
    };
    let context = serde_json::Value::Object(config.clone());
    let rendered = engine.render(&content, &context, path)?;
    fs::write(path, rendered)?;
    Ok(())
}

/// Whether `path` is an XML file placed directly in an `apiproxy` directory.
pub fn is_descriptor_candidate(path: &Path) -> bool {
    let in_apiproxy = path
        .parent()
        .and_then(|parent| parent.file_name())
        .is_some_and(|name| name == APIPROXY_DIR);
    in_apiproxy && path.extension().is_some_and(|ext| ext == "xml")
}

/// Renames the proxy descriptor under `root` to `<proxy_name>.xml`.
///
/// # Returns
/// * `Ok(Some(path))` - Path of the descriptor after renaming
/// * `Ok(None)` - No descriptor was found; nothing is renamed
///
/// # Errors
/// * `Error::ProxyDescriptorConflict` if more than one file qualifies
pub fn rename_descriptor(root: &Path, proxy_name: &str) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_descriptor_candidate(entry.path()) {
            candidates.push(entry.into_path());
        }
    }

    let descriptor = match candidates.len() {
        0 => {
            // Shared flow bundles have no apiproxy directory.
            warn!("No proxy descriptor found under {}, not renaming", root.display());
            return Ok(None);
        }
        1 => candidates.remove(0),
        _ => {
            return Err(Error::ProxyDescriptorConflict {
                candidates: candidates.iter().map(|p| p.display().to_string()).collect(),
            })
        }
    };

    let renamed = descriptor.with_file_name(format!("{}.xml", proxy_name));
    if renamed != descriptor {
        debug!("Renaming {} to {}", descriptor.display(), renamed.display());
        fs::rename(&descriptor, &renamed)?;
    }
    Ok(Some(renamed))
}

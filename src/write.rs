//! Writing reconciled environments to disk
//!
//! Persists the override document of every environment in a [`Manifest`].
//!
//! ## Process
//!
//! 1.  **Render**: every overlay is rendered to YAML before anything is
//!     written, so a rendering failure leaves all files untouched.
//!
//! 2.  **Create Directories**: the environment directory is created if it
//!     does not exist yet.
//!
//! 3.  **Write Content**: the document goes to a temporary sibling file that
//!     is then renamed over the override, so readers never observe a half
//!     written document.
//!
//! Environments whose overlay did not change are skipped unless `force` is
//! set.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::reconcile::Manifest;

/// Write the override documents of `manifest`.
///
/// Returns the paths that were written, in manifest order.
pub fn execute(manifest: &Manifest, force: bool) -> Result<Vec<PathBuf>> {
    let rendered = manifest
        .environments()
        .iter()
        .filter(|env| force || env.changed)
        .map(|env| Ok((env.override_path.as_path(), env.overlay.render()?)))
        .collect::<Result<Vec<_>>>()?;

    let mut written = Vec::with_capacity(rendered.len());
    for (path, content) in rendered {
        write_atomically(path, &content)?;
        debug!("Wrote {}", path.display());
        written.push(path.to_path_buf());
    }
    Ok(written)
}

/// Write `content` to `path` through a temporary sibling file.
pub fn write_atomically(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, content).map_err(|e| Error::Filesystem {
        message: format!("Failed to write file '{}': {}", tmp_path.display(), e),
    })?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Filesystem {
            message: format!("Failed to replace file '{}': {}", path.display(), e),
        }
    })
}

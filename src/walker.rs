use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{error::Result, extract};

/// Whether a file is worth indexing: a supported extension, not hidden
/// and not an Office lock file (`~$report.docx`).
pub fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    !name.starts_with('.') && !name.starts_with("~$") && extract::is_supported(path)
}

/// Recursively walk a directory and discover indexable files.
///
/// Returns absolute paths under the canonical form of `root`, sorted.
/// Hidden files and directories are skipped. A subdirectory that cannot
/// be read is logged and skipped; only an unreadable `root` is an error.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort();
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();

        // Skip hidden files and directories.
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if let Err(e) = walk_dir(root, &path, results) {
                warn!(dir = %path.display(), "skipping unreadable directory: {e}");
            }
        } else if file_type.is_symlink() {
            let resolved = match path.canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            // Directory links back into the root would loop.
            if resolved.starts_with(root) && resolved.is_dir() {
                continue;
            }
            if resolved.is_file() && is_candidate(&path) {
                results.push(path);
            }
        } else if file_type.is_file() && is_candidate(&path) {
            results.push(path);
        }
    }

    Ok(())
}

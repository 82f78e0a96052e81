//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

/// Lowercased, `/`-separated form of `path` relative to its scan `root`.
///
/// Safe-to-clean patterns are evaluated against this key so that the location
/// of the scan root itself (a user name, a temp directory) never marks a file
/// as disposable. Paths outside `root` fall back to their full normalized form.
pub fn match_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).map_or_else(|_| full_match_key(path), normalize_key)
}

/// Lowercased, `/`-separated form of the whole of `path`.
///
/// Protected and development-tool patterns see this key, so a protected name
/// anywhere above a file (including in the scan root) still protects it.
pub fn full_match_key(path: &Path) -> String {
    normalize_key(path)
}

fn normalize_key(path: &Path) -> String {
    let key = path.to_string_lossy().replace('\\', "/").to_lowercase();
    key.trim_start_matches('/').to_string()
}

/// Lowercased extension of `path` without the leading dot, if any.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

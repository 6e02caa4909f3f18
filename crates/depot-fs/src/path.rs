use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Lexically normalize a path: resolve `..` against preceding components,
/// drop `.`, keep root/prefix components. Never touches the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }

    result
}

/// Resolve a relative path under a root and reject any result that escapes it.
///
/// Both the root and the joined result are normalized before the containment
/// check, so `..` segments and absolute entry names cannot break out.
pub fn resolve_under_root(root: impl AsRef<Path>, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let root = normalize_path(root.as_ref());
    let resolved = normalize_path(&root.join(relative.as_ref()));

    if !resolved.starts_with(&root) {
        return Err(Error::Traversal {
            root,
            path: relative.as_ref().to_path_buf(),
        });
    }

    Ok(resolved)
}

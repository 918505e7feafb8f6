//! Executable probing on the search path

use std::env;
use std::path::{Path, PathBuf};

/// Platform suffix for executables (`""` on POSIX, `".exe"` on Windows)
pub const EXE_SUFFIX: &str = env::consts::EXE_SUFFIX;

/// Locate `name` the way a shell would.
///
/// A name containing a path separator is checked as given; otherwise each
/// `PATH` entry is tried in order. Returns the first regular file the
/// current user may execute.
pub fn which(name: impl AsRef<Path>) -> Option<PathBuf> {
    let name = name.as_ref();
    if name.components().count() > 1 {
        return is_executable(name).then(|| name.to_path_buf());
    }

    let search_path = env::var_os("PATH")?;
    env::split_paths(&search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Whether `path` is a regular file with an execute permission bit set
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Whether `path` is a regular file
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

//! Binary discovery.
//!
//! CLI tools are often installed by version managers into directories that
//! a GUI-launched process doesn't have on its `PATH`, so the well-known
//! install locations are searched before falling back to `PATH`.

use std::path::{Path, PathBuf};
use tracing::trace;

/// Install directories relative to the home directory, in search order.
const HOME_RELATIVE_DIRS: &[&str] = &[
    ".local/bin",
    ".claude/local",
    ".npm-global/bin",
    ".bun/bin",
    ".volta/bin",
];

/// System install directories, in search order.
const SYSTEM_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// Returns the directories searched before `PATH`.
pub fn well_known_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::new();
    if let Some(home) = dirs::home_dir() {
        dirs_out.extend(HOME_RELATIVE_DIRS.iter().map(|rel| home.join(rel)));
    }
    dirs_out.extend(SYSTEM_DIRS.iter().map(PathBuf::from));
    dirs_out
}

/// Resolves a binary name to an executable path.
///
/// Paths containing a separator are checked directly. Never spawns anything.
pub fn locate(binary: &str) -> Option<PathBuf> {
    locate_in(binary, &well_known_dirs())
}

/// Like [`locate`] but with an explicit list of directories searched before
/// `PATH`.
pub fn locate_in(binary: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    if binary.is_empty() {
        return None;
    }

    let direct = Path::new(binary);
    if direct.components().count() > 1 || direct.is_absolute() {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    if let Some(found) = search_dirs
        .iter()
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
    {
        trace!(path = %found.display(), "Found binary in well-known directory");
        return Some(found);
    }

    which::which(binary).ok()
}

/// Returns true if the binary can be located.
pub fn exists(binary: &str) -> bool {
    locate(binary).is_some()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_on_path() {
        assert!(locate("sh").is_some());
        assert!(exists("sh"));
    }

    #[test]
    fn test_locate_nonexistent() {
        assert!(locate("definitely_not_a_real_command_xyz123").is_none());
        assert!(locate("").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_prefers_search_dirs() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("quotabar-fake-cli");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = locate_in("quotabar-fake-cli", &[dir.path().to_path_buf()]);
        assert_eq!(found, Some(bin));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_skips_non_executable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "hi").unwrap();

        assert!(locate_in("notes.txt", &[dir.path().to_path_buf()]).is_none());
        assert!(locate(file.to_str().unwrap()).is_none());
    }

    #[test]
    fn test_absolute_path_checked_directly() {
        let sh = which::which("sh").unwrap();
        assert_eq!(locate(sh.to_str().unwrap()), Some(sh));
    }
}

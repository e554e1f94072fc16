//! Path helpers: tilde expansion, relative resolution, upward search.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use url::Url;

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

/// Resolve a path-valued setting against `base`.
///
/// Empty stays empty, `~` is expanded, absolute paths are kept and anything
/// else is joined onto `base` (or returned as-is without one).
pub fn resolve_path_setting(value: &str, base: Option<&Path>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let expanded = expand_tilde(trimmed);
    let resolved = match base {
        Some(base) if expanded.is_relative() => base.join(expanded).clean(),
        _ => expanded,
    };
    resolved.to_string_lossy().into_owned()
}

/// Locate an executable, either by absolute path or on `PATH`.
pub fn resolve_executable(command: &str) -> Option<PathBuf> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return None;
    }
    which::which(expand_tilde(trimmed)).ok()
}

/// Walk up from `start` looking for an entry called `name`.
///
/// The search stops after the first directory that contains `.git`, so it
/// never leaves the repository it started in.
pub fn find_upward(start: &Path, name: &str, want_dir: bool) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        let matches = if want_dir {
            candidate.is_dir()
        } else {
            candidate.is_file()
        };
        if matches {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        current = dir.parent();
    }
    None
}

pub const PROJECT_CONFIG_FILE: &str = ".comphy-basilisk";

/// Nearest `.comphy-basilisk` file at or above `start`.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    find_upward(start, PROJECT_CONFIG_FILE, false)
}

/// Nearest `src-local` directory at or above `start`.
pub fn find_src_local_dir(start: &Path) -> Option<PathBuf> {
    find_upward(start, "src-local", true)
}

/// Filesystem path of a `file://` URI.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok()?.to_file_path().ok()
}

/// `file://` URI for an absolute path.
pub fn path_to_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolve_path_setting_handles_empty_absolute_and_relative() {
        let base = Path::new("/work/proj");
        assert_eq!(resolve_path_setting("", Some(base)), "");
        assert_eq!(resolve_path_setting("  ", Some(base)), "");
        assert_eq!(resolve_path_setting("/opt/basilisk", Some(base)), "/opt/basilisk");
        assert_eq!(resolve_path_setting("build", Some(base)), "/work/proj/build");
        assert_eq!(resolve_path_setting("../shared/inc", Some(base)), "/work/shared/inc");
        assert_eq!(resolve_path_setting("build", None), "build");
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~"), home);
            assert_eq!(expand_tilde("~/basilisk"), home.join("basilisk"));
            assert_eq!(
                resolve_path_setting("~/basilisk", Some(Path::new("/elsewhere"))),
                home.join("basilisk").to_string_lossy()
            );
        }
        assert_eq!(expand_tilde("a~b"), PathBuf::from("a~b"));
    }

    #[test]
    fn find_upward_locates_nearest_file() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join("a").join(PROJECT_CONFIG_FILE), "{}").unwrap();

        assert_eq!(
            find_project_config(&nested),
            Some(temp.path().join("a").join(PROJECT_CONFIG_FILE))
        );
    }

    #[test]
    fn find_upward_stops_at_repository_root() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        let nested = repo.join("src");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(temp.path().join(PROJECT_CONFIG_FILE), "{}").unwrap();

        assert_eq!(find_project_config(&nested), None);
    }

    #[test]
    fn find_src_local_requires_directory() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("case");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(temp.path().join("src-local")).unwrap();

        assert_eq!(find_src_local_dir(&nested), Some(temp.path().join("src-local")));
    }

    #[test]
    fn uri_round_trip_for_absolute_paths() {
        let path = Path::new("/tmp/sim dir/drop.c");
        let uri = path_to_uri(path).unwrap();
        assert_eq!(uri, "file:///tmp/sim%20dir/drop.c");
        assert_eq!(uri_to_path(&uri).unwrap(), path);
        assert_eq!(uri_to_path("untitled:Untitled-1"), None);
    }

    #[test]
    fn resolve_executable_rejects_missing_binary() {
        assert_eq!(resolve_executable(""), None);
        assert_eq!(resolve_executable("/nonexistent/dir/qcc"), None);
        assert_eq!(resolve_executable("qcc-lsp-definitely-not-installed"), None);
    }
}

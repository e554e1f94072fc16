//! Settings types and the layers they are assembled from.

pub mod merge;
pub mod paths;
pub mod project;
pub mod settings;
pub mod toolchain;
pub mod user;

pub use merge::{merge_flags, merge_settings, merge_string_arrays};
pub use paths::{
    PROJECT_CONFIG_FILE, expand_tilde, find_project_config, find_src_local_dir, path_to_uri,
    resolve_executable, resolve_path_setting, uri_to_path,
};
pub use project::load_project_config;
pub use settings::{
    BasiliskSettings, ClangdMode, ClangdSettings, DEFAULT_MAX_PROBLEMS, DiagnosticsMode,
    QccSettings,
};
pub use toolchain::{basilisk_include_flags, qcc_candidates, resolve_basilisk_root, resolve_qcc_path};
pub use user::{load_user_config, user_config_path};

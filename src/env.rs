//! Environment constants and path utilities for the member client.
//!
//! This module centralizes the hardcoded paths, file names and storage keys
//! used throughout the application, making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".memberlink";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name when placed directly in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "memberlink.toml";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "MEMBERLINK_API_URL";

/// Default tracing filter used by the binary
pub const DEFAULT_LOG_FILTER: &str = "memberlink=info";

/// Durable store file and key names
pub mod store {
    /// File backing the durable key-value store
    pub const STORE_FILE_NAME: &str = "store.json";

    /// Key holding the persisted session marker
    pub const SESSION_MARKER_KEY: &str = "memberId";

    /// Key holding the cached device push token
    pub const PUSH_TOKEN_KEY: &str = "pushToken";

    /// Key holding the backend session cookie on hosts without a cookie store
    pub const SESSION_COOKIE_KEY: &str = "sessionCookie";
}

/// Remote API defaults
pub mod api {
    /// Default backend base URL
    pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

    /// Default request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Default user agent sent with every request
    pub const DEFAULT_USER_AGENT: &str = concat!("memberlink/", env!("CARGO_PKG_VERSION"));
}

/// Build the application directory path from a root directory
pub fn app_dir_path(root: &Path) -> PathBuf {
    root.join(APP_DIR_NAME)
}

/// Build the durable store file path inside a data directory
pub fn store_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(store::STORE_FILE_NAME)
}

/// Build the default data directory in the user's home directory
pub fn user_data_dir_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_construction() {
        let home = Path::new("/home/member");

        assert_eq!(app_dir_path(home), Path::new("/home/member/.memberlink"));
        assert_eq!(
            store_file_path(&user_data_dir_path(home)),
            Path::new("/home/member/.memberlink/store.json")
        );
    }

    #[test]
    fn test_config_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_config_file_path(home_dir),
            Path::new("/home/user/.memberlink/config.toml")
        );

        assert_eq!(
            local_config_file_path(current_dir),
            Path::new("/current/project/.memberlink/config.toml")
        );
    }
}

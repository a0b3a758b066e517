use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

/// Variables the config loader reads that a test may set.
pub const CONFIG_VARS: &[&str] = &[
    "PORT",
    "AUTH_FOLDER",
    "DOCRELAY_PORT",
    "DOCRELAY_AUTH_FOLDER",
    "DOCRELAY_DELIVERY__COUNTRY_CODE",
    "DOCRELAY_DELIVERY__MAX_FILES",
    "DOCRELAY_SESSION__RECONNECT_DELAY_MS",
    "DOCRELAY_BRIDGE__URL",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn capture() -> Self {
        let saved = CONFIG_VARS
            .iter()
            .map(|name| (*name, std::env::var_os(name)))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (name, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

fn write_config(temp_dir: &TempDir, contents: &str) -> PathBuf {
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

/// Runs `f` with a clean config environment and `config_toml` on disk.
pub fn with_config_env<T>(config_toml: &str, f: impl FnOnce(&Path) -> T) -> T {
    let _guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().expect("temp dir");
    let path = write_config(&temp_dir, config_toml);

    let restore = EnvRestore::capture();
    for name in CONFIG_VARS {
        std::env::remove_var(name);
    }

    let result = f(&path);
    drop(restore);
    result
}

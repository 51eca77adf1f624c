pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod state;
pub mod storage;
pub mod store;
pub mod theme;
pub mod validation;

use std::sync::Arc;

pub use bus::{NotificationBus, Subscription};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use render::{NoopRenderer, ThemeRenderer};
pub use storage::{PersistenceAdapter, UserId};
pub use store::ThemeStore;
pub use theme::{ResolvedTheme, ThemeColors, ThemeMode, ThemeSettings, ThemeState};
pub use validation::{DefaultsResolver, ValidationErrors};

use storage::{DirectoryRemoteStore, FileLocalCache};

/// Build an uninitialized store from `config`.
///
/// The caller sets the user session on [`ThemeStore::persistence_mut`] and
/// then calls [`ThemeStore::initialize`].
pub fn open_store(
    config: &AppConfig,
    renderer: impl ThemeRenderer + 'static,
) -> AppResult<ThemeStore> {
    let mut persistence = match config.resolved_cache_path() {
        Ok(path) => {
            tracing::debug!(?path, "using local theme cache");
            PersistenceAdapter::new(FileLocalCache::new(path))
        }
        Err(err) => {
            tracing::warn!(%err, "no cache directory; theme will not survive restarts");
            PersistenceAdapter::ephemeral()
        }
    };

    if let Some(dir) = &config.remote_store_dir {
        match DirectoryRemoteStore::open(dir) {
            Ok(remote) => persistence.attach_remote(Arc::new(remote)),
            Err(err) => tracing::warn!(?err, ?dir, "remote theme store unavailable; local only"),
        }
    }

    let mut defaults = DefaultsResolver::new();
    if let Some(path) = &config.global_default_path {
        if !defaults.load_global_default(path)? {
            tracing::info!(?path, "no global default theme installed");
        }
    }

    Ok(ThemeStore::new(persistence, renderer).with_defaults(defaults))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn fixture_root() -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let pid = std::process::id();
        path.push(format!("palette-keeper-boot-{pid}-{nanos}"));
        path
    }

    fn with_temp_root<F: FnOnce(&Path)>(f: F) {
        let root = fixture_root();
        fs::create_dir_all(&root).unwrap();
        f(&root);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn open_store_wires_cache_remote_and_global_default() {
        with_temp_root(|root| {
            let default_path = root.join("default.json");
            fs::write(&default_path, r#"{ "mode": "dark", "backgroundOpacity": 0.25 }"#).unwrap();
            let config = AppConfig {
                local_cache_path: Some(root.join("cache").join("theme.json")),
                remote_store_dir: Some(root.join("profiles")),
                global_default_path: Some(default_path),
                log_filter: None,
            };

            let mut store = open_store(&config, NoopRenderer).expect("store should open");
            store
                .persistence_mut()
                .set_user(Some(UserId::new("ada").unwrap()));
            assert!(store.persistence().is_remote_available());

            store.initialize(None);
            assert_eq!(store.get_state().committed().mode, ThemeMode::Dark);
            assert_eq!(store.get_state().committed().background_opacity, 0.25);

            store.set_mode(ThemeMode::Light);
            store.persistence().wait_for_remote_writes();
            assert!(root.join("cache").join("theme.json").is_file());
            assert!(root.join("profiles").join("ada.json").is_file());
        });
    }

    #[test]
    fn open_store_rejects_invalid_global_default_file() {
        with_temp_root(|root| {
            let default_path = root.join("default.json");
            fs::write(&default_path, r#"{ "mode": "sepia" }"#).unwrap();
            let config = AppConfig {
                local_cache_path: Some(root.join("theme.json")),
                global_default_path: Some(default_path),
                ..AppConfig::default()
            };

            let err = open_store(&config, NoopRenderer).unwrap_err();
            assert!(matches!(err, AppError::Defaults(_)));
        });
    }

    #[test]
    fn open_store_tolerates_missing_global_default_file() {
        with_temp_root(|root| {
            let config = AppConfig {
                local_cache_path: Some(root.join("theme.json")),
                global_default_path: Some(root.join("absent.json")),
                ..AppConfig::default()
            };

            let mut store = open_store(&config, NoopRenderer).expect("store should open");
            store.initialize(None);
            assert_eq!(store.get_state().committed(), &theme::builtin_settings());
        });
    }
}

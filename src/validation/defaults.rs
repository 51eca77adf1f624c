use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use super::{validate_settings, ValidationErrors};
use crate::theme::{
    builtin_settings, builtin_theme_colors, ThemeColors, ThemeMode, ThemeSettings,
    DEFAULT_BACKGROUND_OPACITY,
};

#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error("failed to read global default theme: {path}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse global default theme")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

/// Two-tier source of default palettes: an operator-chosen global default when
/// one has been installed, the built-in palette otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultsResolver {
    global_default: Option<ThemeSettings>,
}

impl DefaultsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global_default(settings: ThemeSettings) -> Self {
        Self {
            global_default: Some(settings),
        }
    }

    pub fn global_default(&self) -> Option<&ThemeSettings> {
        self.global_default.as_ref()
    }

    /// Validate and install an administrator document. On rejection the
    /// previously installed default stays in effect.
    pub fn set_global_default(&mut self, candidate: &Value) -> Result<(), ValidationErrors> {
        // Gaps in the admin document are filled from the built-in tier only.
        let settings = validate_settings(candidate, &DefaultsResolver::new())?;
        tracing::info!(mode = ?settings.mode, "installed global default theme");
        self.global_default = Some(settings);
        Ok(())
    }

    pub fn clear_global_default(&mut self) {
        self.global_default = None;
    }

    /// Missing file is not an error: it means no operator default is configured.
    pub fn load_global_default(&mut self, path: &Path) -> Result<bool, DefaultsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no global default theme file");
            return Ok(false);
        }

        let serialized = fs::read_to_string(path).map_err(|source| DefaultsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let candidate: Value = serde_json::from_str(&serialized)?;
        self.set_global_default(&candidate)?;
        Ok(true)
    }

    pub fn default_theme_colors(&self, mode: ThemeMode) -> ThemeColors {
        match &self.global_default {
            Some(settings) => settings.palette(mode).clone(),
            None => builtin_theme_colors(mode),
        }
    }

    pub fn default_background_opacity(&self) -> f64 {
        self.global_default
            .as_ref()
            .map_or(DEFAULT_BACKGROUND_OPACITY, |settings| {
                settings.background_opacity
            })
    }

    pub fn default_settings(&self) -> ThemeSettings {
        self.global_default.clone().unwrap_or_else(builtin_settings)
    }

    pub fn validate(&self, candidate: &Value) -> Result<ThemeSettings, ValidationErrors> {
        validate_settings(candidate, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture_root() -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let pid = std::process::id();
        path.push(format!("palette-keeper-defaults-{pid}-{nanos}"));
        path
    }

    fn with_temp_root<F: FnOnce(&Path)>(f: F) {
        let root = fixture_root();
        fs::create_dir_all(&root).unwrap();
        f(&root);
        let _ = fs::remove_dir_all(&root);
    }

    fn branded_default() -> Value {
        let mut light = serde_json::to_value(builtin_theme_colors(ThemeMode::Light)).unwrap();
        light["primaryColor"] = json!("#E11D48");
        json!({ "mode": "dark", "lightTheme": light, "backgroundOpacity": 0.3 })
    }

    #[test]
    fn builtin_palette_is_used_without_global_default() {
        let resolver = DefaultsResolver::new();
        assert_eq!(
            resolver.default_theme_colors(ThemeMode::Light),
            builtin_theme_colors(ThemeMode::Light)
        );
        assert_eq!(resolver.default_settings(), builtin_settings());
    }

    #[test]
    fn global_default_takes_precedence_over_builtin() {
        let mut resolver = DefaultsResolver::new();
        resolver.set_global_default(&branded_default()).unwrap();

        assert_eq!(
            resolver.default_theme_colors(ThemeMode::Light).primary_color,
            "#E11D48"
        );
        assert_eq!(
            resolver.default_theme_colors(ThemeMode::Dark),
            builtin_theme_colors(ThemeMode::Dark)
        );
        assert_eq!(resolver.default_background_opacity(), 0.3);
        assert_eq!(resolver.default_settings().mode, ThemeMode::Dark);
    }

    #[test]
    fn validation_fills_absent_palettes_from_global_default() {
        let resolver = {
            let mut resolver = DefaultsResolver::new();
            resolver.set_global_default(&branded_default()).unwrap();
            resolver
        };
        let settings = resolver.validate(&json!({ "mode": "light" })).unwrap();
        assert_eq!(settings.light_theme.primary_color, "#E11D48");
        assert_eq!(settings.background_opacity, 0.3);
    }

    #[test]
    fn invalid_global_default_keeps_previous_tier() {
        let mut resolver = DefaultsResolver::new();
        resolver.set_global_default(&branded_default()).unwrap();

        let err = resolver
            .set_global_default(&json!({ "mode": "neon" }))
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(
            resolver.default_theme_colors(ThemeMode::Light).primary_color,
            "#E11D48"
        );

        resolver.clear_global_default();
        assert!(resolver.global_default().is_none());
    }

    #[test]
    fn load_global_default_reads_json_file() {
        with_temp_root(|root| {
            let path = root.join("global-theme.json");
            let mut resolver = DefaultsResolver::new();
            assert!(!resolver.load_global_default(&path).unwrap());

            fs::write(&path, branded_default().to_string()).unwrap();
            assert!(resolver.load_global_default(&path).unwrap());
            assert_eq!(resolver.default_settings().mode, ThemeMode::Dark);

            fs::write(&path, "{ invalid ").unwrap();
            let err = resolver.load_global_default(&path).unwrap_err();
            assert!(matches!(err, DefaultsError::Parse(_)));
        });
    }
}

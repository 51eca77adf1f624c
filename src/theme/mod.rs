mod palette;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

pub use palette::{builtin_settings, builtin_theme_colors, DEFAULT_BACKGROUND_OPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

impl std::fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background/text pair for one markup element; either side may be left to the palette.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementColors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// Optional per-element overrides rendered inside chat messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<ElementColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<ElementColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<ElementColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_header: Option<ElementColors>,
}

impl MarkupOverrides {
    pub fn is_empty(&self) -> bool {
        self.code_block.is_none()
            && self.link.is_none()
            && self.quote.is_none()
            && self.table_header.is_none()
    }
}

/// Complete palette for one display mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    pub background_color: String,
    pub primary_color: String,
    pub text_color: String,
    pub secondary_color: String,
    pub user_bubble_color: String,
    pub user_bubble_opacity: f64,
    pub ai_bubble_color: String,
    pub ai_bubble_opacity: f64,
    pub user_text_color: String,
    pub ai_text_color: String,
    #[serde(default, skip_serializing_if = "MarkupOverrides::is_empty")]
    pub markup: MarkupOverrides,
}

impl ThemeColors {
    pub(crate) fn with_clamped_opacities(mut self) -> Self {
        self.user_bubble_opacity = clamp_opacity(self.user_bubble_opacity);
        self.ai_bubble_opacity = clamp_opacity(self.ai_bubble_opacity);
        self
    }
}

/// The committed, persistable part of the theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    pub mode: ThemeMode,
    pub light_theme: ThemeColors,
    pub dark_theme: ThemeColors,
    pub background_image: Option<String>,
    pub background_opacity: f64,
}

impl ThemeSettings {
    pub fn palette(&self, mode: ThemeMode) -> &ThemeColors {
        match mode {
            ThemeMode::Light => &self.light_theme,
            ThemeMode::Dark => &self.dark_theme,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Plain strings, floats and enums only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Default for ThemeSettings {
    fn default() -> Self {
        builtin_settings()
    }
}

/// Shadow values held while a preview transaction is open.
///
/// `background_image` is doubly optional: `Some(None)` previews "no image",
/// `None` leaves the committed image in effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOverlay {
    pub mode: Option<ThemeMode>,
    pub light_theme: Option<ThemeColors>,
    pub dark_theme: Option<ThemeColors>,
    pub background_image: Option<Option<String>>,
    pub background_opacity: Option<f64>,
}

impl PreviewOverlay {
    /// True when at least one set field would change `committed`.
    pub fn differs_from(&self, committed: &ThemeSettings) -> bool {
        self.mode.is_some_and(|mode| mode != committed.mode)
            || self
                .light_theme
                .as_ref()
                .is_some_and(|colors| *colors != committed.light_theme)
            || self
                .dark_theme
                .as_ref()
                .is_some_and(|colors| *colors != committed.dark_theme)
            || self
                .background_image
                .as_ref()
                .is_some_and(|image| *image != committed.background_image)
            || self
                .background_opacity
                .is_some_and(|opacity| opacity != committed.background_opacity)
    }

    pub(crate) fn merge_into(self, committed: &mut ThemeSettings) {
        if let Some(mode) = self.mode {
            committed.mode = mode;
        }
        if let Some(colors) = self.light_theme {
            committed.light_theme = colors;
        }
        if let Some(colors) = self.dark_theme {
            committed.dark_theme = colors;
        }
        if let Some(image) = self.background_image {
            committed.background_image = image;
        }
        if let Some(opacity) = self.background_opacity {
            committed.background_opacity = opacity;
        }
    }
}

/// What a renderer should paint right now: preview values where set, committed otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTheme {
    pub mode: ThemeMode,
    pub colors: ThemeColors,
    pub background_image: Option<String>,
    pub background_opacity: f64,
}

/// Full controller state as seen by subscribers and renderers.
///
/// Instances handed out by the store are copies; only the store mutates its own.
/// Serializes flat: committed fields, flags, then `preview*` fields while a
/// preview is open.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeState {
    pub(crate) committed: ThemeSettings,
    pub(crate) is_ready: bool,
    pub(crate) has_unsaved_changes: bool,
    pub(crate) preview: Option<PreviewOverlay>,
}

impl ThemeState {
    pub(crate) fn with_settings(committed: ThemeSettings) -> Self {
        Self {
            committed,
            is_ready: false,
            has_unsaved_changes: false,
            preview: None,
        }
    }

    pub fn committed(&self) -> &ThemeSettings {
        &self.committed
    }

    pub fn preview(&self) -> Option<&PreviewOverlay> {
        self.preview.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn is_in_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    pub fn effective_mode(&self) -> ThemeMode {
        self.preview
            .as_ref()
            .and_then(|preview| preview.mode)
            .unwrap_or(self.committed.mode)
    }

    pub fn effective_palette(&self, mode: ThemeMode) -> &ThemeColors {
        let previewed = self.preview.as_ref().and_then(|preview| match mode {
            ThemeMode::Light => preview.light_theme.as_ref(),
            ThemeMode::Dark => preview.dark_theme.as_ref(),
        });
        previewed.unwrap_or_else(|| self.committed.palette(mode))
    }

    pub fn effective_background_image(&self) -> Option<&str> {
        match self
            .preview
            .as_ref()
            .and_then(|preview| preview.background_image.as_ref())
        {
            Some(image) => image.as_deref(),
            None => self.committed.background_image.as_deref(),
        }
    }

    pub fn effective_background_opacity(&self) -> f64 {
        self.preview
            .as_ref()
            .and_then(|preview| preview.background_opacity)
            .unwrap_or(self.committed.background_opacity)
    }

    pub fn resolved(&self) -> ResolvedTheme {
        let mode = self.effective_mode();
        ResolvedTheme {
            mode,
            colors: self.effective_palette(mode).clone(),
            background_image: self.effective_background_image().map(str::to_string),
            background_opacity: self.effective_background_opacity(),
        }
    }

    pub(crate) fn refresh_unsaved_changes(&mut self) {
        self.has_unsaved_changes = self
            .preview
            .as_ref()
            .is_some_and(|preview| preview.differs_from(&self.committed));
    }
}

impl Serialize for ThemeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let committed = &self.committed;
        let mut state = serializer.serialize_struct("ThemeState", 13)?;
        state.serialize_field("mode", &committed.mode)?;
        state.serialize_field("lightTheme", &committed.light_theme)?;
        state.serialize_field("darkTheme", &committed.dark_theme)?;
        state.serialize_field("backgroundImage", &committed.background_image)?;
        state.serialize_field("backgroundOpacity", &committed.background_opacity)?;
        state.serialize_field("isReady", &self.is_ready)?;
        state.serialize_field("isInPreview", &self.is_in_preview())?;
        state.serialize_field("hasUnsavedChanges", &self.has_unsaved_changes)?;

        let Some(preview) = &self.preview else {
            return state.end();
        };
        if let Some(mode) = &preview.mode {
            state.serialize_field("previewMode", mode)?;
        }
        if let Some(colors) = &preview.light_theme {
            state.serialize_field("previewLightTheme", colors)?;
        }
        if let Some(colors) = &preview.dark_theme {
            state.serialize_field("previewDarkTheme", colors)?;
        }
        if let Some(image) = &preview.background_image {
            state.serialize_field("previewBackgroundImage", image)?;
        }
        if let Some(opacity) = &preview.background_opacity {
            state.serialize_field("previewBackgroundOpacity", opacity)?;
        }
        state.end()
    }
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::with_settings(builtin_settings())
    }
}

/// Clamp into `[0, 1]`; NaN collapses to fully transparent.
pub fn clamp_opacity(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

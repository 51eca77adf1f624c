use super::{MarkupOverrides, ThemeColors, ThemeMode, ThemeSettings};

pub const DEFAULT_BACKGROUND_OPACITY: f64 = 0.5;

/// Compile-time palette; converted to owned `ThemeColors` on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PaletteTokens {
    background: &'static str,
    primary: &'static str,
    text: &'static str,
    secondary: &'static str,
    user_bubble: &'static str,
    user_bubble_opacity: f64,
    ai_bubble: &'static str,
    ai_bubble_opacity: f64,
    user_text: &'static str,
    ai_text: &'static str,
}

const LIGHT_TOKENS: PaletteTokens = PaletteTokens {
    background: "#FAFAFA",
    primary: "#2563EB",
    text: "#18181B",
    secondary: "#64748B",
    user_bubble: "#2563EB",
    user_bubble_opacity: 1.0,
    ai_bubble: "#F4F4F5",
    ai_bubble_opacity: 1.0,
    user_text: "#FFFFFF",
    ai_text: "#18181B",
};

const DARK_TOKENS: PaletteTokens = PaletteTokens {
    background: "#09090B",
    primary: "#3B82F6",
    text: "#F4F4F5",
    secondary: "#A1A1AA",
    user_bubble: "#3B82F6",
    user_bubble_opacity: 0.9,
    ai_bubble: "#27272A",
    ai_bubble_opacity: 0.9,
    user_text: "#FFFFFF",
    ai_text: "#F4F4F5",
};

impl PaletteTokens {
    fn to_colors(self) -> ThemeColors {
        ThemeColors {
            background_color: self.background.to_string(),
            primary_color: self.primary.to_string(),
            text_color: self.text.to_string(),
            secondary_color: self.secondary.to_string(),
            user_bubble_color: self.user_bubble.to_string(),
            user_bubble_opacity: self.user_bubble_opacity,
            ai_bubble_color: self.ai_bubble.to_string(),
            ai_bubble_opacity: self.ai_bubble_opacity,
            user_text_color: self.user_text.to_string(),
            ai_text_color: self.ai_text.to_string(),
            markup: MarkupOverrides::default(),
        }
    }
}

pub fn builtin_theme_colors(mode: ThemeMode) -> ThemeColors {
    match mode {
        ThemeMode::Light => LIGHT_TOKENS.to_colors(),
        ThemeMode::Dark => DARK_TOKENS.to_colors(),
    }
}

pub fn builtin_settings() -> ThemeSettings {
    ThemeSettings {
        mode: ThemeMode::Light,
        light_theme: builtin_theme_colors(ThemeMode::Light),
        dark_theme: builtin_theme_colors(ThemeMode::Dark),
        background_image: None,
        background_opacity: DEFAULT_BACKGROUND_OPACITY,
    }
}

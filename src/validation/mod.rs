//! Gatekeeper between untrusted settings payloads and the store.
//!
//! Stored JSON and administrator documents arrive as arbitrary
//! `serde_json::Value`s. [`validate_settings`] either produces a normalized
//! [`ThemeSettings`] or a [`ValidationErrors`] listing every violation found.

mod defaults;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::theme::{clamp_opacity, ThemeColors, ThemeMode, ThemeSettings};

pub use defaults::{DefaultsError, DefaultsResolver};

const REQUIRED_COLOR_FIELDS: [&str; 8] = [
    "backgroundColor",
    "primaryColor",
    "textColor",
    "secondaryColor",
    "userBubbleColor",
    "aiBubbleColor",
    "userTextColor",
    "aiTextColor",
];
const REQUIRED_OPACITY_FIELDS: [&str; 2] = ["userBubbleOpacity", "aiBubbleOpacity"];
const PALETTE_KEYS: [(&str, ThemeMode); 2] = [
    ("lightTheme", ThemeMode::Light),
    ("darkTheme", ThemeMode::Dark),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    NotAnObject,
    InvalidMode(String),
    InvalidColor(String),
    NotANumber(String),
    OpacityOutOfRange(String),
    MissingField,
    InvalidBackgroundImage,
    Malformed(String),
}

/// One violation, located by a dotted path such as `lightTheme.primaryColor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = &self.path;
        match &self.kind {
            IssueKind::NotAnObject => write!(f, "{path}: expected an object"),
            IssueKind::InvalidMode(raw) => {
                write!(f, "{path}: expected \"light\" or \"dark\", got {raw}")
            }
            IssueKind::InvalidColor(raw) => {
                write!(f, "{path}: expected #RGB or #RRGGBB, got {raw}")
            }
            IssueKind::NotANumber(raw) => write!(f, "{path}: expected a number, got {raw}"),
            IssueKind::OpacityOutOfRange(raw) => {
                write!(f, "{path}: opacity {raw} is outside [0, 1]")
            }
            IssueKind::MissingField => write!(f, "{path}: required field is missing"),
            IssueKind::InvalidBackgroundImage => {
                write!(f, "{path}: expected a string reference or null")
            }
            IssueKind::Malformed(message) => write!(f, "{path}: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("theme settings rejected: {}", join_issues(.issues))]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check a single palette as it would be persisted under `key`
/// (`lightTheme` or `darkTheme`), returning the trimmed copy.
pub fn validate_colors(key: &str, colors: &ThemeColors) -> Result<ThemeColors, ValidationErrors> {
    let mut issues = Vec::new();
    let validated = match serde_json::to_value(colors) {
        Ok(raw) => validate_palette(key, &raw, &mut issues),
        Err(err) => {
            issues.push(ValidationIssue::new(key, IssueKind::Malformed(err.to_string())));
            None
        }
    };
    match validated {
        Some(colors) if issues.is_empty() => Ok(colors),
        _ => Err(ValidationErrors { issues }),
    }
}

/// Validate `candidate`, filling absent palettes and background fields from `defaults`.
pub fn validate_settings(
    candidate: &Value,
    defaults: &DefaultsResolver,
) -> Result<ThemeSettings, ValidationErrors> {
    let Some(object) = candidate.as_object() else {
        return Err(ValidationErrors {
            issues: vec![ValidationIssue::new("$", IssueKind::NotAnObject)],
        });
    };

    let mut issues = Vec::new();

    let mode = match present(object, "mode") {
        None => Some(ThemeMode::Light),
        Some(Value::String(raw)) => ThemeMode::parse(raw).or_else(|| {
            issues.push(ValidationIssue::new(
                "mode",
                IssueKind::InvalidMode(format!("{raw:?}")),
            ));
            None
        }),
        Some(other) => {
            issues.push(ValidationIssue::new(
                "mode",
                IssueKind::InvalidMode(other.to_string()),
            ));
            None
        }
    };

    let [light_theme, dark_theme] = PALETTE_KEYS.map(|(key, palette_mode)| match present(object, key) {
        None => Some(defaults.default_theme_colors(palette_mode)),
        Some(raw) => validate_palette(key, raw, &mut issues),
    });

    let background_opacity = match present(object, "backgroundOpacity") {
        None => Some(defaults.default_background_opacity()),
        Some(raw) => match as_number(raw) {
            Some(value) => Some(clamp_opacity(value)),
            None => {
                issues.push(ValidationIssue::new(
                    "backgroundOpacity",
                    IssueKind::NotANumber(raw.to_string()),
                ));
                None
            }
        },
    };

    let background_image = match present(object, "backgroundImage") {
        None => Some(None),
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            Some((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(_) => {
            issues.push(ValidationIssue::new(
                "backgroundImage",
                IssueKind::InvalidBackgroundImage,
            ));
            None
        }
    };

    match (
        mode,
        light_theme,
        dark_theme,
        background_image,
        background_opacity,
    ) {
        (Some(mode), Some(light_theme), Some(dark_theme), Some(background_image), Some(background_opacity))
            if issues.is_empty() =>
        {
            Ok(ThemeSettings {
                mode,
                light_theme,
                dark_theme,
                background_image,
                background_opacity,
            })
        }
        _ => Err(ValidationErrors { issues }),
    }
}

/// True for `#RGB` / `#RRGGBB` in either case.
pub fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.trim().strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn is_color_key(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with("color")
}

fn is_opacity_key(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with("opacity")
}

fn validate_palette(
    key: &str,
    raw: &Value,
    issues: &mut Vec<ValidationIssue>,
) -> Option<ThemeColors> {
    let Some(object) = raw.as_object() else {
        issues.push(ValidationIssue::new(key, IssueKind::NotAnObject));
        return None;
    };

    let before = issues.len();
    for field in REQUIRED_COLOR_FIELDS
        .iter()
        .chain(REQUIRED_OPACITY_FIELDS.iter())
    {
        if present(object, field).is_none() {
            issues.push(ValidationIssue::new(
                format!("{key}.{field}"),
                IssueKind::MissingField,
            ));
        }
    }

    let normalized = normalize_fields(key, object, issues);
    if issues.len() > before {
        return None;
    }

    match serde_json::from_value::<ThemeColors>(Value::Object(normalized)) {
        Ok(colors) => Some(colors),
        Err(err) => {
            issues.push(ValidationIssue::new(
                key,
                IssueKind::Malformed(err.to_string()),
            ));
            None
        }
    }
}

/// Check every color/opacity-suffixed key at any depth, returning a trimmed and
/// coerced copy of the object.
fn normalize_fields(
    path: &str,
    object: &Map<String, Value>,
    issues: &mut Vec<ValidationIssue>,
) -> Map<String, Value> {
    let mut normalized = Map::with_capacity(object.len());
    for (field, value) in object {
        let field_path = format!("{path}.{field}");
        let value = match value {
            Value::Null => continue,
            Value::Object(nested) => Value::Object(normalize_fields(&field_path, nested, issues)),
            _ if is_color_key(field) => match value.as_str().filter(|raw| is_hex_color(raw)) {
                Some(raw) => Value::String(raw.trim().to_string()),
                None => {
                    issues.push(ValidationIssue::new(
                        field_path,
                        IssueKind::InvalidColor(value.to_string()),
                    ));
                    continue;
                }
            },
            _ if is_opacity_key(field) => match as_number(value) {
                Some(opacity) if (0.0..=1.0).contains(&opacity) => Value::from(opacity),
                Some(_) => {
                    issues.push(ValidationIssue::new(
                        field_path,
                        IssueKind::OpacityOutOfRange(value.to_string()),
                    ));
                    continue;
                }
                None => {
                    issues.push(ValidationIssue::new(
                        field_path,
                        IssueKind::NotANumber(value.to_string()),
                    ));
                    continue;
                }
            },
            Value::String(raw) => Value::String(raw.trim().to_string()),
            other => other.clone(),
        };
        normalized.insert(field.clone(), value);
    }
    normalized
}

use crate::theme::ThemeState;

/// Paints the current theme. Called on every visible change, including
/// preview edits and discards.
pub trait ThemeRenderer {
    fn apply_snapshot(&self, state: &ThemeState);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl ThemeRenderer for NoopRenderer {
    fn apply_snapshot(&self, _state: &ThemeState) {}
}

impl<F> ThemeRenderer for F
where
    F: Fn(&ThemeState),
{
    fn apply_snapshot(&self, state: &ThemeState) {
        self(state)
    }
}

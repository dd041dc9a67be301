/// Cosmetic backdrop for the focus timer. The catalog and drawing live with
/// the host; the timer only says which theme to show and when to clear it.
pub trait ThemeRenderer: Send + Sync {
    fn apply(&self, theme_id: &str);
    fn clear(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopThemeRenderer;

impl ThemeRenderer for NoopThemeRenderer {
    fn apply(&self, _theme_id: &str) {}

    fn clear(&self) {}
}

//! Semantic color palette for decisions and tokens.

use owo_colors::{OwoColorize, Style};

fn allow_style() -> Style {
    Style::new().green().bold()
}

fn deny_style() -> Style {
    Style::new().red().bold()
}

fn token_style() -> Style {
    Style::new().cyan()
}

fn muted_style() -> Style {
    Style::new().dimmed()
}

fn header_style() -> Style {
    Style::new().bold()
}

/// Applies a style unless colors are disabled.
fn paint(value: &impl std::fmt::Display, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

/// Trait extension to apply semantic styles.
pub trait SemanticStyle {
    /// An Allow verdict or a passing check.
    fn allow(&self) -> String;
    /// A Deny verdict or a failing check.
    fn deny(&self) -> String;
    /// A privilege token or spec source.
    fn token(&self) -> String;
    fn muted(&self) -> String;
    fn header(&self) -> String;
}

impl<T: std::fmt::Display> SemanticStyle for T {
    fn allow(&self) -> String {
        paint(self, allow_style())
    }

    fn deny(&self) -> String {
        paint(self, deny_style())
    }

    fn token(&self) -> String {
        paint(self, token_style())
    }

    fn muted(&self) -> String {
        paint(self, muted_style())
    }

    fn header(&self) -> String {
        paint(self, header_style())
    }
}

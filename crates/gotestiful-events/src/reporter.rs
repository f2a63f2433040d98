// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Terminal colours for report lines
//!
//! Colour is a property of the [`Reporter`] value rather than a process-wide
//! switch, so every stage that formats text carries its own setting. Escape
//! codes are written whenever colour is on, whether or not stdout is a
//! terminal.

use owo_colors::{OwoColorize, Style};

/// Semantic colour of a piece of report text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Passing packages and high coverage (green)
    Good,
    /// Failures and low coverage (red)
    Alert,
    /// Packages without tests and medium coverage (yellow)
    Caution,
    /// Secondary information such as `cached` (dark gray)
    Muted,
    /// Test names and test output (light gray)
    Neutral,
    /// Terminal default colour
    Plain,
}

/// Formats text with ANSI colours when enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reporter {
    color: bool,
}

impl Reporter {
    /// Create a reporter; `color = false` returns all text untouched
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// A reporter that never emits escape codes
    #[must_use]
    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Colour `text` with `tone`
    #[must_use]
    pub fn paint(&self, tone: Tone, text: &str) -> String {
        if tone == Tone::Plain {
            return text.to_string();
        }
        self.styled(Self::style(tone), text)
    }

    /// Colour `text` with `tone` in bold
    #[must_use]
    pub fn paint_bold(&self, tone: Tone, text: &str) -> String {
        self.styled(Self::style(tone).bold(), text)
    }

    fn styled(&self, style: Style, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        text.style(style).to_string()
    }

    // 24-bit greys are written as-is, without terminal capability detection
    fn style(tone: Tone) -> Style {
        match tone {
            Tone::Good => Style::new().green(),
            Tone::Alert => Style::new().red(),
            Tone::Caution => Style::new().yellow(),
            Tone::Muted => Style::new().truecolor(85, 85, 85),
            Tone::Neutral => Style::new().truecolor(180, 180, 180),
            Tone::Plain => Style::new(),
        }
    }
}

/// Tier colour for a coverage percentage: below 50 alert, below 75 caution,
/// otherwise good
#[must_use]
pub fn coverage_tone(coverage: f64) -> Tone {
    if coverage < 50.0 {
        Tone::Alert
    } else if coverage < 75.0 {
        Tone::Caution
    } else {
        Tone::Good
    }
}

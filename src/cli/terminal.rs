//! Coloured output for node listings and command results.

use owo_colors::{OwoColorize, colors::css};
use reqtree::TypeTag;

/// The role a piece of output plays, which picks its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Success,
    Warning,
    Info,
    Dim,
}

impl Tone {
    /// Styles `text`, or returns it as is when stdout has no colour support.
    fn paint(self, text: &str) -> String {
        if supports_color::on_cached(supports_color::Stream::Stdout).is_none() {
            return text.to_string();
        }
        match self {
            Self::Success => text.fg::<css::Green>().to_string(),
            Self::Warning => text.fg::<css::Orange>().to_string(),
            Self::Info => text.fg::<css::LightBlue>().to_string(),
            Self::Dim => text.dimmed().to_string(),
        }
    }
}

/// Colours for command output.
pub trait Colorize: AsRef<str> {
    /// A completed change (green).
    fn success(&self) -> String {
        Tone::Success.paint(self.as_ref())
    }

    /// A destructive change or skipped input (amber).
    fn warning(&self) -> String {
        Tone::Warning.paint(self.as_ref())
    }

    /// A level number (blue).
    fn info(&self) -> String {
        Tone::Info.paint(self.as_ref())
    }

    /// Ids, headings and totals.
    fn dim(&self) -> String {
        Tone::Dim.paint(self.as_ref())
    }
}

impl<T: AsRef<str> + ?Sized> Colorize for T {}

/// The fixed-width label of a node variant and the tone it is shown in.
const fn badge_parts(tag: TypeTag) -> (&'static str, Tone) {
    match tag {
        TypeTag::Requirement => ("REQ", Tone::Info),
        TypeTag::Test => ("TST", Tone::Success),
        TypeTag::TestCase => ("TC ", Tone::Success),
        TypeTag::Unknown => ("???", Tone::Warning),
    }
}

/// A short, coloured badge for a node variant.
pub fn badge(tag: TypeTag) -> String {
    let (text, tone) = badge_parts(tag);
    tone.paint(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badges_line_up() {
        let tags = [
            TypeTag::Requirement,
            TypeTag::Test,
            TypeTag::TestCase,
            TypeTag::Unknown,
        ];
        for tag in tags {
            assert_eq!(badge_parts(tag).0.len(), 3);
        }
        assert_ne!(badge_parts(TypeTag::Test).0, badge_parts(TypeTag::TestCase).0);
    }
}

use colored::{Color, ColoredString, Colorize};

/// Role a piece of terminal text plays; each role owns one color and one marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Matched,
    Failed,
    Caution,
    Note,
    Trace,
    Title,
    Command,
    Key,
}

impl Tone {
    pub const fn color(self) -> Color {
        match self {
            Tone::Matched => Color::Green,
            Tone::Failed => Color::Red,
            Tone::Caution => Color::Yellow,
            Tone::Note => Color::Blue,
            Tone::Trace => Color::BrightBlack,
            Tone::Title => Color::BrightBlue,
            Tone::Command => Color::Magenta,
            Tone::Key => Color::BrightCyan,
        }
    }

    pub const fn marker(self) -> &'static str {
        match self {
            Tone::Matched => "✓",
            Tone::Failed => "✗",
            Tone::Caution => "⚠",
            Tone::Note => "ℹ",
            Tone::Trace | Tone::Command => "→",
            Tone::Title | Tone::Key => "•",
        }
    }

    /// `text` in this tone's color, or unchanged when color is off.
    pub fn paint(self, text: &str, color: bool) -> String {
        if !color {
            return text.to_string();
        }
        let painted: ColoredString = text.color(self.color());
        match self {
            Tone::Title | Tone::Key | Tone::Failed => painted.bold().to_string(),
            _ => painted.to_string(),
        }
    }

    /// Marker and text on one line, e.g. `✓ 3 row(s)`.
    pub fn line(self, text: &str, color: bool) -> String {
        format!("{} {}", self.paint(self.marker(), color), self.paint(text, color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_keep_markers() {
        assert_eq!(Tone::Matched.line("3 row(s)", false), "✓ 3 row(s)");
        assert_eq!(Tone::Caution.paint("careful", false), "careful");
    }
}

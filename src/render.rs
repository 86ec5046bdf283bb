//! Terminal output.
//!
//! The [`Renderer`] trait is everything the chat loop prints.  [`PlainTextRenderer`] writes to
//! stdout (or any writer) with an optional ANSI palette for the dark and light themes.

use std::borrow::Cow;
use std::io::{self, Stdout, Write};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::Role;

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for dim text.
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

static INLINE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(.*?)\]\(data:(image/[^;]*);base64,[^)]*\)").expect("static regex")
});

/// Color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Light text on a dark terminal.
    #[default]
    Dark,
    /// Dark text on a light terminal.
    Light,
}

impl Theme {
    /// The theme for a stored dark-mode flag.
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode { Theme::Dark } else { Theme::Light }
    }

    /// True for [`Theme::Dark`].
    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }

    fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                user: "\x1b[1;36m",
                assistant: "\x1b[1;35m",
                heading: "\x1b[1;33m",
            },
            Theme::Light => Palette {
                user: "\x1b[1;34m",
                assistant: "\x1b[1;32m",
                heading: "\x1b[1;30m",
            },
        }
    }
}

struct Palette {
    user: &'static str,
    assistant: &'static str,
    heading: &'static str,
}

/// Replace embedded base64 images with a short `[alt: mime]` marker.
pub fn display_content(content: &str) -> Cow<'_, str> {
    if !content.contains("data:image") {
        return Cow::Borrowed(content);
    }
    INLINE_IMAGE.replace_all(content, "[$1: $2]")
}

/// Output sink for the chat loop.
pub trait Renderer: Send {
    /// Begin an assistant reply; `label` names the speaker.
    fn start_reply(&mut self, label: &str);

    /// One revealed character of the reply.
    fn print_reply_char(&mut self, c: char);

    /// End of a reply that ran to completion.
    fn finish_reply(&mut self);

    /// End of a reply the user stopped.
    fn print_interrupted(&mut self);

    /// A whole stored message, as in the history view.
    fn print_message(&mut self, label: &str, role: Role, content: &str);

    /// A section heading, such as a session group.
    fn print_heading(&mut self, heading: &str);

    /// A line of informational output.
    fn print_info(&mut self, info: &str);

    /// An error line.
    fn print_error(&mut self, error: &str);

    /// Switch palettes.
    fn set_theme(&mut self, theme: Theme);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    theme: Theme,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a renderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_writer(io::stdout(), true, Theme::default())
    }

    /// Creates a renderer on stdout with the given color setting and theme.
    pub fn with_color(use_color: bool, theme: Theme) -> Self {
        Self::with_writer(io::stdout(), use_color, theme)
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer on an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool, theme: Theme) -> Self {
        Self {
            out,
            use_color,
            theme,
            line_start: true,
        }
    }

    /// The current theme.
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        // A closed stdout is not worth aborting a chat over.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn styled(&mut self, style: &str, text: &str) {
        if self.use_color {
            self.write(&format!("{style}{text}{ANSI_RESET}"));
        } else {
            self.write(text);
        }
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn role_style(&self, role: Role) -> &'static str {
        let palette = self.theme.palette();
        match role {
            Role::User => palette.user,
            Role::Assistant => palette.assistant,
        }
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_reply(&mut self, label: &str) {
        self.end_line();
        let style = self.role_style(Role::Assistant);
        self.styled(style, &format!("{label}:"));
        self.write(" ");
    }

    fn print_reply_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.write(c.encode_utf8(&mut buf));
    }

    fn finish_reply(&mut self) {
        self.end_line();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        self.styled(ANSI_DIM, "[interrupted]");
        self.write("\n");
    }

    fn print_message(&mut self, label: &str, role: Role, content: &str) {
        self.end_line();
        let style = self.role_style(role);
        self.styled(style, &format!("{label}:"));
        self.write(" ");
        self.write(&display_content(content));
        self.write("\n");
    }

    fn print_heading(&mut self, heading: &str) {
        self.end_line();
        let style = self.theme.palette().heading;
        self.styled(style, heading);
        self.write("\n");
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(info);
        self.write("\n");
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write("\n");
    }

    fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }
}

//! Structured status output.
//!
//! Every step of the session lifecycle is reported as a titled box tagged
//! with a category. The console reporter draws the box in color; the same
//! status is mirrored to `tracing` so log files see it too.

use std::io::IsTerminal;

use crossterm::style::{Color, Stylize};
use tracing::{error, info};

use crate::utils::{display_width, truncate_string, wrap_text};

// Color palette
const PRIMARY: Color = Color::Rgb { r: 64, g: 128, b: 192 };
const SECONDARY: Color = Color::Rgb { r: 96, g: 160, b: 96 };
const ACCENT: Color = Color::Rgb { r: 192, g: 160, b: 64 };
const ERROR: Color = Color::Rgb { r: 192, g: 64, b: 64 };

/// `tracing` target of mirrored status events
pub const STATUS_TARGET: &str = "semfca::status";

/// Widest box body, in characters
const MAX_INNER_WIDTH: usize = 68;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Loaded,
    Setup,
    Error,
    Bot,
}

impl StatusKind {
    pub fn tag(&self) -> &'static str {
        match self {
            StatusKind::Loaded => "loaded",
            StatusKind::Setup => "setup",
            StatusKind::Error => "error",
            StatusKind::Bot => "bot",
        }
    }

    fn color(&self) -> Color {
        match self {
            StatusKind::Loaded => SECONDARY,
            StatusKind::Setup => ACCENT,
            StatusKind::Error => ERROR,
            StatusKind::Bot => PRIMARY,
        }
    }
}

/// Receives status updates from the session lifecycle.
pub trait StatusReporter: Send + Sync {
    fn report(&self, title: &str, message: &str, kind: StatusKind);
}

/// Draw a status box as plain lines
pub fn render_box(title: &str, message: &str, kind: StatusKind) -> Vec<String> {
    let header = truncate_string(&format!("[{}] {}", kind.tag(), title), MAX_INNER_WIDTH);
    let body = wrap_text(message, MAX_INNER_WIDTH);

    let inner = body
        .iter()
        .map(|line| display_width(line))
        .chain(std::iter::once(display_width(&header)))
        .max()
        .unwrap_or(0);

    let rule = "─".repeat(inner + 2);
    let row = |text: &str| {
        let pad = " ".repeat(inner - display_width(text));
        format!("│ {}{} │", text, pad)
    };

    let mut lines = Vec::with_capacity(body.len() + 4);
    lines.push(format!("╭{}╮", rule));
    lines.push(row(&header));
    lines.push(format!("├{}┤", rule));
    lines.extend(body.iter().map(|line| row(line)));
    lines.push(format!("╰{}╯", rule));
    lines
}

/// Prints status boxes to the terminal. Errors go to stderr.
pub struct ConsoleReporter {
    color: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        let color = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
        Self { color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter for ConsoleReporter {
    fn report(&self, title: &str, message: &str, kind: StatusKind) {
        if kind == StatusKind::Error {
            error!(target: STATUS_TARGET, kind = kind.tag(), title, message, "status");
        } else {
            info!(target: STATUS_TARGET, kind = kind.tag(), title, message, "status");
        }

        let lines = render_box(title, message, kind);
        let rendered: Vec<String> = lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                if !self.color {
                    line
                } else if i == 1 {
                    line.with(kind.color()).bold().to_string()
                } else {
                    line.with(kind.color()).to_string()
                }
            })
            .collect();

        let text = rendered.join("\n");
        if kind == StatusKind::Error {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }
}

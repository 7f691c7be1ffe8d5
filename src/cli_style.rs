use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const AMBER: Color = Color::Rgb {
        r: 255,
        g: 191,
        b: 0,
    };
    pub const TEAL: Color = Color::Rgb {
        r: 0,
        g: 200,
        b: 180,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 80,
        g: 220,
        b: 100,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 140,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 240,
        g: 240,
        b: 240,
    };
}

mod symbols {
    pub const CHECK: &str = "✔";
    pub const CROSS_MARK: &str = "✘";
    pub const WARNING: &str = "⚠";
    pub const BULLET: &str = "●";
    pub const HORIZONTAL: &str = "─";
    pub const VERTICAL: &str = "│";
    pub const TOP_LEFT: &str = "╭";
    pub const TOP_RIGHT: &str = "╮";
    pub const BOTTOM_LEFT: &str = "╰";
    pub const BOTTOM_RIGHT: &str = "╯";
    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const BAR_FULL: &str = "█";
    pub const BAR_EMPTY: &str = "░";
}

const SECTION_WIDTH: usize = 60;

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        symbols::CHECK.with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        symbols::CROSS_MARK.with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        symbols::WARNING.with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_section_header(title: &str) {
    let title_len = title.width();
    let padding = SECTION_WIDTH.saturating_sub(title_len + 2) / 2;
    let rest = SECTION_WIDTH.saturating_sub(title_len + 2 + padding);

    println!();
    println!(
        "{}{} {} {}{}",
        symbols::TOP_LEFT.with(colors::AMBER),
        symbols::HORIZONTAL.repeat(padding).with(colors::AMBER),
        title.with(colors::AMBER).bold().attribute(Attribute::Italic),
        symbols::HORIZONTAL.repeat(rest).with(colors::AMBER),
        symbols::TOP_RIGHT.with(colors::AMBER)
    );
}

pub fn print_section_footer() {
    println!(
        "{}{}{}",
        symbols::BOTTOM_LEFT.with(colors::AMBER),
        symbols::HORIZONTAL.repeat(SECTION_WIDTH).with(colors::AMBER),
        symbols::BOTTOM_RIGHT.with(colors::AMBER)
    );
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        symbols::BULLET.with(colors::TEAL),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

/// Key/value line followed by a progress bar of `done` out of `total`.
pub fn print_progress(key: &str, done: usize, total: usize) {
    println!(
        "  {} {} {} {}",
        symbols::BULLET.with(colors::TEAL),
        format!("{}:", key).with(colors::DIM),
        progress_bar(done, total, 20).with(colors::TEAL),
        format!("{}/{}", done, total).with(colors::WHITE)
    );
}

pub fn progress_bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        width
    } else {
        (done.min(total) * width) / total
    };
    format!(
        "{}{}",
        symbols::BAR_FULL.repeat(filled),
        symbols::BAR_EMPTY.repeat(width - filled)
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tables
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: &[&str]) -> Self {
        TableBuilder {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            col_widths: headers.iter().map(|h| h.width()).collect(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (width, cell) in self.col_widths.iter_mut().zip(&row) {
            *width = (*width).max(cell.width());
        }
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn border(&self, left: &str, right: &str) -> String {
        let inner: Vec<String> = self
            .col_widths
            .iter()
            .map(|w| symbols::HORIZONTAL.repeat(w + 2))
            .collect();
        format!("{}{}{}", left, inner.join(symbols::HORIZONTAL), right)
    }

    fn line(&self, cells: &[String]) -> String {
        let padded: Vec<String> = self
            .col_widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!(" {}{} ", cell, " ".repeat(width.saturating_sub(cell.width())))
            })
            .collect();
        format!(
            "{}{}{}",
            symbols::VERTICAL,
            padded.join(symbols::VERTICAL),
            symbols::VERTICAL
        )
    }

    /// Unstyled rendering, one string per terminal line.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.border(symbols::TOP_LEFT, symbols::TOP_RIGHT),
            self.line(&self.headers),
            self.border(symbols::T_LEFT, symbols::T_RIGHT),
        ];
        lines.extend(self.rows.iter().map(|row| self.line(row)));
        lines.push(self.border(symbols::BOTTOM_LEFT, symbols::BOTTOM_RIGHT));
        lines
    }

    pub fn print(&self) {
        let lines = self.render_lines();
        let last = lines.len() - 1;
        for (i, line) in lines.into_iter().enumerate() {
            if i == 1 {
                println!("{}", line.with(colors::AMBER).bold());
            } else if i <= 2 || i == last {
                println!("{}", line.with(colors::DIM));
            } else {
                println!("{}", line.with(colors::WHITE));
            }
        }
    }
}

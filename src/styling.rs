//! Consolidated styling module for terminal output.
//!
//! This module uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - Semantic message helpers for domain-specific use
//!
//! # Styling with color-print
//!
//! Use `cformat!` with HTML-like tags for user-facing messages:
//!
//! ```
//! use color_print::cformat;
//!
//! let branch = "feature/login";
//! let msg = cformat!("<green>Finished <bold>{branch}</></>");
//! ```
//!
//! Semantic mapping: errors `<red>`, warnings `<yellow>`, hints `<dim>`,
//! progress `<cyan>`, success `<green>`.

use anstyle::{AnsiColor, Color, Style};
use color_print::cformat;
use unicode_width::UnicodeWidthStr;

// ============================================================================
// Re-exports from anstream (auto-detecting output)
// ============================================================================

/// Auto-detecting println that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::println;

/// Auto-detecting eprintln that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprintln;

/// Auto-detecting print that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::print;

/// Auto-detecting eprint that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprint;

// ============================================================================
// Semantic Style Constants (for Display impls and computed styles)
// ============================================================================

/// Error style (red) - use as `{ERROR}text{ERROR:#}`
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Error bold style - for the subject inside an error line
pub const ERROR_BOLD: Style = Style::new()
    .fg_color(Some(Color::Ansi(AnsiColor::Red)))
    .bold();

/// Warning style (yellow) - use as `{WARNING}text{WARNING:#}`
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Hint style (dimmed) - use as `{HINT}text{HINT:#}`
pub const HINT: Style = Style::new().dimmed();

// ============================================================================
// Message Emojis
// ============================================================================

/// Progress emoji: `cformat!("{PROGRESS_EMOJI} <cyan>message</>")`
pub const PROGRESS_EMOJI: &str = "🔄";

/// Success emoji: `cformat!("{SUCCESS_EMOJI} <green>message</>")`
pub const SUCCESS_EMOJI: &str = "✅";

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Info emoji - use for neutral status
pub const INFO_EMOJI: &str = "⚪";

// ============================================================================
// Message Formatting Functions
// ============================================================================
//
// These functions provide the canonical formatting for each message type.
// Used by both command handlers and Display impls (GitError, FlowError) to
// ensure consistent styling.

/// Format an error message with emoji and red styling
///
/// Content can include inner styling like `<bold>`:
/// ```
/// use color_print::cformat;
/// use gitflow::styling::error_message;
///
/// let name = "feature/login";
/// println!("{}", error_message(cformat!("Branch <bold>{name}</> not found")));
/// ```
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a hint message with emoji and dim styling
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a success message with emoji and green styling
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("{SUCCESS_EMOJI} <green>{}</>", content.as_ref())
}

/// Format a progress message with emoji and cyan styling
pub fn progress_message(content: impl AsRef<str>) -> String {
    cformat!("{PROGRESS_EMOJI} <cyan>{}</>", content.as_ref())
}

/// Format an info message with emoji (no color - neutral status)
pub fn info_message(content: impl AsRef<str>) -> String {
    cformat!("{INFO_EMOJI} {}", content.as_ref())
}

// ============================================================================
// Gutter Formatting
// ============================================================================

/// Default terminal width fallback if detection fails
const DEFAULT_TERMINAL_WIDTH: usize = 80;

/// Get terminal width, defaulting to 80 if detection fails
///
/// Checks COLUMNS environment variable first (for testing and scripts),
/// then falls back to actual terminal size detection.
fn get_terminal_width() -> usize {
    if let Ok(cols) = std::env::var("COLUMNS")
        && let Ok(width) = cols.parse::<usize>()
    {
        return width;
    }

    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
}

/// Wraps text at word boundaries to fit within the specified width
fn wrap_text_at_width(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 || text.width() <= max_width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let word_width = word.width();

        if current_line.is_empty() {
            // A single word longer than max_width is included anyway
            current_line = word.to_string();
            current_width = word_width;
        } else {
            let new_width = current_width + 1 + word_width;
            if new_width <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_width = new_width;
            } else {
                lines.push(current_line);
                current_line = word.to_string();
                current_width = word_width;
            }
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Formats text with a gutter (single-space with background color) on each line.
///
/// This creates a subtle visual separator for quoted content like git output
/// or hook stderr. Text is word-wrapped at terminal width to prevent overflow.
///
/// The gutter appears at column 0, followed by 2 spaces, then the content
/// starts at column 3, aligned with emoji messages where the emoji (2
/// columns) + space (1 column) also starts content at column 3.
pub fn format_with_gutter(content: &str, left_margin: &str, max_width: Option<usize>) -> String {
    let gutter = Style::new().bg_color(Some(Color::Ansi(AnsiColor::BrightWhite)));
    let mut output = String::new();

    let term_width = max_width.unwrap_or_else(get_terminal_width);
    let left_margin_width = left_margin.width();
    let available_width = term_width.saturating_sub(3 + left_margin_width);

    for line in content.lines() {
        for wrapped_line in wrap_text_at_width(line, available_width) {
            output.push_str(&format!(
                "{left_margin}{gutter} {gutter:#}  {wrapped_line}\n"
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_helpers_contain_content() {
        assert!(error_message("boom").contains("boom"));
        assert!(hint_message("try --help").contains("try --help"));
        assert!(warning_message("careful").contains("careful"));
        assert!(success_message("done").contains("done"));
        assert!(progress_message("working").contains("working"));
        assert!(info_message("neutral").contains("neutral"));
    }

    #[test]
    fn test_message_helpers_contain_emoji() {
        assert!(error_message("x").contains(ERROR_EMOJI));
        assert!(hint_message("x").contains(HINT_EMOJI));
        assert!(warning_message("x").contains(WARNING_EMOJI));
        assert!(success_message("x").contains(SUCCESS_EMOJI));
        assert!(progress_message("x").contains(PROGRESS_EMOJI));
        assert!(info_message("x").contains(INFO_EMOJI));
    }

    #[test]
    fn test_format_with_gutter_prefixes_every_line() {
        let formatted = format_with_gutter("one\ntwo", "", Some(80));
        assert_eq!(formatted.lines().count(), 2);
        for line in formatted.lines() {
            assert!(line.contains("  one") || line.contains("  two"));
        }
    }

    #[test]
    fn test_format_with_gutter_wraps_long_lines() {
        let long = "word ".repeat(40);
        let formatted = format_with_gutter(long.trim(), "", Some(40));
        assert!(formatted.lines().count() > 1);
    }

    #[test]
    fn test_wrap_preserves_long_single_word() {
        let lines = wrap_text_at_width("averyveryverylongword", 5);
        assert_eq!(lines, vec!["averyveryverylongword".to_string()]);
    }
}

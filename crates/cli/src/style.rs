//! Shared styling utilities for terminal output.

use console::Style;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Style for a manifest entry's `color`: a color name or a 0-255 palette
/// index. Anything else renders unstyled.
pub fn entry_style(color: &str) -> Style {
    let style = Style::new();
    let color = color.trim();
    if let Ok(index) = color.parse::<u8>() {
        return style.color256(index);
    }
    match color.to_ascii_lowercase().as_str() {
        "black" => style.black(),
        "red" => style.red(),
        "green" => style.green(),
        "yellow" => style.yellow(),
        "blue" => style.blue(),
        "magenta" => style.magenta(),
        "cyan" => style.cyan(),
        "white" => style.white(),
        _ => style,
    }
}

/// `name` painted in the entry's color.
pub fn entry(name: &str, color: &str) -> String {
    entry_style(color).apply_to(name).to_string()
}

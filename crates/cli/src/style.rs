//! Terminal styling for operator-facing output.

use console::Style;

/// Green check mark followed by `msg`.
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Red cross followed by `msg`.
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// "set" in green or `missing` in red, for secret presence checks.
pub fn presence(present: bool, missing: &str) -> String {
    if present {
        Style::new().green().apply_to("set").to_string()
    } else {
        Style::new().red().apply_to(missing).to_string()
    }
}

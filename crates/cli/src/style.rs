//! Terminal styling for report and command output.

use console::Style;

fn marked(mark: &str, color: Style, msg: &str) -> String {
    format!("{} {}", color.apply_to(mark), msg)
}

/// Green check mark, then the message.
pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

/// Red cross, then the message.
pub fn error(msg: &str) -> String {
    marked("✗", Style::new().red(), msg)
}

/// Yellow warning sign, then the message.
pub fn warn(msg: &str) -> String {
    marked("⚠", Style::new().yellow(), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Account label as shown in listings.
pub fn account(label: &str) -> String {
    Style::new().cyan().bold().apply_to(label).to_string()
}

pub fn dry_run() -> String {
    Style::new()
        .yellow()
        .bold()
        .apply_to("DRY RUN · no changes were made")
        .to_string()
}

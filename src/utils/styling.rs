//! Terminal styling utilities

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static MODEL: Emoji<'_, '_> = Emoji("🧠 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static BOOK: Emoji<'_, '_> = Emoji("📚 ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
     _                              _       _
  __| |_ __ ___  _ ____      ____ _| |_ ___| |__
 / _` | '__/ _ \| '_ \ \ /\ / / _` | __/ __| '_ \
| (_| | | | (_) | |_) \ V  V / (_| | || (__| | | |
 \__,_|_|  \___/| .__/ \_/\_/ \__,_|\__\___|_| |_|
                |_|
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        style("◆").magenta().bold(),
        style("Dropout features, labels and risk scores").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(
    command: &str,
    personal: &Path,
    artifacts: &Path,
    output: &Path,
    roster: Option<&Path>,
) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style(format!("⚙️  Configuration ({})", command)).cyan().bold(),
        " ".repeat(box_width.saturating_sub(20 + command.len() + 3))
    );
    println!("    ├{}┤", line);
    println!(
        "    │  {} Personal:  {:<36}│",
        FOLDER,
        truncate_path(personal, 35)
    );
    println!(
        "    │  {} Artifacts: {:<36}│",
        MODEL,
        truncate_path(artifacts, 35)
    );
    println!(
        "    │  {} Output:    {:<36}│",
        SAVE,
        truncate_path(output, 35)
    );
    let roster_text = roster
        .map(|p| truncate_path(p, 35))
        .unwrap_or_else(|| "none".to_string());
    println!("    │  {} Roster:    {:<36}│", BOOK, roster_text);
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

/// Print the elapsed time of a step
pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {}",
        style(format!("⏱  {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("Dropwatch run complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(info) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}

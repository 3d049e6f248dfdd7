//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a price with thousands separators, e.g. `12,500,000.00 PKR`
pub fn format_price(amount: f64, currency: &str) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{} {}", sign, grouped, cents, currency)
}

/// Format a coefficient of determination
pub fn format_r2(r2: f64) -> String {
    format!("{:.4}", r2)
}

/// Color R² based on value
pub fn color_r2(r2: f64) -> String {
    let formatted = format_r2(r2);
    if r2 >= 0.8 {
        formatted.green().to_string()
    } else if r2 >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "loaded" => status.green().to_string(),
        "degraded" | "warning" => status.yellow().to_string(),
        "unhealthy" | "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Format an RFC 3339 timestamp for display
pub fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(12_500_000.0, "PKR"), "12,500,000.00 PKR");
        assert_eq!(format_price(999.999, "PKR"), "1,000.00 PKR");
        assert_eq!(format_price(12.5, "PKR"), "12.50 PKR");
        assert_eq!(format_price(-1234.0, "PKR"), "-1,234.00 PKR");
    }

    #[test]
    fn test_format_r2() {
        assert_eq!(format_r2(0.912345), "0.9123");
    }
}

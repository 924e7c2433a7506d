//! Output formatting utilities.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::config::OutputFormat;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Prints a section heading in table mode.
pub fn heading(title: &str, count: usize, format: OutputFormat) {
    if format == OutputFormat::Table {
        println!("{} ({count})", title.bold());
    }
}

/// Outputs data in the specified format.
pub fn output<T: Tabled + serde::Serialize>(
    data: &[T],
    format: OutputFormat,
) -> crate::CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                info("No results found.");
            } else {
                let table = Table::new(data).with(Style::rounded()).to_string();
                println!("{table}");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Outputs a single item.
pub fn output_single<T: serde::Serialize>(item: &T, format: OutputFormat) -> crate::CliResult<()> {
    match format {
        OutputFormat::Table => {
            let json = serde_json::to_value(item)?;
            print!("{}", render_value(&json, 0));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(item)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Outputs a list of plain values, one per line in table mode.
pub fn output_values(values: &[String], format: OutputFormat) -> crate::CliResult<()> {
    match format {
        OutputFormat::Table if values.is_empty() => info("No results found."),
        OutputFormat::Table => values.iter().for_each(|value| println!("{value}")),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(values)?),
    }
    Ok(())
}

/// Renders a JSON value as indented `key: value` lines. Empty strings,
/// nulls and empty collections are skipped.
fn render_value(value: &serde_json::Value, indent: usize) -> String {
    let prefix = "  ".repeat(indent);
    let mut out = String::new();

    match value {
        serde_json::Value::Array(arr) => {
            for item in arr {
                out.push_str(&format!("{prefix}- {}\n", scalar(item)));
            }
        }
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                if is_blank(val) {
                    continue;
                }
                if val.is_object() || val.is_array() {
                    out.push_str(&format!("{prefix}{key}:\n"));
                    out.push_str(&render_value(val, indent + 1));
                } else {
                    out.push_str(&format!("{prefix}{key}: {}\n", scalar(val)));
                }
            }
        }
        other => out.push_str(&format!("{prefix}{}\n", scalar(other))),
    }
    out
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Prompts for confirmation.
pub fn confirm(message: &str) -> crate::CliResult<bool> {
    print!("{message} [y/N]: ");
    std::io::Write::flush(&mut std::io::stdout())?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y") || input.trim().eq_ignore_ascii_case("yes"))
}

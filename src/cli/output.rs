//! Output formatting module for netres
//!
//! Human output is colored text; JSON and YAML output print one document
//! per command so results can be piped into other tools.

use anyhow::Result;
use colored::{Color, Colorize};
use netres::modules::{Diff, ModuleStatus};
use serde::Serialize;
use std::io::{self, Write};

use super::OutputFormat;
use crate::config::ColorsConfig;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Selected output format
    format: OutputFormat,
    /// Verbosity level
    verbosity: u8,
    /// Configured colors
    colors: ColorsConfig,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat, verbosity: u8, colors: ColorsConfig) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && colors.enabled && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            format,
            verbosity,
            colors,
        }
    }

    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print a machine-readable document in the selected format. Human
    /// output falls back to YAML.
    pub fn document<T: Serialize>(&self, value: &T) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml | OutputFormat::Human => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if !self.is_human() {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print the status line of a module run
    pub fn status(&self, resource: &str, status: ModuleStatus, message: &str) {
        if !self.is_human() {
            return;
        }

        let label = status.to_string();
        if self.use_color {
            let color = match status {
                ModuleStatus::Changed => Color::from(self.colors.changed.as_str()),
                ModuleStatus::Ok => Color::from(self.colors.ok.as_str()),
            };
            println!(
                "{}: [{}] => {}",
                label.color(color).bold(),
                resource.bright_white().bold(),
                message
            );
        } else {
            println!("{}: [{}] => {}", label, resource, message);
        }
    }

    /// Print CLI commands, one per line
    pub fn commands(&self, commands: &[String]) {
        if !self.is_human() {
            return;
        }

        for command in commands {
            if self.use_color {
                println!("  {}", command.bright_white());
            } else {
                println!("  {}", command);
            }
        }
    }

    /// Print a unified diff
    pub fn diff(&self, diff: &Diff) {
        if !self.is_human() {
            return;
        }
        let Some(details) = &diff.details else {
            return;
        };

        println!();
        for line in details.lines() {
            if !self.use_color {
                println!("{}", line);
            } else if line.starts_with('+') {
                println!("{}", line.color(Color::from(self.colors.added.as_str())));
            } else if line.starts_with('-') {
                println!("{}", line.color(Color::from(self.colors.removed.as_str())));
            } else {
                println!("{}", line.bright_black());
            }
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if !self.is_human() {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.is_human() {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || !self.is_human() {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "INFO:".blue(), message);
        } else {
            eprintln!("INFO: {}", message);
        }
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let header_line = format_row(headers.iter().map(|h| h.to_string()), &widths);
        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            println!("{}", header_line.bright_white().bold());
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{}", header_line);
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            println!("{}", format_row(row.iter().cloned(), &widths));
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

fn format_row(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

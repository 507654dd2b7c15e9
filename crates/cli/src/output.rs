//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use openforms_client::{CompletedStep, OpenFormsConfig, SubmissionOutcome};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for SubmissionOutcome {
    fn headers() -> Vec<&'static str> {
        vec!["Form", "Submission", "Steps", "Status checks", "Session deleted", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.form_name.clone(),
            self.submission_id.clone(),
            self.steps
                .iter()
                .map(|s| s.slug.as_str())
                .collect::<Vec<_>>()
                .join(" → "),
            self.poll_attempts.to_string(),
            if self.session_deleted { "yes" } else { "no" }.to_string(),
            format!("{} ms", self.duration_ms),
        ]
    }
}

impl TableDisplay for CompletedStep {
    fn headers() -> Vec<&'static str> {
        vec!["Step", "UUID"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.slug.clone(), self.uuid.clone()]
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(T::headers());
            table.add_row(item.row());
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(item).unwrap_or_default());
        }
        OutputFormat::Plain => {
            let row = item.row();
            for (header, value) in T::headers().iter().zip(row.iter()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

fn config_rows(config: &OpenFormsConfig) -> Vec<(&'static str, String)> {
    vec![
        ("base.uri", config.base_uri.clone()),
        ("base.path", config.base_path.clone()),
        ("csrf.cookie.name", config.csrf_cookie_name.clone()),
        ("csrf.header.name", config.csrf_header_name.clone()),
        ("session.cookie.name", config.session_cookie_name.clone()),
        ("polling.timeout", format!("{}s", config.polling_timeout.as_secs())),
        ("polling.interval", format!("{}s", config.polling_interval.as_secs())),
        ("http.timeout", format!("{}s", config.http_timeout.as_secs())),
        ("submission.delete_session", config.delete_session.to_string()),
        (
            "submission.statement_of_truth",
            config.accept_statement_of_truth.to_string(),
        ),
    ]
}

/// Print the effective configuration
pub fn print_config(config: &OpenFormsConfig, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Key", "Value"]);
            for (key, value) in config_rows(config) {
                table.add_row(vec![key.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (key, value) in config_rows(config) {
                println!("{} = {}", key, value);
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

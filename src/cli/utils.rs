use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::notify::{Notifier, TracingNotifier};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output a collection: JSON under `collection_name`, otherwise one line per row
pub fn output_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    rows: Value,
    lines: Vec<String>,
    empty_message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: rows
            }))?);
        }
        OutputFormat::Text if lines.is_empty() => {
            println!("{}", empty_message);
        }
        OutputFormat::Text => {
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// Notification sink printing to the terminal, mirrored into the log
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    output_format: OutputFormat,
}

impl ConsoleNotifier {
    pub fn new(output_format: OutputFormat) -> Self {
        Self { output_format }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify_success(&self, message: &str) {
        TracingNotifier.notify_success(message);
        if let Err(e) = output_success(&self.output_format, message, None) {
            tracing::warn!(error = %e, "could not print notification");
        }
    }

    fn notify_failure(&self, message: &str) {
        TracingNotifier.notify_failure(message);
        if let Err(e) = output_error(&self.output_format, message, None) {
            tracing::warn!(error = %e, "could not print notification");
        }
    }
}

/// First line of `text`, cut to `width` characters
pub fn preview(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > width {
        let cut: String = line.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}

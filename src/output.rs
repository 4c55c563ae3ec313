//! Output layer for the dbfixture CLI.
//!
//! - stdout: the answer (human text or JSON)
//! - stderr: progress and human-mode errors

use serde::Serialize;

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone)]
pub struct Output {
    pub mode: OutputMode,
    pub quiet: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
            quiet,
        }
    }

    /// Write the command's answer to stdout (human mode only).
    pub fn data(&self, message: &str) {
        if self.mode == OutputMode::Human {
            println!("{}", message);
        }
    }

    /// Write a JSON payload to stdout (JSON mode only).
    pub fn json<T: Serialize>(&self, data: &T) -> Result<(), serde_json::Error> {
        if self.mode == OutputMode::Json {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        Ok(())
    }

    /// Progress message on stderr; suppressed by --quiet and in JSON mode.
    pub fn info(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet {
            return;
        }
        eprintln!("{}", message);
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }
}

/// JSON envelope for a successful command.
#[derive(Debug, Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub ok: bool,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub data: T,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            ok: true,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }
}

/// JSON envelope for a failed command (stdout, non-zero exit).
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub ok: bool,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub error: JsonErrorInfo,
}

#[derive(Debug, Serialize)]
pub struct JsonErrorInfo {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlstate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            error: JsonErrorInfo {
                code,
                message: message.into(),
                sqlstate: None,
                details: None,
            },
        }
    }

    pub fn with_sqlstate(mut self, sqlstate: Option<String>) -> Self {
        self.error.sqlstate = sqlstate;
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(_) => println!(r#"{{"ok":false}}"#),
        }
    }
}

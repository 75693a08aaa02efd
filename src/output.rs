// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Normal, quiet (CI), and JSON-lines modes for progress, results, remote output, and errors.

use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    started: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            started: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => emit_stderr(&Event::new("warning", message)),
        }
    }

    /// Print captured remote output verbatim (a JSON event in json mode).
    pub fn remote_output(&self, host: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                print!("{text}");
                if !text.ends_with('\n') {
                    println!();
                }
            }
            OutputMode::Json => emit_stdout(&Event {
                host: Some(host),
                ..Event::new("output", text)
            }),
        }
    }

    /// Print rows under a header with space-padded columns.
    pub fn table(&self, title: &str, header: &[&str], rows: &[Vec<String>]) {
        if self.mode == OutputMode::Json {
            for row in rows {
                let fields: Vec<(&str, &str)> = header
                    .iter()
                    .copied()
                    .zip(row.iter().map(String::as_str))
                    .collect();
                emit_stdout(&Row { fields: &fields });
            }
            return;
        }

        if self.mode == OutputMode::Normal {
            println!("{title}");
        }
        let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
        for row in rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }
        let render = |cells: Vec<&str>| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("   ")
                .trim_end()
                .to_string()
        };
        println!("{}", render(header.to_vec()));
        for row in rows {
            println!("{}", render(row.iter().map(String::as_str).collect()));
        }
    }

    /// Print a success message with timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => println!("{message} ({:.1}s)", self.elapsed_secs()),
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => emit_stdout(&Event {
                duration_secs: Some(self.elapsed_secs()),
                ..Event::new("success", message)
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => emit_stderr(&Event {
                duration_secs: Some(self.elapsed_secs()),
                ..Event::new("error", message)
            }),
        }
    }
}

#[derive(Serialize)]
struct Event<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

impl<'a> Event<'a> {
    fn new(event: &'a str, message: &'a str) -> Self {
        Self {
            event,
            message,
            host: None,
            duration_secs: None,
        }
    }
}

struct Row<'a> {
    fields: &'a [(&'a str, &'a str)],
}

impl Serialize for Row<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn emit_stdout<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

fn emit_stderr<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        eprintln!("{json}");
    }
}

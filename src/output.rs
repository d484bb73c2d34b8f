// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, including per-action reports.

use crate::converge::{ActionOutcome, ApplyReport, CleanupResult};
use crate::diagnostics::Warning;
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

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one action result.
    pub fn outcome(&self, outcome: &ActionOutcome) {
        match self.mode {
            OutputMode::Normal => {
                let marker = if outcome.updated { "updated" } else { "ok" };
                println!(
                    "  {marker:>7}  {} {}: {}",
                    outcome.action, outcome.target, outcome.summary
                );
            }
            OutputMode::Quiet => {
                if outcome.updated {
                    println!("{} {}", outcome.action, outcome.target);
                }
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "action",
                outcome: Some(outcome),
                ..JsonEvent::default()
            }),
        }
    }

    /// Print the result of a dangling image sweep.
    pub fn sweep(&self, result: &CleanupResult) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                if !result.removed.is_empty() || self.mode == OutputMode::Normal {
                    println!("removed {} image(s)", result.removed.len());
                }
                for failure in &result.failed {
                    eprintln!("Warning: could not remove {}: {}", failure.id, failure.reason);
                }
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "sweep",
                sweep: Some(result),
                ..JsonEvent::default()
            }),
        }
    }

    /// Print a whole run: every outcome, then the sweep and warnings.
    pub fn report(&self, report: &ApplyReport) {
        for outcome in &report.outcomes {
            self.outcome(outcome);
        }
        if let Some(sweep) = &report.sweep {
            self.sweep(sweep);
        }
        for warning in &report.warnings {
            self.warning(warning);
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, warning: &Warning) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Warning: {}", warning.message);
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "warning",
                warning: Some(warning),
                ..JsonEvent::default()
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "success",
                message: Some(message),
                duration_secs: self.duration(),
                ..JsonEvent::default()
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message: Some(message),
                    duration_secs: self.duration(),
                    ..JsonEvent::default()
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn emit(event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize, Default)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(flatten)]
    outcome: Option<&'a ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sweep: Option<&'a CleanupResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

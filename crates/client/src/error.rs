//! Error types for the submission workflow

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenFormsError {
    #[error("{operation} returned HTTP {actual}, expected {expected}: {body}")]
    UnexpectedStatus {
        operation: String,
        expected: String,
        actual: u16,
        body: String,
    },

    #[error("Form contains {expected} steps, but data for {supplied} steps was supplied")]
    StepCountMismatch { expected: usize, supplied: usize },

    #[error("Form has no step with slug '{slug}' (available: {})", .available.join(", "))]
    UnknownStep { slug: String, available: Vec<String> },

    #[error("Step '{slug}' was not completed: {reason}")]
    StepNotCompleted { slug: String, reason: String },

    #[error("Submission did not complete after {attempts} status checks ({waited_secs}s)")]
    PollTimeout { attempts: u32, waited_secs: u64 },

    #[error("Cookie '{0}' was not set by the form page")]
    MissingCookie(String),

    #[error("Invalid step data: {0}")]
    InvalidStepData(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration file not found: {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type OpenFormsResult<T> = Result<T, OpenFormsError>;

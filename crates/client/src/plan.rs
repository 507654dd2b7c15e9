//! Declarative YAML submission plans

use serde::Deserialize;
use std::path::Path;

use crate::data::FormStepData;
use crate::error::{OpenFormsError, OpenFormsResult};

/// A submission to create, parsed from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionPlan {
    /// Name of the form, as used in its URL
    pub form: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Start without prior authentication
    #[serde(default = "default_anonymous")]
    pub anonymous: bool,

    /// Require data for every step of the form
    #[serde(default)]
    pub strict: bool,

    /// Step data in the order it is submitted
    pub steps: Vec<FormStepData>,
}

fn default_anonymous() -> bool {
    true
}

impl SubmissionPlan {
    /// Parse a plan from a YAML string
    pub fn from_yaml(yaml: &str) -> OpenFormsResult<Self> {
        serde_yaml::from_str(yaml).map_err(OpenFormsError::from)
    }

    /// Parse a plan from a YAML file
    pub fn from_file(path: &Path) -> OpenFormsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all plans from a directory, sorted by file name
    pub fn load_all(dir: &Path) -> OpenFormsResult<Vec<Self>> {
        let mut plans = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            plans.push(Self::from_file(entry.path())?);
        }

        Ok(plans)
    }
}

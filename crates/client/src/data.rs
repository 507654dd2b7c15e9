//! Form step data and its mapping onto the steps a form declares

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{OpenFormsError, OpenFormsResult};

const DEFAULT_STATE: &str = "submitted";

fn default_state() -> String {
    DEFAULT_STATE.to_string()
}

/// Data a caller supplies for one step of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormStepData {
    /// Slug of the form step this data belongs to
    #[serde(skip_serializing)]
    pub slug: String,

    /// Field values, keyed by component key
    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default = "default_state")]
    pub state: String,
}

impl FormStepData {
    pub fn new(slug: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            slug: slug.into(),
            data,
            metadata: Map::new(),
            state: default_state(),
        }
    }

    /// Build step data from a `serde_json::json!({...})` object.
    ///
    /// Anything other than a JSON object is rejected.
    pub fn from_json(slug: impl Into<String>, data: Value) -> OpenFormsResult<Self> {
        let slug = slug.into();
        match data {
            Value::Object(map) => Ok(Self::new(slug, map)),
            other => Err(OpenFormsError::InvalidStepData(format!(
                "data for step '{}' must be a JSON object, got {}",
                slug, other
            ))),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }
}

/// A step as declared by the form details endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredStep {
    pub uuid: String,
    pub slug: String,
}

/// The parts of the form details response the workflow relies on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDetails {
    pub uuid: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub steps: Vec<DeclaredStep>,
}

impl FormDetails {
    pub fn slugs(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.slug.clone()).collect()
    }
}

/// Step data resolved against the server-declared step it targets
#[derive(Debug, Clone, PartialEq)]
pub struct FormStep {
    uuid: String,
    name: String,
    data: FormStepData,
}

impl FormStep {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Slug of the server-declared step
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &FormStepData {
        &self.data
    }
}

/// Fail when the caller supplied data for a different number of steps than the form has
pub fn verify_step_count(details: &FormDetails, supplied: &[FormStepData]) -> OpenFormsResult<()> {
    if details.steps.len() != supplied.len() {
        return Err(OpenFormsError::StepCountMismatch {
            expected: details.steps.len(),
            supplied: supplied.len(),
        });
    }
    Ok(())
}

/// Pair each supplied step with the declared step carrying the same slug.
///
/// The result keeps the caller's order. Declared steps are scanned in server
/// order and the first slug match wins.
pub fn compile_form_steps(
    details: &FormDetails,
    supplied: &[FormStepData],
) -> OpenFormsResult<Vec<FormStep>> {
    supplied
        .iter()
        .map(|step_data| {
            let declared = details
                .steps
                .iter()
                .find(|declared| declared.slug == step_data.slug)
                .ok_or_else(|| OpenFormsError::UnknownStep {
                    slug: step_data.slug.clone(),
                    available: details.slugs(),
                })?;

            debug!("Matched step '{}' to {}", declared.slug, declared.uuid);

            Ok(FormStep {
                uuid: declared.uuid.clone(),
                name: declared.slug.clone(),
                data: step_data.clone(),
            })
        })
        .collect()
}

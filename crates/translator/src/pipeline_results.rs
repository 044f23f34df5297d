//! Results embedded in a Tekton PipelineRun carried inside a CDF payload.
//!
//! The CDF Tekton integration puts the whole PipelineRun into the event data
//! as a *string* field whose value is itself a JSON document:
//!
//! ```json
//! { "pipelinerun": "{\"status\":{\"pipelineResults\":[{\"name\":\"sh.keptn.context\",\"value\":\"abc\"}]}}" }
//! ```
//!
//! Decoding is two explicit stages: the outer payload document (done by
//! [`crate::IncomingEvent::payload_document`]), then the nested PipelineRun.
//! Every failure along the way produces an empty [`PipelineResults`].

use serde::Deserialize;
use serde_json::{Map, Value};

/// Payload key holding the serialized PipelineRun.
pub const PIPELINE_RUN_KEY: &str = "pipelinerun";

/// Pipeline result carrying the Keptn context (conversation id).
pub const CONTEXT_RESULT: &str = "sh.keptn.context";

/// Pipeline result carrying the Keptn trigger id.
pub const TRIGGER_ID_RESULT: &str = "sh.keptn.trigger.id";

#[derive(Debug, Default, Deserialize)]
struct PipelineRun {
    #[serde(default)]
    status: PipelineRunStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineRunStatus {
    #[serde(default, rename = "pipelineResults")]
    pipeline_results: Vec<RawResult>,
}

// Tekton allows array and object results; only string values are usable here.
#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: Value,
}

/// One `{name, value}` pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Result name as declared in the Pipeline.
    pub name: String,
    /// String value of the result.
    pub value: String,
}

/// Ordered list of string-valued pipeline results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResults(Vec<PipelineResult>);

impl PipelineResults {
    /// Decodes the PipelineRun stored under `key` in `document`.
    ///
    /// The value may be a serialized JSON string (the usual Tekton encoding)
    /// or an inline object. A missing key, a value of any other shape, or
    /// invalid nested JSON all yield an empty list.
    pub fn from_document(document: &Map<String, Value>, key: &str) -> Self {
        let run = match document.get(key) {
            None => return Self::default(),
            Some(Value::String(nested)) => serde_json::from_str::<PipelineRun>(nested),
            Some(inline @ Value::Object(_)) => PipelineRun::deserialize(inline),
            Some(_) => {
                tracing::debug!(key, "embedded pipeline run has unexpected JSON type");
                return Self::default();
            }
        };

        match run {
            Ok(run) => Self(
                run.status
                    .pipeline_results
                    .into_iter()
                    .filter_map(|raw| match raw.value {
                        Value::String(value) if !raw.name.is_empty() => Some(PipelineResult {
                            name: raw.name,
                            value,
                        }),
                        _ => None,
                    })
                    .collect(),
            ),
            Err(err) => {
                tracing::debug!(key, error = %err, "embedded pipeline run could not be decoded");
                Self::default()
            }
        }
    }

    /// Returns the value of the last result named `name` that is non-empty.
    ///
    /// Later results override earlier ones with the same name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|r| r.name == name && !r.value.is_empty())
            .map(|r| r.value.as_str())
    }

    /// Returns `true` if no results were decoded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the decoded results in document order.
    pub fn iter(&self) -> impl Iterator<Item = &PipelineResult> {
        self.0.iter()
    }
}

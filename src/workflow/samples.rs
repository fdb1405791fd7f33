//! Bundled sample workflows
//!
//! Samples are compiled into the binary and parsed on demand, so every call
//! hands out an independent document the caller is free to mutate.

use crate::workflow::types::WorkflowDocument;
use thiserror::Error;

const SAMPLES: &[(&str, &str)] = &[
    (
        "workflow-new-lead",
        include_str!("../../samples/workflow-new-lead.json"),
    ),
    (
        "workflow-cart-recovery",
        include_str!("../../samples/workflow-cart-recovery.json"),
    ),
];

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Sample workflow not found: {0}")]
    NotFound(String),

    #[error("Sample workflow '{name}' is malformed: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Names of all bundled samples
pub fn list_samples() -> Vec<&'static str> {
    SAMPLES.iter().map(|(name, _)| *name).collect()
}

/// Load a bundled sample by name (without the `.json` suffix)
pub fn load_sample(name: &str) -> Result<WorkflowDocument, SampleError> {
    let name = name.strip_suffix(".json").unwrap_or(name);
    let (_, raw) = SAMPLES
        .iter()
        .find(|(sample, _)| *sample == name)
        .ok_or_else(|| SampleError::NotFound(name.to_string()))?;

    serde_json::from_str(raw).map_err(|source| SampleError::Malformed {
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_samples_parse() {
        for name in list_samples() {
            let doc = load_sample(name).unwrap();
            assert!(!doc.nodes.is_empty(), "{} has no nodes", name);
        }
    }

    #[test]
    fn test_unknown_sample() {
        let err = load_sample("workflow-missing").unwrap_err();
        assert!(matches!(err, SampleError::NotFound(ref n) if n == "workflow-missing"));
    }

    #[test]
    fn test_loads_are_independent() {
        let mut first = load_sample("workflow-new-lead.json").unwrap();
        first.nodes.clear();
        let second = load_sample("workflow-new-lead").unwrap();
        assert_eq!(second.nodes.len(), 5);
    }
}

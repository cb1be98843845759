//! Content-addressed identifiers.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::{AlgorithmConfiguration, LogMapping};

/// Hex chars kept from the digest for experiment ids.
const EXPERIMENT_ID_LEN: usize = 32;

/// The part of an experiment that determines its identity. Field order is
/// the canonical key order.
#[derive(Serialize)]
struct InvariantExperiment<'a> {
    email: &'a str,
    config: &'a AlgorithmConfiguration,
    mapping: &'a LogMapping,
    logs: &'a [String],
}

/// Deterministic id for an experiment: equal inputs give equal ids.
pub fn experiment_id(
    email: &str,
    config: &AlgorithmConfiguration,
    mapping: &LogMapping,
    logs: &[String],
) -> Result<String> {
    let canonical = serde_json::to_vec(&InvariantExperiment {
        email,
        config,
        mapping,
        logs,
    })?;
    let mut id = content_digest(&canonical);
    id.truncate(EXPERIMENT_ID_LEN);
    Ok(id)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn inputs() -> (AlgorithmConfiguration, LogMapping, Vec<String>) {
        let config = AlgorithmConfiguration {
            window_size: Some("7 days".into()),
            drift_magnitude: Some("1 h".into()),
            warnings: Some("3".into()),
        };
        let mut attributes = BTreeMap::new();
        attributes.insert("cost".to_string(), "cost".to_string());
        attributes.insert("area".to_string(), "area".to_string());
        let mapping = LogMapping {
            case: Some("case".into()),
            activity: Some("activity".into()),
            enablement: None,
            start: Some("start".into()),
            end: Some("end".into()),
            resource: Some("resource".into()),
            attributes,
        };
        (config, mapping, vec!["0a1b.csv".to_string()])
    }

    #[test]
    fn test_same_inputs_same_id() {
        let (config, mapping, logs) = inputs();
        let a = experiment_id("me@example.com", &config, &mapping, &logs).unwrap();
        let b = experiment_id("me@example.com", &config.clone(), &mapping.clone(), &logs.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), EXPERIMENT_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_any_changed_input_changes_id() {
        let (config, mapping, logs) = inputs();
        let base = experiment_id("", &config, &mapping, &logs).unwrap();

        let mut other_config = config.clone();
        other_config.warnings = Some("5".into());
        assert_ne!(base, experiment_id("", &other_config, &mapping, &logs).unwrap());

        let mut other_mapping = mapping.clone();
        other_mapping.enablement = Some(crate::DISCOVER_ENABLEMENT.into());
        assert_ne!(base, experiment_id("", &config, &other_mapping, &logs).unwrap());

        assert_ne!(base, experiment_id("x@y.z", &config, &mapping, &logs).unwrap());
        assert_ne!(base, experiment_id("", &config, &mapping, &[]).unwrap());
    }

    #[test]
    fn test_content_digest_known_value() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

//! Wizard state kept between the upload and the final submission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dynamik_common::{AlgorithmConfiguration, DynamikError, LogField, LogMapping, Result};

use crate::automap;
use crate::wizard::{NavAction, Outcome, Step, WizardState};

/// An uploaded log: the name the user gave it and the stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLog {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub logs: Vec<StoredLog>,
    pub headers: Vec<String>,
    #[serde(default)]
    pub mapping: LogMapping,
    #[serde(default)]
    pub config: AlgorithmConfiguration,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub wizard: WizardState,
}

impl Draft {
    /// Fresh draft with suggested column assignments.
    pub fn new(logs: Vec<StoredLog>, headers: Vec<String>) -> Self {
        let mapping = automap::suggest(&headers, &LogMapping::default());
        Self {
            id: Uuid::new_v4(),
            logs,
            headers,
            mapping,
            config: AlgorithmConfiguration::default(),
            email: String::new(),
            wizard: WizardState::default(),
        }
    }

    /// Stored file references, in upload order.
    pub fn log_files(&self) -> Vec<String> {
        self.logs.iter().map(|log| log.file.clone()).collect()
    }

    /// Take in the fields of the active step and check them.
    pub fn apply_form(&mut self, form: &HashMap<String, String>) -> Result<()> {
        let field = |key: &str| form.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        match self.wizard.active {
            Step::Mapping => {
                for log_field in LogField::ALL {
                    self.mapping.set(log_field, field(log_field.name()));
                }
                if let Some(column) = self.unknown_column() {
                    return Err(DynamikError::validation(
                        "Invalid mapping",
                        format!("'{column}' is not a column of the uploaded log"),
                    ));
                }
                self.mapping.assign_attributes(&self.headers);
                self.mapping.validate()
            }
            Step::Configuration => {
                self.config = AlgorithmConfiguration {
                    window_size: field("window_size"),
                    drift_magnitude: field("drift_magnitude"),
                    warnings: field("warnings"),
                };
                self.config.validate()
            }
            Step::Review => {
                self.email = field("email").unwrap_or_default();
                Ok(())
            }
        }
    }

    /// Apply the submitted form, then navigate.
    pub fn navigate(&mut self, action: NavAction, form: &HashMap<String, String>) -> Outcome {
        let check = self.apply_form(form);
        self.wizard.navigate(action, check)
    }

    fn unknown_column(&self) -> Option<&str> {
        LogField::ALL.iter().filter_map(|f| self.mapping.get(*f)).find(|column| {
            *column != dynamik_common::DISCOVER_ENABLEMENT && !self.headers.iter().any(|h| h.as_str() == *column)
        })
    }
}

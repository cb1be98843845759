//! Documents exchanged between the web front-end, the store and the worker.
//!
//! Field names follow the JSON the worker reads and writes, hence the
//! camelCase renames on the status and drift documents.

use std::collections::{BTreeMap, HashSet};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DynamikError, Result};
use crate::ids;
use crate::units::parse_duration;

/// Mapping value asking the worker to discover enablement timestamps itself.
pub const DISCOVER_ENABLEMENT: &str = "__DISCOVER__";

/// `[start, end]` bounds of a time window, as ISO-8601 strings.
pub type Window = [String; 2];

// ── Experiment ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub email: String,
    pub submitted: String,
    pub config: AlgorithmConfiguration,
    pub mapping: LogMapping,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl Experiment {
    /// Build an experiment stamped with the current time. The id only
    /// depends on `email`, `config`, `mapping` and `logs`.
    pub fn new(
        email: String,
        config: AlgorithmConfiguration,
        mapping: LogMapping,
        logs: Vec<String>,
    ) -> Result<Self> {
        let id = ids::experiment_id(&email, &config, &mapping, &logs)?;
        Ok(Self {
            id,
            email,
            submitted: now_iso(),
            config,
            mapping,
            logs,
        })
    }
}

/// Current UTC time in the `2024-01-31T10:00:00.000Z` shape.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Log mapping ───────────────────────────────────────────────────────────────

/// Logical event-log fields a CSV column can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogField {
    Case,
    Activity,
    Enablement,
    Start,
    End,
    Resource,
}

impl LogField {
    pub const ALL: [LogField; 6] = [
        LogField::Case,
        LogField::Activity,
        LogField::Enablement,
        LogField::Start,
        LogField::End,
        LogField::Resource,
    ];

    /// Key used in forms and in the mapping document.
    pub fn name(self) -> &'static str {
        match self {
            LogField::Case => "case",
            LogField::Activity => "activity",
            LogField::Enablement => "enablement",
            LogField::Start => "start",
            LogField::End => "end",
            LogField::Resource => "resource",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LogField::Case => "Case ID",
            LogField::Activity => "Activity",
            LogField::Enablement => "Enablement timestamp",
            LogField::Start => "Start timestamp",
            LogField::End => "End timestamp",
            LogField::Resource => "Resource",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMapping {
    #[serde(default)]
    pub case: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub enablement: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    /// Unmapped columns, passed through as extra attributes. Sorted so the
    /// serialized form is canonical.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl LogMapping {
    pub fn get(&self, field: LogField) -> Option<&str> {
        let value = match field {
            LogField::Case => &self.case,
            LogField::Activity => &self.activity,
            LogField::Enablement => &self.enablement,
            LogField::Start => &self.start,
            LogField::End => &self.end,
            LogField::Resource => &self.resource,
        };
        value.as_deref()
    }

    pub fn set(&mut self, field: LogField, column: Option<String>) {
        let column = column.filter(|c| !c.is_empty());
        match field {
            LogField::Case => self.case = column,
            LogField::Activity => self.activity = column,
            LogField::Enablement => self.enablement = column,
            LogField::Start => self.start = column,
            LogField::End => self.end = column,
            LogField::Resource => self.resource = column,
        }
    }

    /// Recompute `attributes` as every header not taken by a logical field.
    pub fn assign_attributes<'a>(&mut self, headers: impl IntoIterator<Item = &'a String>) {
        let taken: HashSet<&str> = LogField::ALL.iter().filter_map(|f| self.get(*f)).collect();
        let attributes = headers
            .into_iter()
            .filter(|h| !taken.contains(h.as_str()))
            .map(|h| (h.clone(), h.clone()))
            .collect();
        self.attributes = attributes;
    }

    /// Every logical field must be assigned, and no column may be used twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();

        for field in LogField::ALL {
            let column = self.get(field).ok_or_else(|| {
                DynamikError::validation(
                    "Invalid mapping",
                    format!("No column assigned to '{}'", field.label()),
                )
            })?;
            if !seen.insert(column) {
                return Err(DynamikError::validation(
                    "Invalid mapping",
                    "You assigned the same column to multiple attributes!",
                ));
            }
        }
        Ok(())
    }
}

// ── Algorithm configuration ──────────────────────────────────────────────────

pub const WINDOW_SIZES: &[&str] = &["1 day", "3 days", "7 days", "15 days", "30 days"];
pub const DRIFT_MAGNITUDES: &[&str] = &["5 min", "15 min", "30 min", "1 h", "3 h", "6 h", "12 h"];
pub const WARNING_COUNTS: &[&str] = &["1", "3", "5"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfiguration {
    #[serde(default)]
    pub window_size: Option<String>,
    #[serde(default)]
    pub drift_magnitude: Option<String>,
    #[serde(default)]
    pub warnings: Option<String>,
}

impl AlgorithmConfiguration {
    pub fn validate(&self) -> Result<()> {
        let (Some(window), Some(magnitude), Some(warnings)) = (
            non_empty(&self.window_size),
            non_empty(&self.drift_magnitude),
            non_empty(&self.warnings),
        ) else {
            return Err(DynamikError::validation(
                "Invalid configuration",
                "You have to set a value for every configuration parameter!",
            ));
        };

        if parse_duration(window).is_none() {
            return Err(DynamikError::validation(
                "Invalid configuration",
                format!("'{window}' is not a valid window size"),
            ));
        }
        if parse_duration(magnitude).is_none() {
            return Err(DynamikError::validation(
                "Invalid configuration",
                format!("'{magnitude}' is not a valid drift magnitude"),
            ));
        }
        match warnings.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err(DynamikError::validation(
                "Invalid configuration",
                format!("'{warnings}' is not a valid number of warnings"),
            )),
        }
    }

    /// `(key, value)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("window_size", self.window_size.as_deref()),
            ("drift_magnitude", self.drift_magnitude.as_deref()),
            ("warnings", self.warnings.as_deref()),
        ]
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// ── Execution status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Queued,
    Running,
    Finished,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Running => "running",
            Status::Finished => "finished",
            Status::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Failed)
    }

    /// Transitions the worker may report. Repeating a non-terminal state is a
    /// progress update.
    pub fn can_transition_to(self, next: Status) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Status::Failed) => true,
            (Status::Queued, Status::Queued | Status::Running) => true,
            (Status::Running, Status::Running | Status::Finished) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub status: Status,
    #[serde(default)]
    pub progress: i32,
    #[serde(default, deserialize_with = "window::deserialize")]
    pub current_ref: Window,
    #[serde(default, deserialize_with = "window::deserialize")]
    pub current_run: Window,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    pub status: ExecutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    pub last_update_date: String,
    #[serde(default)]
    pub drifts: Vec<DriftOverview>,
}

impl ExecutionStatus {
    /// Initial document written at submission time.
    pub fn queued(submitted: &str) -> Self {
        Self {
            status: ExecutionState {
                status: Status::Queued,
                progress: 0,
                current_ref: Default::default(),
                current_run: Default::default(),
                error: None,
            },
            start_date: None,
            last_update_date: submitted.to_string(),
            drifts: Vec::new(),
        }
    }

    pub fn state(&self) -> Status {
        self.status.status
    }

    /// Progress clamped to 0–100; the worker reports -1 on failure.
    pub fn progress_percent(&self) -> u8 {
        self.status.progress.clamp(0, 100) as u8
    }
}

// ── Drifts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftOverview {
    pub index: usize,
    #[serde(default)]
    pub experiment: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "window::deserialize")]
    pub reference_window: Window,
    #[serde(deserialize_with = "window::deserialize")]
    pub running_window: Window,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDetails {
    #[serde(flatten)]
    pub overview: DriftOverview,
    #[serde(default)]
    pub causes: Vec<DriftCause>,
}

/// One causal factor, e.g. `cycle-time/waiting-time/batching`. The snapshots
/// are opaque to the front-end and handed to the chart panels untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftCause {
    pub cause: String,
    #[serde(default)]
    pub reference: serde_json::Value,
    #[serde(default)]
    pub running: serde_json::Value,
}

mod window {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    use super::Window;

    /// Accepts `[start, end]`, `[]` or `null`; the latter two become empty bounds.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Window, D::Error> {
        let bounds: Option<Vec<String>> = Option::deserialize(d)?;
        match bounds.unwrap_or_default().as_slice() {
            [] => Ok(Window::default()),
            [start, end] => Ok([start.clone(), end.clone()]),
            other => Err(D::Error::invalid_length(other.len(), &"a window with two bounds")),
        }
    }
}

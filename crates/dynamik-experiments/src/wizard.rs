//! Setup wizard: mapping → configuration → review.
//!
//! Leaving a step runs its check and records the result, but never blocks
//! navigation. Only "Run" on the review step is gated: it goes through when
//! no recorded check has failed.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dynamik_common::DynamikError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Mapping,
    Configuration,
    Review,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Mapping, Step::Configuration, Step::Review];

    pub fn index(self) -> usize {
        match self {
            Step::Mapping => 0,
            Step::Configuration => 1,
            Step::Review => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Step::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Mapping => "Setup the log mapping",
            Step::Configuration => "Setup your experiment",
            Step::Review => "Validate configuration",
        }
    }

    pub fn is_last(self) -> bool {
        self == Step::Review
    }

    fn next(self) -> Step {
        Step::from_index(self.index() + 1).unwrap_or(self)
    }

    fn prev(self) -> Step {
        self.index().checked_sub(1).and_then(Step::from_index).unwrap_or(self)
    }
}

/// Navigation requested by the form's submit button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    /// "Next", or "Run" when on the last step.
    Next,
    Prev,
    Go(Step),
}

impl FromStr for NavAction {
    type Err = DynamikError;

    /// Accepts `next`, `run`, `prev` and `go:{index}`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" | "run" => Ok(NavAction::Next),
            "prev" => Ok(NavAction::Prev),
            other => other
                .strip_prefix("go:")
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(Step::from_index)
                .map(NavAction::Go)
                .ok_or_else(|| DynamikError::validation("Invalid navigation", format!("Unknown action '{s}'"))),
        }
    }
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
}

impl Toast {
    pub fn blocked_run() -> Self {
        Self {
            title: "Error on form submission!".into(),
            description: "Please fix the errors in the form before submitting".into(),
        }
    }
}

impl From<&DynamikError> for Toast {
    fn from(err: &DynamikError) -> Self {
        match err {
            DynamikError::Validation { title, description } => Self {
                title: title.clone(),
                description: description.clone(),
            },
            other => Self { title: "Error".into(), description: other.to_string() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Now showing `step`. `toast` reports a failed check of the step just left.
    Moved { step: Step, toast: Option<Toast> },
    /// Run with every recorded check passing.
    Submit,
    /// Run refused because a recorded check failed.
    Blocked(Toast),
}

/// Active step plus the last check result of each step (`None` until the
/// step is left for the first time).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub active: Step,
    pub validity: [Option<bool>; 3],
}

impl WizardState {
    pub fn validity_of(&self, step: Step) -> Option<bool> {
        self.validity[step.index()]
    }

    /// Record `check` for the active step, then apply `action`.
    pub fn navigate(&mut self, action: NavAction, check: Result<(), DynamikError>) -> Outcome {
        let current = self.active;
        self.validity[current.index()] = Some(check.is_ok());
        let toast = check.as_ref().err().map(Toast::from);

        let target = match action {
            NavAction::Next if current.is_last() => {
                if self.validity.iter().all(|v| *v != Some(false)) {
                    return Outcome::Submit;
                }
                return Outcome::Blocked(toast.unwrap_or_else(Toast::blocked_run));
            }
            NavAction::Next => current.next(),
            NavAction::Prev => current.prev(),
            NavAction::Go(step) => step,
        };

        self.active = target;
        Outcome::Moved { step: target, toast }
    }
}

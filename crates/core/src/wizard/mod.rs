pub mod controller;
pub mod events;

pub use controller::{PendingRequest, WizardController, FAILURE_NOTICE};
pub use events::WizardEvent;

use crate::domain::preferences::{
    Budget, Complication, Movement, Style, Usage, UserPreferences, WristSize,
};
use crate::domain::recommendation::Recommendation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Intro,
    Style,
    Complications,
    Specs,
    Context,
    Result,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Intro,
        Step::Style,
        Step::Complications,
        Step::Specs,
        Step::Context,
        Step::Result,
    ];

    /// Forward neighbour. `Context -> Result` is the request trigger.
    pub fn next(self) -> Option<Step> {
        match self {
            Step::Intro => Some(Step::Style),
            Step::Style => Some(Step::Complications),
            Step::Complications => Some(Step::Specs),
            Step::Specs => Some(Step::Context),
            Step::Context => Some(Step::Result),
            Step::Result => None,
        }
    }

    /// Backward neighbour for the input steps. Leaving `Result` is a restart,
    /// not a step back, so it has none.
    pub fn previous(self) -> Option<Step> {
        match self {
            Step::Intro | Step::Result => None,
            Step::Style => Some(Step::Intro),
            Step::Complications => Some(Step::Style),
            Step::Specs => Some(Step::Complications),
            Step::Context => Some(Step::Specs),
        }
    }

    pub fn progress_percent(self) -> u8 {
        match self {
            Step::Style => 20,
            Step::Complications => 40,
            Step::Specs => 60,
            Step::Context => 80,
            Step::Intro | Step::Result => 100,
        }
    }

    pub fn is_input(self) -> bool {
        !matches!(self, Step::Intro | Step::Result)
    }
}

/// Every input a front-end can feed the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum WizardAction {
    Advance,
    Retreat,
    Restart,
    ToggleStyle(Style),
    ToggleComplication(Complication),
    SetBudget(Budget),
    SetMovement(Movement),
    SetUsage(Usage),
    SetWristSize(WristSize),
    SetAdditionalInfo(String),
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub step: Step,
    pub progress: u8,
    pub loading: bool,
    pub can_advance: bool,
    pub preferences: UserPreferences,
    pub result: Option<Recommendation>,
}

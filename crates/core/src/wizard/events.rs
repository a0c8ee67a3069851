use crate::domain::recommendation::Recommendation;
use crate::wizard::Step;
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    StepChanged { from: Step, to: Step },
    LoadingChanged { loading: bool },
    PreferencesChanged,
    ResultReady { recommendation: Box<Recommendation> },
    ResultCleared,
    /// User-facing message, e.g. a failed search.
    Notification { message: String },
}

/// Fan-out of wizard events to any number of renderers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WizardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: WizardEvent) {
        // No subscriber is fine: the state itself is the source of truth.
        let _ = self.tx.send(event);
    }
}

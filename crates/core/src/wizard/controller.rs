use crate::domain::preferences::{
    Budget, Complication, Movement, Style, Usage, UserPreferences, WristSize,
};
use crate::domain::recommendation::Recommendation;
use crate::llm::LlmClient;
use crate::wizard::events::{EventBus, WizardEvent};
use crate::wizard::{Step, WizardAction, WizardState};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const FAILURE_NOTICE: &str =
    "Une erreur est survenue lors de la recherche. Veuillez réessayer.";

/// Owns one session: the current step, the answers so far and the last result.
pub struct WizardController {
    step: Step,
    preferences: UserPreferences,
    loading: bool,
    result: Option<Recommendation>,
    client: Arc<dyn LlmClient>,
    events: EventBus,
    // Bumped on every search start and cancellation; stale outcomes are ignored.
    generation: u64,
}

/// A search that has been started by [`WizardController::begin_request`].
///
/// It owns a copy of the answers and the client, so it can run without
/// borrowing the controller. Hand the outcome back to
/// [`WizardController::finish_request`].
pub struct PendingRequest {
    generation: u64,
    preferences: UserPreferences,
    client: Arc<dyn LlmClient>,
}

impl PendingRequest {
    pub async fn run(&self) -> anyhow::Result<Recommendation> {
        self.client.fetch_recommendations(&self.preferences).await
    }
}

/// Cancels the search if the `advance` future is dropped before it resolves.
struct InFlight<'a> {
    wizard: &'a mut WizardController,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.wizard.is_pending(self.generation) {
            tracing::warn!("recommendation request dropped before completion");
            self.wizard.cancel_request();
            self.wizard.go_to(Step::Context);
        }
    }
}

impl WizardController {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            step: Step::Intro,
            preferences: UserPreferences::default(),
            loading: false,
            result: None,
            client,
            events: EventBus::default(),
            generation: 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn result(&self) -> Option<&Recommendation> {
        self.result.as_ref()
    }

    pub fn snapshot(&self) -> WizardState {
        WizardState {
            step: self.step,
            progress: self.step.progress_percent(),
            loading: self.loading,
            can_advance: self.can_advance(),
            preferences: self.preferences.clone(),
            result: self.result.clone(),
        }
    }

    /// Style and complications need at least one pick; every other input step
    /// has defaults. Nothing lies beyond `Result`.
    pub fn can_advance(&self) -> bool {
        match self.step {
            Step::Style => !self.preferences.style.is_empty(),
            Step::Complications => !self.preferences.complications.is_empty(),
            Step::Result => false,
            Step::Intro | Step::Specs | Step::Context => true,
        }
    }

    /// Moves one step forward. From `Context` this runs the recommendation
    /// request and resolves on `Result` (success) or back on `Context` (failure).
    pub async fn advance(&mut self) -> Step {
        if !self.can_advance() {
            tracing::debug!(step = ?self.step, "advance ignored");
            return self.step;
        }

        match self.step.next() {
            Some(Step::Result) => {
                if let Some(pending) = self.begin_request() {
                    let mut guard = InFlight {
                        generation: pending.generation,
                        wizard: &mut *self,
                    };
                    let outcome = pending.run().await;
                    guard.wizard.finish_request(&pending, outcome);
                }
            }
            Some(next) => self.go_to(next),
            None => {}
        }
        self.step
    }

    /// Moves one step back. From `Result` it drops the result and starts over at
    /// `Intro`, keeping the answers so they can be tweaked.
    pub fn retreat(&mut self) -> Step {
        self.cancel_request();
        if self.step == Step::Result {
            self.clear_result();
            self.go_to(Step::Intro);
        } else if let Some(previous) = self.step.previous() {
            self.go_to(previous);
        }
        self.step
    }

    /// Forgets everything: answers, result and position.
    pub fn restart(&mut self) {
        self.cancel_request();
        self.clear_result();
        self.preferences = UserPreferences::default();
        self.events.emit(WizardEvent::PreferencesChanged);
        self.go_to(Step::Intro);
    }

    pub fn toggle_style(&mut self, style: Style) {
        self.preferences.style.toggle(style);
        self.events.emit(WizardEvent::PreferencesChanged);
    }

    pub fn toggle_complication(&mut self, complication: Complication) {
        self.preferences.complications.toggle(complication);
        self.events.emit(WizardEvent::PreferencesChanged);
    }

    pub fn set_budget(&mut self, budget: Budget) {
        self.update(|p| p.budget = Some(budget));
    }

    pub fn set_movement(&mut self, movement: Movement) {
        self.update(|p| p.movement = movement);
    }

    pub fn set_usage(&mut self, usage: Usage) {
        self.update(|p| p.usage = usage);
    }

    pub fn set_wrist_size(&mut self, wrist_size: WristSize) {
        self.update(|p| p.wrist_size = wrist_size);
    }

    pub fn set_additional_info(&mut self, info: impl Into<String>) {
        let info = info.into();
        self.update(|p| p.additional_info = info);
    }

    pub async fn apply(&mut self, action: WizardAction) {
        match action {
            WizardAction::Advance => {
                self.advance().await;
            }
            WizardAction::Retreat => {
                self.retreat();
            }
            WizardAction::Restart => self.restart(),
            WizardAction::ToggleStyle(style) => self.toggle_style(style),
            WizardAction::ToggleComplication(c) => self.toggle_complication(c),
            WizardAction::SetBudget(budget) => self.set_budget(budget),
            WizardAction::SetMovement(movement) => self.set_movement(movement),
            WizardAction::SetUsage(usage) => self.set_usage(usage),
            WizardAction::SetWristSize(size) => self.set_wrist_size(size),
            WizardAction::SetAdditionalInfo(info) => self.set_additional_info(info),
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut UserPreferences)) {
        f(&mut self.preferences);
        self.events.emit(WizardEvent::PreferencesChanged);
    }

    /// Starts a search from `Context`: loading goes up and the step moves to
    /// `Result` right away so the loading state has somewhere to live.
    /// Returns `None` anywhere else.
    pub fn begin_request(&mut self) -> Option<PendingRequest> {
        if self.step != Step::Context || !self.can_advance() {
            return None;
        }
        self.generation += 1;
        self.set_loading(true);
        self.go_to(Step::Result);
        Some(PendingRequest {
            generation: self.generation,
            preferences: self.preferences.clone(),
            client: self.client.clone(),
        })
    }

    /// Applies the outcome of `pending`. Outcomes of searches that were
    /// cancelled or superseded in the meantime are dropped.
    pub fn finish_request(
        &mut self,
        pending: &PendingRequest,
        outcome: anyhow::Result<Recommendation>,
    ) {
        if !self.is_pending(pending.generation) {
            tracing::debug!(
                generation = pending.generation,
                "stale recommendation outcome ignored"
            );
            return;
        }

        match outcome {
            Ok(recommendation) => {
                tracing::info!(
                    provider = ?pending.client.provider(),
                    watches = recommendation.watches.len(),
                    "recommendations ready"
                );
                self.events.emit(WizardEvent::ResultReady {
                    recommendation: Box::new(recommendation.clone()),
                });
                self.result = Some(recommendation);
                self.set_loading(false);
            }
            Err(err) => {
                tracing::error!(
                    provider = ?pending.client.provider(),
                    error = %format!("{err:#}"),
                    "recommendation request failed"
                );
                self.clear_result();
                self.set_loading(false);
                self.events.emit(WizardEvent::Notification {
                    message: FAILURE_NOTICE.to_string(),
                });
                self.go_to(Step::Context);
            }
        }
    }

    fn is_pending(&self, generation: u64) -> bool {
        self.loading && self.step == Step::Result && self.generation == generation
    }

    fn cancel_request(&mut self) {
        if self.loading {
            self.generation += 1;
            self.set_loading(false);
        }
    }

    fn go_to(&mut self, to: Step) {
        if self.step == to {
            return;
        }
        let from = std::mem::replace(&mut self.step, to);
        self.events.emit(WizardEvent::StepChanged { from, to });
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.events.emit(WizardEvent::LoadingChanged { loading });
        }
    }

    fn clear_result(&mut self) {
        if self.result.take().is_some() {
            self.events.emit(WizardEvent::ResultCleared);
        }
    }
}

use crate::input::{self, Input};
use crate::render;
use anyhow::Context;
use montres_core::llm::prompt::render_instruction;
use montres_core::llm::LlmClient;
use montres_core::wizard::{Step, WizardAction, WizardController, WizardEvent};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// Drives the wizard from stdin until the user quits or stdin closes.
pub async fn run_interactive(client: Arc<dyn LlmClient>, dry_run: bool) -> anyhow::Result<()> {
    let mut wizard = WizardController::new(client);
    let notices = tokio::spawn(print_notices(wizard.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", render::screen(&wizard.snapshot()));

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let input = match input::parse(wizard.step(), &line) {
            Ok(input) => input,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        match input {
            Input::Quit => break,
            Input::Help => {
                println!("{}", render::HELP);
                continue;
            }
            Input::Show => {}
            Input::Action(WizardAction::Advance) if dry_run && wizard.step() == Step::Context => {
                println!("{}", render_instruction(wizard.preferences()));
                break;
            }
            Input::Action(action) => wizard.apply(action).await,
        }

        println!("{}", render::screen(&wizard.snapshot()));
    }

    notices.abort();
    Ok(())
}

async fn print_notices(mut events: broadcast::Receiver<WizardEvent>) {
    loop {
        match events.recv().await {
            Ok(WizardEvent::LoadingChanged { loading: true }) => {
                println!("Analyse horlogère en cours...");
            }
            Ok(WizardEvent::Notification { message }) => eprintln!("{message}"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "notice printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

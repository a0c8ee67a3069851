use montres_core::domain::preferences::{
    Budget, Choice, Complication, Movement, Style, Usage, WristSize,
};
use montres_core::wizard::{Step, WizardAction};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Action(WizardAction),
    Show,
    Help,
    Quit,
}

/// Maps one line typed at `step` to what the wizard should do.
pub fn parse(step: Step, line: &str) -> Result<Input, String> {
    let line = line.trim();
    match line {
        "q" | "quit" => return Ok(Input::Quit),
        "?" | "h" | "help" => return Ok(Input::Help),
        "n" => return Ok(Input::Action(WizardAction::Advance)),
        "r" => return Ok(Input::Action(WizardAction::Retreat)),
        "" if step == Step::Intro => return Ok(Input::Action(WizardAction::Advance)),
        "" => return Ok(Input::Show),
        _ => {}
    }

    let action = match step {
        Step::Style => WizardAction::ToggleStyle(pick::<Style>(line)?),
        Step::Complications => WizardAction::ToggleComplication(pick::<Complication>(line)?),
        Step::Specs => {
            if let Some(n) = line.strip_prefix('b') {
                WizardAction::SetBudget(pick::<Budget>(n)?)
            } else if let Some(n) = line.strip_prefix('m') {
                WizardAction::SetMovement(pick::<Movement>(n)?)
            } else {
                return Err(format!("commande inconnue: {line}"));
            }
        }
        Step::Context => {
            if let Some(info) = line.strip_prefix("i ") {
                WizardAction::SetAdditionalInfo(info.trim().to_string())
            } else if let Some(n) = line.strip_prefix('u') {
                WizardAction::SetUsage(pick::<Usage>(n)?)
            } else if let Some(n) = line.strip_prefix('w') {
                WizardAction::SetWristSize(pick::<WristSize>(n)?)
            } else {
                return Err(format!("commande inconnue: {line}"));
            }
        }
        Step::Intro | Step::Result => return Err(format!("commande inconnue: {line}")),
    };
    Ok(Input::Action(action))
}

/// 1-based index into `T::ALL`.
fn pick<T: Choice>(raw: &str) -> Result<T, String> {
    let n: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("numéro attendu, reçu: {raw}"))?;
    n.checked_sub(1)
        .and_then(|i| T::ALL.get(i).copied())
        .ok_or_else(|| format!("choix hors limites: {n} (1..={})", T::ALL.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_toggle_on_selection_steps() {
        assert_eq!(
            parse(Step::Style, "8"),
            Ok(Input::Action(WizardAction::ToggleStyle(Style::Undecided)))
        );
        assert_eq!(
            parse(Step::Complications, " 3 "),
            Ok(Input::Action(WizardAction::ToggleComplication(Complication::Moonphase)))
        );
        assert!(parse(Step::Style, "9").is_err());
        assert!(parse(Step::Style, "0").is_err());
    }

    #[test]
    fn prefixed_numbers_set_single_choices() {
        assert_eq!(
            parse(Step::Specs, "b2"),
            Ok(Input::Action(WizardAction::SetBudget(Budget::From500To2000)))
        );
        assert_eq!(
            parse(Step::Specs, "m2"),
            Ok(Input::Action(WizardAction::SetMovement(Movement::Quartz)))
        );
        assert_eq!(
            parse(Step::Context, "w3"),
            Ok(Input::Action(WizardAction::SetWristSize(WristSize::Large)))
        );
        assert!(parse(Step::Context, "b1").is_err());
    }

    #[test]
    fn free_text_goes_to_additional_info() {
        assert_eq!(
            parse(Step::Context, "i  un cadran vert "),
            Ok(Input::Action(WizardAction::SetAdditionalInfo("un cadran vert".into())))
        );
    }

    #[test]
    fn navigation_words_work_everywhere() {
        for step in Step::ALL {
            assert_eq!(parse(step, "n"), Ok(Input::Action(WizardAction::Advance)));
            assert_eq!(parse(step, "r"), Ok(Input::Action(WizardAction::Retreat)));
            assert_eq!(parse(step, "q"), Ok(Input::Quit));
        }
        assert_eq!(parse(Step::Intro, ""), Ok(Input::Action(WizardAction::Advance)));
        assert_eq!(parse(Step::Specs, ""), Ok(Input::Show));
    }

    #[test]
    fn non_ascii_input_is_rejected_not_panicking() {
        assert!(parse(Step::Specs, "é1").is_err());
    }
}

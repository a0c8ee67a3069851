use montres_core::domain::preferences::{
    Budget, Choice, Complication, Movement, Style, Usage, UserPreferences, WristSize,
};
use montres_core::domain::recommendation::Recommendation;
use montres_core::wizard::{Step, WizardState};
use std::fmt::Write;

pub const HELP: &str = "\
Commandes : n = continuer, r = retour, q = quitter, ? = aide
  Style / Complications : <numéro> pour cocher ou décocher
  Specs : b<numéro> budget, m<numéro> mouvement
  Contexte : u<numéro> usage, w<numéro> poignet, i <texte> commentaires";

fn mark(selected: bool) -> &'static str {
    if selected {
        "[x]"
    } else {
        "[ ]"
    }
}

fn list<T: Choice>(out: &mut String, prefix: &str, is_selected: impl Fn(T) -> bool) {
    for (i, choice) in T::ALL.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {} {prefix}{} {}",
            mark(is_selected(*choice)),
            i + 1,
            choice.label()
        );
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent / 10);
    format!("[{}{}] {percent}%", "#".repeat(filled), ".".repeat(10 - filled))
}

/// Text screen for the current wizard step.
pub fn screen(state: &WizardState) -> String {
    let prefs: &UserPreferences = &state.preferences;
    let mut out = String::new();

    if state.step.is_input() {
        let _ = writeln!(out, "{}", progress_bar(state.progress));
    }

    match state.step {
        Step::Intro => {
            out.push_str("Trouvez votre prochaine montre.\n");
            out.push_str("Répondez à quelques questions pour trouver la montre qui vous correspond.\n");
            out.push_str("Entrée pour commencer.\n");
        }
        Step::Style => {
            out.push_str("Quel univers vous attire ?\n");
            list::<Style>(&mut out, "", |s| prefs.style.contains(s));
        }
        Step::Complications => {
            out.push_str("Complications et affichage\n");
            list::<Complication>(&mut out, "", |c| prefs.complications.contains(c));
            if let Some(last) = prefs.complications.as_slice().last() {
                let _ = writeln!(out, "  ({})", last.description());
            }
        }
        Step::Specs => {
            out.push_str("Budget maximum\n");
            list::<Budget>(&mut out, "b", |b| prefs.budget == Some(b));
            out.push_str("Type de mouvement\n");
            list::<Movement>(&mut out, "m", |m| prefs.movement == m);
            let _ = writeln!(out, "  {}", prefs.movement.explanation());
        }
        Step::Context => {
            out.push_str("Quel sera son usage principal ?\n");
            list::<Usage>(&mut out, "u", |u| prefs.usage == u);
            out.push_str("Circonférence de votre poignet\n");
            list::<WristSize>(&mut out, "w", |w| prefs.wrist_size == w);
            let _ = writeln!(out, "Commentaires : {}", prefs.additional_info);
        }
        Step::Result => match &state.result {
            Some(result) => out.push_str(&recommendation(result)),
            None if state.loading => out.push_str("Analyse horlogère en cours...\n"),
            None => {}
        },
    }

    if state.step.is_input() && !state.can_advance {
        out.push_str("Sélectionnez au moins une option pour continuer.\n");
    }
    out
}

pub fn recommendation(rec: &Recommendation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Votre sélection sur mesure ({} pièces)", rec.watches.len());
    let _ = writeln!(out, "Le conseil expert : \"{}\"", rec.expert_advice);
    for (i, w) in rec.watches.iter().enumerate() {
        let badge = if w.is_promoted { " ★" } else { "" };
        let _ = writeln!(out, "\n{}. {} {}{badge}", i + 1, w.brand, w.model);
        let _ = writeln!(
            out,
            "   {} | {} | {} | {}",
            w.price_range, w.style, w.movement, w.diameter
        );
        let _ = writeln!(out, "   {}", w.description);
        let _ = writeln!(out, "   {}", w.image_url);
    }
    out.push_str("\nr pour relancer le test, q pour quitter.\n");
    out
}

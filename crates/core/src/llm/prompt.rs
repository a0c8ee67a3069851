use crate::domain::preferences::{Choice, UserPreferences};
use crate::domain::recommendation::WATCH_COUNT;

pub const UNDECIDED_STYLE_PHRASE: &str =
    "l'utilisateur n'est pas sûr de son style, suggère des pièces iconiques et polyvalentes";
pub const NO_COMPLICATION_PHRASE: &str =
    "Pas de préférence particulière pour les complications du cadran";

const STYLE_LIST_PREFIX: &str = "Styles favoris : ";
const COMPLICATION_LIST_PREFIX: &str = "Complications/Affichage souhaités : ";

fn style_line(prefs: &UserPreferences) -> String {
    if prefs.style.is_empty() || prefs.style.has_sentinel() {
        return UNDECIDED_STYLE_PHRASE.to_string();
    }
    format!("{STYLE_LIST_PREFIX}{}", prefs.style.labels().join(", "))
}

fn complications_line(prefs: &UserPreferences) -> String {
    if prefs.complications.is_empty() || prefs.complications.has_sentinel() {
        return NO_COMPLICATION_PHRASE.to_string();
    }
    format!(
        "{COMPLICATION_LIST_PREFIX}{}",
        prefs.complications.labels().join(", ")
    )
}

/// Renders the natural-language request sent to the generation service.
pub fn render_instruction(prefs: &UserPreferences) -> String {
    let budget = prefs.budget.map(Choice::label).unwrap_or("non précisé");
    let additional_info = match prefs.additional_info.trim() {
        "" => "aucune",
        info => info,
    };

    [
        "Agis en tant qu'expert horloger passionné pour le site Montres-Passion.fr.".to_string(),
        "L'utilisateur recherche une montre avec les critères suivants :".to_string(),
        format!("- {}", style_line(prefs)),
        format!("- {}", complications_line(prefs)),
        format!("- Budget : {budget}"),
        format!(
            "- Type de mouvement : {} (Si Mécanique, suggère des automatiques ou manuels de qualité)",
            prefs.movement.label()
        ),
        format!("- Usage : {}", prefs.usage.label()),
        format!("- Taille du poignet : {}", prefs.wrist_size.label()),
        format!("- Informations complémentaires : {additional_info}"),
        String::new(),
        format!(
            "Suggère exactement {WATCH_COUNT} montres réelles qui correspondent le mieux à ce profil."
        ),
        "Inclus des marques variées (Luxe, Indépendant, Entrée de gamme selon le budget).".to_string(),
        "Donne un conseil d'expert global expliquant pourquoi ces choix sont pertinents pour le \
         profil de cet utilisateur en citant les complications choisies si possible."
            .to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::{Budget, Complication, Movement, Style, Usage, WristSize};
    use serde_json::json;

    fn diver_quartz_prefs() -> UserPreferences {
        serde_json::from_value(json!({
            "style": ["Diver (Plongée)"],
            "complications": ["Pas de préférence"],
            "budget": "500€ - 2000€",
            "movement": "Quartz (Piles)",
            "usage": "Sport / Aventure",
            "wristSize": "Moyen (17-18cm)",
            "additionalInfo": "",
        }))
        .unwrap()
    }

    #[test]
    fn no_preference_complications_use_generic_phrase() {
        let text = render_instruction(&diver_quartz_prefs());

        assert!(text.contains(NO_COMPLICATION_PHRASE), "{text}");
        assert!(!text.contains(COMPLICATION_LIST_PREFIX), "{text}");
        for c in Complication::ALL.iter().filter(|c| **c != Complication::NoPreference) {
            assert!(!text.contains(c.label()), "unexpected {c}: {text}");
        }

        assert!(text.contains("Styles favoris : Diver (Plongée)"));
        assert!(text.contains("- Budget : 500€ - 2000€"));
        assert!(text.contains("- Type de mouvement : Quartz (Piles)"));
        assert!(text.contains("- Usage : Sport / Aventure"));
        assert!(text.contains("- Taille du poignet : Moyen (17-18cm)"));
        assert!(text.contains("exactement 4 montres"));
    }

    #[test]
    fn undecided_style_uses_versatile_phrasing() {
        let mut prefs = UserPreferences::default();
        prefs.style.toggle(Style::Undecided);
        prefs.complications.toggle(Complication::Moonphase);

        let text = render_instruction(&prefs);
        assert!(text.contains(UNDECIDED_STYLE_PHRASE), "{text}");
        assert!(!text.contains(STYLE_LIST_PREFIX), "{text}");
        assert!(!text.contains(Style::Undecided.label()));
    }

    #[test]
    fn lists_selected_tags_in_selection_order() {
        let mut prefs = UserPreferences::default();
        prefs.style.toggle(Style::Vintage);
        prefs.style.toggle(Style::Dress);
        prefs.complications.toggle(Complication::Gmt);
        prefs.complications.toggle(Complication::DateDay);
        prefs.budget = Some(Budget::Over10000);
        prefs.movement = Movement::Mechanical;
        prefs.usage = Usage::Investment;
        prefs.wrist_size = WristSize::Slim;
        prefs.additional_info = "  cadran vert  ".to_string();

        let text = render_instruction(&prefs);
        assert!(text.contains("Styles favoris : Vintage, Dress (Habillée)"), "{text}");
        assert!(
            text.contains("Complications/Affichage souhaités : GMT / 2nd Fuseau, Date / Jour"),
            "{text}"
        );
        assert!(text.contains("- Informations complémentaires : cadran vert\n"));
    }

    #[test]
    fn missing_budget_and_notes_are_spelled_out() {
        let text = render_instruction(&UserPreferences::default());
        assert!(text.contains("- Budget : non précisé"));
        assert!(text.contains("- Informations complémentaires : aucune"));
        assert!(text.contains(UNDECIDED_STYLE_PHRASE));
        assert!(text.contains(NO_COMPLICATION_PHRASE));
    }
}

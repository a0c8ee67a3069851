use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A fixed option list shown to the user. Labels double as wire values.
pub trait Choice: Copy + PartialEq + 'static {
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }
}

/// An option list containing a sentinel that excludes every other value.
pub trait Exclusive: Choice {
    const SENTINEL: Self;
}

macro_rules! choices {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant ),+
        }

        impl Choice for $name {
            const ALL: &'static [Self] = &[$( $name::$variant ),+];

            fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

choices! {
    pub enum Style {
        Diver => "Diver (Plongée)",
        Dress => "Dress (Habillée)",
        Chronograph => "Chronographe",
        Field => "Field (Terrain)",
        Gmt => "GMT (Voyage)",
        Minimalist => "Minimaliste",
        Vintage => "Vintage",
        Undecided => "Je ne sais pas encore",
    }
}

impl Exclusive for Style {
    const SENTINEL: Self = Style::Undecided;
}

choices! {
    pub enum Complication {
        DateDay => "Date / Jour",
        Chronograph => "Chronographe",
        Moonphase => "Phase de lune",
        Gmt => "GMT / 2nd Fuseau",
        PowerReserve => "Réserve de marche",
        Skeleton => "Squelette / Coeur ouvert",
        NoPreference => "Pas de préférence",
    }
}

impl Exclusive for Complication {
    const SENTINEL: Self = Complication::NoPreference;
}

impl Complication {
    pub fn description(self) -> &'static str {
        match self {
            Complication::DateDay => "L'affichage classique du jour du mois.",
            Complication::Chronograph => "Pour mesurer des durées (comme un chrono).",
            Complication::Moonphase => "Affiche l'aspect de la lune dans le ciel.",
            Complication::Gmt => "Pratique pour suivre deux fuseaux horaires.",
            Complication::PowerReserve => "Indique l'énergie restante dans le ressort.",
            Complication::Skeleton => "Permet de voir le mécanisme en mouvement.",
            Complication::NoPreference => "Un cadran épuré ou n'importe quelle option.",
        }
    }
}

choices! {
    pub enum Budget {
        Under500 => "Moins de 500€",
        From500To2000 => "500€ - 2000€",
        From2000To5000 => "2000€ - 5000€",
        From5000To10000 => "5000€ - 10000€",
        Over10000 => "Plus de 10000€",
    }
}

choices! {
    #[derive(Default)]
    pub enum Movement {
        #[default]
        Mechanical => "Mécanique (Auto/Manuel)",
        Quartz => "Quartz (Piles)",
    }
}

impl Movement {
    pub fn explanation(self) -> &'static str {
        match self {
            Movement::Mechanical => {
                "L'âme de l'horlogerie traditionnelle. Fonctionne sans pile grâce à un complexe \
                 assemblage de ressorts et de rouages. Le mouvement est perpétuel tant que la \
                 montre est portée ou remontée."
            }
            Movement::Quartz => {
                "La précision et la simplicité. Une pile fait vibrer un cristal de quartz pour \
                 une régularité parfaite. Idéal pour une montre toujours à l'heure sans \
                 entretien quotidien."
            }
        }
    }
}

choices! {
    #[derive(Default)]
    pub enum Usage {
        #[default]
        Daily => "Quotidien",
        SpecialOccasions => "Occasions spéciales",
        SportAdventure => "Sport / Aventure",
        Investment => "Investissement",
    }
}

choices! {
    #[derive(Default)]
    pub enum WristSize {
        Slim => "Fin (< 16cm)",
        #[default]
        Medium => "Moyen (17-18cm)",
        Large => "Large (> 19cm)",
    }
}

/// Ordered multi-select where `T::SENTINEL` never coexists with other values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T> {
    items: Vec<T>,
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Exclusive> Selection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picking the sentinel replaces the whole selection. Picking anything else
    /// drops the sentinel first, then flips membership of the value.
    pub fn toggle(&mut self, value: T) {
        if value == T::SENTINEL {
            self.items = vec![T::SENTINEL];
            return;
        }

        self.items.retain(|v| *v != T::SENTINEL);
        if let Some(pos) = self.items.iter().position(|v| *v == value) {
            self.items.remove(pos);
        } else {
            self.items.push(value);
        }
    }

    /// Adds `value` without ever removing it.
    fn insert(&mut self, value: T) {
        if value == T::SENTINEL {
            self.items = vec![T::SENTINEL];
        } else if !self.items.contains(&value) {
            self.items.retain(|v| *v != T::SENTINEL);
            self.items.push(value);
        }
    }

    pub fn contains(&self, value: T) -> bool {
        self.items.contains(&value)
    }

    pub fn has_sentinel(&self) -> bool {
        self.contains(T::SENTINEL)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items.iter().copied()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.iter().map(T::label).collect()
    }
}

impl<T: Exclusive> FromIterator<T> for Selection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = Self::new();
        for value in iter {
            out.insert(value);
        }
        out
    }
}

impl<T: Exclusive + Serialize> Serialize for Selection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Exclusive + Deserialize<'de>> Deserialize<'de> for Selection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

/// Answers accumulated over one wizard session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub style: Selection<Style>,
    pub complications: Selection<Complication>,
    #[serde(deserialize_with = "blank_budget_as_none")]
    pub budget: Option<Budget>,
    pub movement: Movement,
    pub usage: Usage,
    pub wrist_size: WristSize,
    pub additional_info: String,
}

// The front-end posts "" before a budget tier is picked.
fn blank_budget_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Budget>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => Budget::from_label(label)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unknown budget tier: {label}"))),
    }
}

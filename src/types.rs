use once_cell::sync::Lazy;
use std::{collections::HashSet, fmt::Display, str::FromStr};
use strsim::jaro_winkler;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const KG_PER_LB: f64 = 0.45359237;

/// Tolerance for comparing stored weights. Anything closer than this
/// counts as "the same weight" when tracking progression.
pub const WEIGHT_EPSILON: f64 = 0.001;

pub fn weights_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < WEIGHT_EPSILON
}

/// Display unit for weights. Storage is always kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lb,
}

impl WeightUnit {
    /// Converts a user-entered value in this unit into kilograms.
    pub fn to_kg(self, value: f64) -> f64 {
        match self {
            Self::Kg => value,
            Self::Lb => value * KG_PER_LB,
        }
    }

    /// Converts a stored kilogram value into this unit for display.
    pub fn from_kg(self, kg: f64) -> f64 {
        match self {
            Self::Kg => kg,
            Self::Lb => kg / KG_PER_LB,
        }
    }

    /// Renders a stored kilogram value with one decimal, e.g. "102.5 kg".
    pub fn format_kg(self, kg: f64) -> String {
        format!("{:.1} {}", self.from_kg(kg), self)
    }
}

impl Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kg => write!(f, "kg"),
            Self::Lb => write!(f, "lb"),
        }
    }
}

impl FromStr for WeightUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kg" | "kgs" | "kilogram" | "kilograms" => Ok(Self::Kg),
            "lb" | "lbs" | "pound" | "pounds" => Ok(Self::Lb),
            _ => Err(format!("unknown weight unit: {s}")),
        }
    }
}

pub static ALLOWED_MUSCLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "biceps",
        "triceps",
        "forearms",
        "chest",
        "shoulders",
        "back",
        "quads",
        "hamstrings",
        "glutes",
        "calves",
        "abs",
    ])
});

/// Returns the canonical lowercase muscle name or `None` if not allowed.
pub fn canonical_muscle<S: AsRef<str>>(m: S) -> Option<String> {
    let m = m.as_ref().trim().to_ascii_lowercase();
    if ALLOWED_MUSCLES.contains(m.as_str()) { Some(m) } else { None }
}

/// Picks the closest candidate for `input` if the match is strong
/// *and* clearly ahead of the runner-up. Otherwise `None` (no
/// suggestion shown).
pub fn best_suggestion<'a, I>(input: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    const MIN_SCORE: f64 = 0.80;
    const GAP: f64 = 0.02;

    let inp = input.to_ascii_lowercase();
    let mut scores: Vec<(&'a str, f64)> = candidates
        .into_iter()
        .map(|c| (c, jaro_winkler(&inp, &c.to_ascii_lowercase())))
        .collect();

    // Highest score first.
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best, best_score) = *scores.first()?;
    let second_score = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);

    if best_score >= MIN_SCORE && best_score - second_score >= GAP {
        Some(best)
    } else {
        None
    }
}

pub fn best_muscle_suggestion(input: &str) -> Option<&'static str> {
    best_suggestion(input, ALLOWED_MUSCLES.iter().copied())
}

/// Parses a scheduling day name into 0 = Monday .. 6 = Sunday.
pub fn parse_day_of_week(s: &str) -> Option<u8> {
    match s.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(0),
        "tue" | "tuesday" => Some(1),
        "wed" | "wednesday" => Some(2),
        "thu" | "thursday" => Some(3),
        "fri" | "friday" => Some(4),
        "sat" | "saturday" => Some(5),
        "sun" | "sunday" => Some(6),
        _ => None,
    }
}

pub fn day_name(day: u8) -> &'static str {
    match day {
        0 => "monday",
        1 => "tuesday",
        2 => "wednesday",
        3 => "thursday",
        4 => "friday",
        5 => "saturday",
        _ => "sunday",
    }
}

/// Parses a rep prescription: either a range "8-12" or a single "10".
pub fn parse_rep_range(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    if let Some((lo, hi)) = s.split_once('-') {
        let lo: u32 = lo.trim().parse().ok()?;
        let hi: u32 = hi.trim().parse().ok()?;
        if lo == 0 || hi < lo {
            return None;
        }
        Some((lo, hi))
    } else {
        let n: u32 = s.parse().ok()?;
        if n == 0 { None } else { Some((n, n)) }
    }
}

//! Pluralization service used by name resolution.
//!
//! Resolution only needs two string transforms, so the linguistic rules sit
//! behind the [`Pluralizer`] trait. The default implementation uses the
//! `inflector` crate with extra handling for irregular plurals that show up
//! in database schemas.

use inflector::Inflector;

/// Singular/plural string transform.
pub trait Pluralizer: Send + Sync + std::fmt::Debug {
    fn pluralize(&self, word: &str) -> String;

    fn singularize(&self, word: &str) -> String;
}

/// Irregular plurals that inflector doesn't handle well for table names.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("half", "halves"),
    ("analysis", "analyses"),
    ("basis", "bases"),
    ("crisis", "crises"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("medium", "media"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
];

/// [`Pluralizer`] backed by the `inflector` crate.
///
/// Output follows the case of the input when the input is entirely upper
/// case: `USER` pluralizes to `USERS`, not `users`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InflectorPluralizer;

impl Pluralizer for InflectorPluralizer {
    fn pluralize(&self, word: &str) -> String {
        transform(word, |lower| {
            for (singular, plural) in IRREGULAR_PLURALS {
                if lower == *singular || lower == *plural {
                    return plural.to_string();
                }
            }
            lower.to_plural()
        })
    }

    fn singularize(&self, word: &str) -> String {
        transform(word, |lower| {
            for (singular, plural) in IRREGULAR_PLURALS {
                if lower == *plural || lower == *singular {
                    return singular.to_string();
                }
            }
            lower.to_singular()
        })
    }
}

/// Apply `f` to the lower-cased word, then restore the original casing
/// where it can be restored unambiguously.
fn transform(word: &str, f: impl Fn(&str) -> String) -> String {
    if word.is_empty() {
        return String::new();
    }

    let lower = word.to_lowercase();
    let result = f(&lower);

    if is_upper(word) {
        return result.to_uppercase();
    }

    // Keep the original prefix (e.g. "UserProfile" -> "UserProfiles")
    let common = word
        .chars()
        .zip(result.chars())
        .take_while(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
        .count();
    let prefix: String = word.chars().take(common).collect();
    let rest: String = result.chars().skip(common).collect();
    prefix + &rest
}

fn is_upper(word: &str) -> bool {
    word.chars().any(|c| c.is_alphabetic()) && !word.chars().any(|c| c.is_lowercase())
}

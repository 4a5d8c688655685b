//! Tiered name resolution.
//!
//! A search term is compared against candidate names in four tiers:
//!
//! 1. exact, case-sensitive
//! 2. case-insensitive
//! 3. singular/plural forms, case-insensitive
//! 4. homogenised names (`_`, `-` and spaces removed, lower-cased), alone or
//!    combined with singular/plural forms
//!
//! The first tier that yields candidates decides. One candidate is a match;
//! several are ambiguous and never broken by first-match.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::inflection::{InflectorPluralizer, Pluralizer};

/// Resolution tier that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    Inflected,
    Homogenized,
}

impl MatchTier {
    pub const ALL: [MatchTier; 4] = [
        MatchTier::Exact,
        MatchTier::CaseInsensitive,
        MatchTier::Inflected,
        MatchTier::Homogenized,
    ];
}

/// Outcome of resolving one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    /// Names of the equally good candidates.
    Ambiguous(Vec<String>),
}

/// Settings that shape name resolution.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    pub pluralizer: Arc<dyn Pluralizer>,
    /// When false, tier 3 is skipped and tier 4 only compares homogenised names.
    pub pluralization: bool,
    /// Schema preferred when a table name exists in several schemas.
    pub default_schema: Option<String>,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            pluralizer: Arc::new(InflectorPluralizer),
            pluralization: true,
            default_schema: None,
        }
    }
}

impl NamingPolicy {
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = Some(schema.into());
        self
    }

    pub fn without_pluralization(mut self) -> Self {
        self.pluralization = false;
        self
    }

    /// Whether `candidate` matches `term` at `tier`.
    pub fn matches(&self, tier: MatchTier, term: &str, candidate: &str) -> bool {
        match tier {
            MatchTier::Exact => term == candidate,
            MatchTier::CaseInsensitive => term.to_lowercase() == candidate.to_lowercase(),
            MatchTier::Inflected => {
                self.pluralization
                    && self.inflected_match(&term.to_lowercase(), &candidate.to_lowercase())
            }
            MatchTier::Homogenized => {
                let (term, candidate) = (homogenize(term), homogenize(candidate));
                if term.is_empty() {
                    return false;
                }
                term == candidate || (self.pluralization && self.inflected_match(&term, &candidate))
            }
        }
    }

    fn inflected_match(&self, term: &str, candidate: &str) -> bool {
        let forms = self.forms(term);
        forms.contains(candidate) || forms.contains(&self.pluralizer.singularize(candidate))
    }

    fn forms(&self, word: &str) -> BTreeSet<String> {
        [
            word.to_string(),
            self.pluralizer.pluralize(word),
            self.pluralizer.singularize(word),
        ]
        .into_iter()
        .collect()
    }

    /// Resolve `term` against `candidates` (`(name, item)` pairs).
    ///
    /// `tie_break` gets a chance to narrow a multi-candidate tier down to one
    /// item before the tier is declared ambiguous.
    pub fn resolve<'c, T, I, F>(&self, term: &str, candidates: I, tie_break: F) -> Resolution<T>
    where
        T: Clone,
        I: IntoIterator<Item = (&'c str, T)>,
        F: Fn(&[(&'c str, T)]) -> Option<T>,
    {
        let candidates: Vec<(&str, T)> = candidates.into_iter().collect();

        for tier in MatchTier::ALL {
            let hits: Vec<(&str, T)> = candidates
                .iter()
                .filter(|(name, _)| self.matches(tier, term, name))
                .cloned()
                .collect();

            match hits.len() {
                0 => continue,
                1 => return Resolution::Found(hits[0].1.clone()),
                _ => {
                    return match tie_break(&hits) {
                        Some(item) => Resolution::Found(item),
                        None => Resolution::Ambiguous(
                            hits.iter().map(|(name, _)| name.to_string()).collect(),
                        ),
                    }
                }
            }
        }

        Resolution::NotFound
    }
}

/// Lower-case `name` and drop separators: `USER_PROFILE` and `UserProfile`
/// both become `userprofile`.
pub fn homogenize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

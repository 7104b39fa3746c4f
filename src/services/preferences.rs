//! Preference matching
//!
//! Turns the free-form preference lists stored on a user into normalized,
//! whole-token match predicates. Matching never uses regular expressions: text
//! is split into lowercase alphanumeric tokens, and a phrase matches a value
//! when its tokens appear as a contiguous run in the value's tokens. Token
//! boundaries keep "war" from matching "Warm".

use crate::db::store::MovieTermQuery;
use crate::models::{Movie, PreferenceDimension, Preferences};

/// Splits text on non-alphanumeric characters and lowercases the pieces
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A normalized preference phrase; never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Phrase {
    tokens: Vec<String>,
}

impl Phrase {
    /// Returns `None` when the text holds no alphanumeric characters
    pub fn parse(text: &str) -> Option<Self> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Whether the phrase appears as a contiguous token run inside `value`
    pub fn occurs_in(&self, value: &str) -> bool {
        let value = tokenize(value);
        value
            .windows(self.tokens.len())
            .any(|window| window == self.tokens.as_slice())
    }

    /// Longest token; any value the phrase occurs in contains it as a substring
    fn anchor(&self) -> &str {
        self.tokens
            .iter()
            .fold(&self.tokens[0], |longest, token| {
                if token.len() > longest.len() {
                    token
                } else {
                    longest
                }
            })
            .as_str()
    }
}

/// Distinct phrases for one preference dimension, in entry order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateSet {
    phrases: Vec<Phrase>,
}

impl PredicateSet {
    /// Builds the set from stored entries
    ///
    /// Each entry may be a comma-joined list; pieces are trimmed and those
    /// without any alphanumeric content are dropped.
    pub fn from_entries(entries: &[String]) -> Self {
        let mut phrases: Vec<Phrase> = Vec::new();
        for piece in entries.iter().flat_map(|entry| entry.split(',')) {
            if let Some(phrase) = Phrase::parse(piece.trim()) {
                if !phrases.contains(&phrase) {
                    phrases.push(phrase);
                }
            }
        }
        Self { phrases }
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Whether any phrase occurs in `value`
    pub fn matches(&self, value: &str) -> bool {
        self.phrases.iter().any(|phrase| phrase.occurs_in(value))
    }

    /// Whether `value` normalizes to one of the phrases
    pub fn contains(&self, value: &str) -> bool {
        let tokens = tokenize(value);
        !tokens.is_empty() && self.phrases.iter().any(|phrase| phrase.tokens == tokens)
    }

    fn anchors(&self) -> Vec<String> {
        let mut anchors: Vec<String> = Vec::new();
        for phrase in &self.phrases {
            let anchor = phrase.anchor();
            if !anchors.iter().any(|a| a == anchor) {
                anchors.push(anchor.to_string());
            }
        }
        anchors
    }
}

/// Per-dimension predicates plus the optional rating floor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPredicates {
    pub genres: PredicateSet,
    pub themes: PredicateSet,
    pub languages: PredicateSet,
    pub countries_of_origin: PredicateSet,
    pub min_rating: Option<f64>,
}

impl MatchPredicates {
    pub fn from_preferences(preferences: &Preferences) -> Self {
        Self {
            genres: PredicateSet::from_entries(&preferences.genres),
            themes: PredicateSet::from_entries(&preferences.themes),
            languages: PredicateSet::from_entries(&preferences.languages),
            countries_of_origin: PredicateSet::from_entries(&preferences.countries_of_origin),
            min_rating: preferences.min_rating,
        }
    }

    pub fn set(&self, dimension: PreferenceDimension) -> &PredicateSet {
        match dimension {
            PreferenceDimension::Genres => &self.genres,
            PreferenceDimension::Themes => &self.themes,
            PreferenceDimension::Languages => &self.languages,
            PreferenceDimension::CountriesOfOrigin => &self.countries_of_origin,
        }
    }

    /// True when no dimension has a phrase. The rating floor does not count.
    pub fn is_empty(&self) -> bool {
        PreferenceDimension::ALL
            .iter()
            .all(|dimension| self.set(*dimension).is_empty())
    }

    /// Whether any dimension of the movie matches a phrase of that dimension
    pub fn matches_movie(&self, movie: &Movie) -> bool {
        PreferenceDimension::ALL.iter().any(|dimension| {
            let set = self.set(*dimension);
            dimension.values(movie).iter().any(|value| set.matches(value))
        })
    }

    /// Coarse store query admitting at least every movie [`matches_movie`]
    /// accepts
    ///
    /// [`matches_movie`]: MatchPredicates::matches_movie
    pub fn term_query(&self) -> MovieTermQuery {
        let mut query = MovieTermQuery::default();
        for dimension in PreferenceDimension::ALL {
            *query.terms_mut(dimension) = self.set(dimension).anchors();
        }
        query
    }
}

use serde::{Deserialize, Serialize};

use super::Movie;

/// One of the four multi-valued movie attributes a user can express a preference for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferenceDimension {
    Genres,
    Themes,
    Languages,
    CountriesOfOrigin,
}

impl PreferenceDimension {
    /// Every dimension, in the order scoring visits them
    pub const ALL: [PreferenceDimension; 4] = [
        PreferenceDimension::Genres,
        PreferenceDimension::Themes,
        PreferenceDimension::Languages,
        PreferenceDimension::CountriesOfOrigin,
    ];

    /// The movie's values for this dimension
    pub fn values<'a>(&self, movie: &'a Movie) -> &'a [String] {
        match self {
            PreferenceDimension::Genres => &movie.genres,
            PreferenceDimension::Themes => &movie.themes,
            PreferenceDimension::Languages => &movie.languages,
            PreferenceDimension::CountriesOfOrigin => &movie.countries_of_origin,
        }
    }
}

/// Free-form preferences stored on a user
///
/// Entries are stored as the user typed them; a single entry may hold a
/// comma-separated list (e.g. `"Comedy, Drama"`). Normalization happens in the
/// preference matcher, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub languages: Vec<String>,
    pub countries_of_origin: Vec<String>,
    pub min_rating: Option<f64>,
}

impl Preferences {
    /// Raw entries for one dimension
    pub fn entries(&self, dimension: PreferenceDimension) -> &[String] {
        match dimension {
            PreferenceDimension::Genres => &self.genres,
            PreferenceDimension::Themes => &self.themes,
            PreferenceDimension::Languages => &self.languages,
            PreferenceDimension::CountriesOfOrigin => &self.countries_of_origin,
        }
    }
}

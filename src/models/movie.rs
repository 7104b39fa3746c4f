use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PersonKind;

/// Content advisory flags attached to a movie
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentAdvisory {
    pub violence: bool,
    pub vulgar_language: bool,
    pub sexual_content: bool,
    pub drug_use: bool,
}

/// A movie in the catalog
///
/// Every multi-valued attribute is an ordered list of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub year: Option<i32>,
    pub directors: Vec<Uuid>,
    pub actors: Vec<Uuid>,
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub languages: Vec<String>,
    pub countries_of_origin: Vec<String>,
    /// Minimum viewer age; absent means unrestricted
    pub age_restriction: Option<i32>,
    pub content_advisory: ContentAdvisory,
    /// Rating on a 0-10 scale
    pub rating: Option<f64>,
    /// Free-form runtime such as `"2h 15m"`
    pub duration: Option<String>,
    pub plot: Option<String>,
    pub available_on: Vec<String>,
    pub poster: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Movie {
    /// Age restriction with the unrestricted default applied
    pub fn minimum_age(&self) -> i32 {
        self.age_restriction.unwrap_or(0)
    }

    /// Credited people of the given kind
    pub fn credits(&self, kind: PersonKind) -> &[Uuid] {
        match kind {
            PersonKind::Actor => &self.actors,
            PersonKind::Director => &self.directors,
        }
    }

    pub fn credits_mut(&mut self, kind: PersonKind) -> &mut Vec<Uuid> {
        match kind {
            PersonKind::Actor => &mut self.actors,
            PersonKind::Director => &mut self.directors,
        }
    }
}

/// The movie fields shown when a suggestion is expanded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: Uuid,
    pub poster: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub duration: Option<String>,
    pub rating: Option<f64>,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            poster: movie.poster.clone(),
            title: movie.title.clone(),
            year: movie.year,
            duration: movie.duration.clone(),
            rating: movie.rating,
        }
    }
}

/// Payload for creating a movie
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewMovie {
    pub title: String,
    pub year: Option<i32>,
    pub directors: Vec<Uuid>,
    pub actors: Vec<Uuid>,
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub languages: Vec<String>,
    pub countries_of_origin: Vec<String>,
    pub age_restriction: Option<i32>,
    pub content_advisory: ContentAdvisory,
    pub rating: Option<f64>,
    pub duration: Option<String>,
    pub plot: Option<String>,
    pub available_on: Vec<String>,
    pub poster: Option<String>,
}

impl NewMovie {
    /// Checks field ranges, returning a message describing the first violation
    pub fn validate(&self) -> Result<(), String> {
        check_ranges(&self.title, self.year, self.age_restriction, self.rating)
    }

    pub fn into_movie(self, now: DateTime<Utc>) -> Movie {
        Movie {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            year: self.year,
            directors: dedup_ids(self.directors),
            actors: dedup_ids(self.actors),
            genres: self.genres,
            themes: self.themes,
            languages: self.languages,
            countries_of_origin: self.countries_of_origin,
            age_restriction: self.age_restriction,
            content_advisory: self.content_advisory,
            rating: self.rating,
            duration: self.duration,
            plot: self.plot,
            available_on: self.available_on,
            poster: self.poster,
            created_at: now,
            last_modified: now,
        }
    }
}

/// Partial movie update; absent fields keep their stored value
///
/// Credits are not edited here. They follow actor and director creation and
/// deletion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub themes: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
    pub countries_of_origin: Option<Vec<String>>,
    pub age_restriction: Option<i32>,
    pub content_advisory: Option<ContentAdvisory>,
    pub rating: Option<f64>,
    pub duration: Option<String>,
    pub plot: Option<String>,
    pub available_on: Option<Vec<String>>,
    pub poster: Option<String>,
}

impl MovieChanges {
    /// Applies the changes and re-checks the resulting movie
    pub fn apply(self, mut movie: Movie, now: DateTime<Utc>) -> Result<Movie, String> {
        if let Some(title) = self.title {
            movie.title = title.trim().to_string();
        }
        if self.year.is_some() {
            movie.year = self.year;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
        if let Some(themes) = self.themes {
            movie.themes = themes;
        }
        if let Some(languages) = self.languages {
            movie.languages = languages;
        }
        if let Some(countries) = self.countries_of_origin {
            movie.countries_of_origin = countries;
        }
        if self.age_restriction.is_some() {
            movie.age_restriction = self.age_restriction;
        }
        if let Some(advisory) = self.content_advisory {
            movie.content_advisory = advisory;
        }
        if self.rating.is_some() {
            movie.rating = self.rating;
        }
        if self.duration.is_some() {
            movie.duration = self.duration;
        }
        if self.plot.is_some() {
            movie.plot = self.plot;
        }
        if let Some(available_on) = self.available_on {
            movie.available_on = available_on;
        }
        if self.poster.is_some() {
            movie.poster = self.poster;
        }

        check_ranges(&movie.title, movie.year, movie.age_restriction, movie.rating)?;
        movie.last_modified = now;
        Ok(movie)
    }
}

fn check_ranges(
    title: &str,
    year: Option<i32>,
    age_restriction: Option<i32>,
    rating: Option<f64>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Movie title is required.".to_string());
    }
    if let Some(year) = year {
        if year < 0 || year > Utc::now().year() {
            return Err(format!("{} is not a valid year.", year));
        }
    }
    if let Some(age) = age_restriction {
        if !(1..=21).contains(&age) {
            return Err(format!("{} is not a valid age.", age));
        }
    }
    if let Some(rating) = rating {
        if !(0.0..=10.0).contains(&rating) {
            return Err(format!("{} is not a valid rating.", rating));
        }
    }
    Ok(())
}

pub(crate) fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

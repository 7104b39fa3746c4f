use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use super::movie::dedup_ids;

/// Which credit collection a person belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Actor,
    Director,
}

impl PersonKind {
    /// Table holding people of this kind; also the name of the movie column
    /// listing them
    pub fn collection(&self) -> &'static str {
        match self {
            PersonKind::Actor => "actors",
            PersonKind::Director => "directors",
        }
    }
}

impl Display for PersonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersonKind::Actor => write!(f, "Actor"),
            PersonKind::Director => write!(f, "Director"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub award_name: String,
    #[serde(default)]
    pub year: Option<i32>,
}

/// An actor or director
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub nationality: Vec<String>,
    pub awards: Vec<Award>,
    /// Movies this person is credited on
    pub movies: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPerson {
    pub name: String,
    pub bio: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub nationality: Vec<String>,
    pub awards: Vec<Award>,
    pub movies: Vec<Uuid>,
}

impl NewPerson {
    pub fn into_person(self, kind: PersonKind, now: DateTime<Utc>) -> Result<Person, String> {
        let person = Person {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            bio: self.bio,
            birthdate: self.birthdate,
            nationality: self.nationality,
            awards: self.awards,
            movies: dedup_ids(self.movies),
            created_at: now,
            last_modified: now,
        };
        check_person(kind, &person, now)?;
        Ok(person)
    }
}

/// Partial actor or director update; absent fields keep their stored value
///
/// The credited movies are not edited here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonChanges {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub nationality: Option<Vec<String>>,
    pub awards: Option<Vec<Award>>,
}

impl PersonChanges {
    pub fn apply(
        self,
        kind: PersonKind,
        mut person: Person,
        now: DateTime<Utc>,
    ) -> Result<Person, String> {
        if let Some(name) = self.name {
            person.name = name.trim().to_string();
        }
        if self.bio.is_some() {
            person.bio = self.bio;
        }
        if self.birthdate.is_some() {
            person.birthdate = self.birthdate;
        }
        if let Some(nationality) = self.nationality {
            person.nationality = nationality;
        }
        if let Some(awards) = self.awards {
            person.awards = awards;
        }

        check_person(kind, &person, now)?;
        person.last_modified = now;
        Ok(person)
    }
}

fn check_person(kind: PersonKind, person: &Person, now: DateTime<Utc>) -> Result<(), String> {
    if person.name.is_empty() {
        return Err(format!("{} name is required.", kind));
    }
    // Actors must carry a birthdate, directors may omit it
    if kind == PersonKind::Actor && person.birthdate.is_none() {
        return Err("Birthdate is required.".to_string());
    }
    if let Some(birthdate) = person.birthdate {
        if birthdate >= now.date_naive() {
            return Err(format!("{} is not a valid birthdate!", birthdate));
        }
    }
    if let Some(bio) = &person.bio {
        if bio.chars().count() > 500 {
            return Err("Biography must be 500 characters or fewer.".to_string());
        }
    }
    if let Some(award) = person
        .awards
        .iter()
        .find(|a| a.year.is_some_and(|y| y < 0 || y > now.year()))
    {
        return Err(format!("{:?} is not a valid year.", award.year));
    }
    Ok(())
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Preferences;

/// Users younger than this cannot sign up
pub const MINIMUM_SIGNUP_AGE: u32 = 8;

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub birthdate: NaiveDate,
    pub preferences: Preferences,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl User {
    /// Age in whole years on the given day
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        today.years_since(self.birthdate).unwrap_or(0)
    }

    /// Age in whole years today (UTC)
    pub fn age(&self) -> u32 {
        self.age_on(Utc::now().date_naive())
    }
}

/// Signup payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub birthdate: Option<NaiveDate>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub is_admin: bool,
}

impl NewUser {
    /// Validates the signup payload and builds the user
    pub fn into_user(self, now: DateTime<Utc>) -> Result<User, String> {
        let birthdate = self
            .birthdate
            .ok_or_else(|| "Birthdate is required.".to_string())?;
        if !self.email.contains('@') {
            return Err(format!("{} is not a valid email address.", self.email));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            bio: self.bio,
            birthdate,
            preferences: self.preferences,
            is_admin: self.is_admin,
            created_at: now,
            last_modified: now,
        };
        check_profile(&user, now)?;
        Ok(user)
    }
}

/// Profile edit; absent fields keep their stored value
///
/// Email, preferences and the admin flag are not changed here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl ProfileChanges {
    pub fn apply(self, mut user: User, now: DateTime<Utc>) -> Result<User, String> {
        if let Some(name) = self.name {
            user.name = name.trim().to_string();
        }
        if self.bio.is_some() {
            user.bio = self.bio;
        }
        if let Some(birthdate) = self.birthdate {
            user.birthdate = birthdate;
        }

        check_profile(&user, now)?;
        user.last_modified = now;
        Ok(user)
    }
}

fn check_profile(user: &User, now: DateTime<Utc>) -> Result<(), String> {
    if user.name.is_empty() {
        return Err("Name is required.".to_string());
    }
    if let Some(bio) = &user.bio {
        if bio.chars().count() > 200 {
            return Err("Biography must be 200 characters or fewer.".to_string());
        }
    }
    if user.birthdate >= now.date_naive() {
        return Err("Birthdate must be in the past.".to_string());
    }
    if user.age_on(now.date_naive()) < MINIMUM_SIGNUP_AGE {
        return Err(format!(
            "You should be older than {} years old to create an account!",
            MINIMUM_SIGNUP_AGE
        ));
    }
    Ok(())
}

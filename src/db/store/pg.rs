use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{EntityStore, MovieFilter, MovieTermQuery, Reference, StoreTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{
        Award, ContentAdvisory, Movie, Person, PersonKind, Preferences, Review, Suggestion,
        SuggestionStatus, UnknownVariant, User,
    },
};

/// Postgres-backed entity store
#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_error(err: UnknownVariant) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

/// Escapes `LIKE` wildcards in user input
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn reference_column(reference: Reference) -> (&'static str, Uuid) {
    match reference {
        Reference::User(id) => ("user_id", id),
        Reference::Movie(id) => ("movie_id", id),
    }
}

fn movie_from_row(row: &PgRow) -> Result<Movie, sqlx::Error> {
    Ok(Movie {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        directors: row.try_get("directors")?,
        actors: row.try_get("actors")?,
        genres: row.try_get("genres")?,
        themes: row.try_get("themes")?,
        languages: row.try_get("languages")?,
        countries_of_origin: row.try_get("countries_of_origin")?,
        age_restriction: row.try_get("age_restriction")?,
        content_advisory: ContentAdvisory {
            violence: row.try_get("violence")?,
            vulgar_language: row.try_get("vulgar_language")?,
            sexual_content: row.try_get("sexual_content")?,
            drug_use: row.try_get("drug_use")?,
        },
        rating: row.try_get("rating")?,
        duration: row.try_get("duration")?,
        plot: row.try_get("plot")?,
        available_on: row.try_get("available_on")?,
        poster: row.try_get("poster")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        bio: row.try_get("bio")?,
        birthdate: row.try_get("birthdate")?,
        preferences: Preferences {
            genres: row.try_get("pref_genres")?,
            themes: row.try_get("pref_themes")?,
            languages: row.try_get("pref_languages")?,
            countries_of_origin: row.try_get("pref_countries_of_origin")?,
            min_rating: row.try_get("pref_min_rating")?,
        },
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}

fn person_from_row(row: &PgRow) -> Result<Person, sqlx::Error> {
    let awards: Json<Vec<Award>> = row.try_get("awards")?;
    Ok(Person {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        bio: row.try_get("bio")?,
        birthdate: row.try_get("birthdate")?,
        nationality: row.try_get("nationality")?,
        awards: awards.0,
        movies: row.try_get("movies")?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Review {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        movie_id: row.try_get("movie_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        status: status.parse().map_err(decode_error)?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}

fn suggestion_from_row(row: &PgRow) -> Result<Suggestion, sqlx::Error> {
    let relevance: String = row.try_get("relevance")?;
    let status: String = row.try_get("status")?;
    Ok(Suggestion {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        movie_id: row.try_get("movie_id")?,
        suggested_because: row.try_get("suggested_because")?,
        relevance: relevance.parse().map_err(decode_error)?,
        status: status.parse().map_err(decode_error)?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}

fn collect<T>(
    rows: Vec<PgRow>,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> AppResult<Vec<T>> {
    Ok(rows.iter().map(decode).collect::<Result<Vec<_>, _>>()?)
}

#[async_trait::async_trait]
impl EntityStore for PgEntityStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, bio, birthdate,
                pref_genres, pref_themes, pref_languages, pref_countries_of_origin, pref_min_rating,
                is_admin, created_at, last_modified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.bio)
        .bind(user.birthdate)
        .bind(&user.preferences.genres)
        .bind(&user.preferences.themes)
        .bind(&user.preferences.languages)
        .bind(&user.preferences.countries_of_origin)
        .bind(user.preferences.min_rating)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.last_modified)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::Conflict(format!("{} is already registered.", user.email)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        collect(rows, user_from_row)
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        preferences: &Preferences,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET pref_genres = $2, pref_themes = $3, pref_languages = $4,
                pref_countries_of_origin = $5, pref_min_rating = $6, last_modified = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&preferences.genres)
        .bind(&preferences.themes)
        .bind(&preferences.languages)
        .bind(&preferences.countries_of_origin)
        .bind(preferences.min_rating)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn update_user(&self, user: &User) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, bio = $3, birthdate = $4, last_modified = $5 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.bio)
        .bind(user.birthdate)
        .bind(user.last_modified)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_movie(&self, movie: &Movie) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO movies (
                id, title, year, directors, actors, genres, themes, languages,
                countries_of_origin, age_restriction, violence, vulgar_language,
                sexual_content, drug_use, rating, duration, plot, available_on, poster,
                created_at, last_modified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(movie.year)
        .bind(&movie.directors)
        .bind(&movie.actors)
        .bind(&movie.genres)
        .bind(&movie.themes)
        .bind(&movie.languages)
        .bind(&movie.countries_of_origin)
        .bind(movie.age_restriction)
        .bind(movie.content_advisory.violence)
        .bind(movie.content_advisory.vulgar_language)
        .bind(movie.content_advisory.sexual_content)
        .bind(movie.content_advisory.drug_use)
        .bind(movie.rating)
        .bind(&movie.duration)
        .bind(&movie.plot)
        .bind(&movie.available_on)
        .bind(&movie.poster)
        .bind(movie.created_at)
        .bind(movie.last_modified)
        .execute(&mut *tx)
        .await?;

        for kind in [PersonKind::Actor, PersonKind::Director] {
            let credits = movie.credits(kind);
            if credits.is_empty() {
                continue;
            }
            let sql = format!(
                "UPDATE {} SET movies = array_append(movies, $1), last_modified = NOW() \
                 WHERE id = ANY($2) AND NOT ($1 = ANY(movies))",
                kind.collection()
            );
            sqlx::query(&sql)
                .bind(movie.id)
                .bind(credits)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_movie(&self, id: Uuid) -> AppResult<Option<Movie>> {
        let row = sqlx::query("SELECT * FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(movie_from_row).transpose()?)
    }

    async fn find_movies(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM movies WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, movie_from_row)
    }

    async fn list_movies(&self, filter: &MovieFilter) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM movies
            WHERE (cardinality($1::text[]) = 0 OR genres && $1::text[])
              AND (NOT $2 OR violence)
              AND (NOT $3 OR vulgar_language)
              AND (NOT $4 OR sexual_content)
              AND (NOT $5 OR drug_use)
            ORDER BY title, id
            "#,
        )
        .bind(&filter.genres)
        .bind(filter.advisory.violence)
        .bind(filter.advisory.vulgar_language)
        .bind(filter.advisory.sexual_content)
        .bind(filter.advisory.drug_use)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, movie_from_row)
    }

    async fn search_movies(&self, title: &str) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query("SELECT * FROM movies WHERE title ILIKE $1 ORDER BY title, id")
            .bind(format!("%{}%", escape_like(title)))
            .fetch_all(&self.pool)
            .await?;
        collect(rows, movie_from_row)
    }

    async fn update_movie(&self, movie: &Movie) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE movies
            SET title = $2, year = $3, genres = $4, themes = $5, languages = $6,
                countries_of_origin = $7, age_restriction = $8, violence = $9,
                vulgar_language = $10, sexual_content = $11, drug_use = $12, rating = $13,
                duration = $14, plot = $15, available_on = $16, poster = $17,
                last_modified = $18
            WHERE id = $1
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(movie.year)
        .bind(&movie.genres)
        .bind(&movie.themes)
        .bind(&movie.languages)
        .bind(&movie.countries_of_origin)
        .bind(movie.age_restriction)
        .bind(movie.content_advisory.violence)
        .bind(movie.content_advisory.vulgar_language)
        .bind(movie.content_advisory.sexual_content)
        .bind(movie.content_advisory.drug_use)
        .bind(movie.rating)
        .bind(&movie.duration)
        .bind(&movie.plot)
        .bind(&movie.available_on)
        .bind(&movie.poster)
        .bind(movie.last_modified)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_movies_by_terms(&self, query: &MovieTermQuery) -> AppResult<Vec<Movie>> {
        // Terms are lowercase alphanumeric tokens, so they carry no LIKE wildcards
        let rows = sqlx::query(
            r#"
            SELECT * FROM movies m
            WHERE EXISTS (
                    SELECT 1 FROM unnest(m.genres) v, unnest($1::text[]) t
                    WHERE lower(v) LIKE '%' || t || '%')
               OR EXISTS (
                    SELECT 1 FROM unnest(m.themes) v, unnest($2::text[]) t
                    WHERE lower(v) LIKE '%' || t || '%')
               OR EXISTS (
                    SELECT 1 FROM unnest(m.languages) v, unnest($3::text[]) t
                    WHERE lower(v) LIKE '%' || t || '%')
               OR EXISTS (
                    SELECT 1 FROM unnest(m.countries_of_origin) v, unnest($4::text[]) t
                    WHERE lower(v) LIKE '%' || t || '%')
            ORDER BY m.title, m.id
            "#,
        )
        .bind(&query.genres)
        .bind(&query.themes)
        .bind(&query.languages)
        .bind(&query.countries_of_origin)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, movie_from_row)
    }

    async fn sample_movies(&self, size: usize) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query("SELECT * FROM movies ORDER BY random() LIMIT $1")
            .bind(size as i64)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, movie_from_row)
    }

    async fn insert_person(&self, kind: PersonKind, person: &Person) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            "INSERT INTO {} (id, name, bio, birthdate, nationality, awards, movies, \
             created_at, last_modified) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            kind.collection()
        );
        sqlx::query(&insert)
            .bind(person.id)
            .bind(&person.name)
            .bind(&person.bio)
            .bind(person.birthdate)
            .bind(&person.nationality)
            .bind(Json(&person.awards))
            .bind(&person.movies)
            .bind(person.created_at)
            .bind(person.last_modified)
            .execute(&mut *tx)
            .await?;

        if !person.movies.is_empty() {
            let column = kind.collection();
            let link = format!(
                "UPDATE movies SET {column} = array_append({column}, $1), last_modified = NOW() \
                 WHERE id = ANY($2) AND NOT ($1 = ANY({column}))"
            );
            sqlx::query(&link)
                .bind(person.id)
                .bind(&person.movies)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_person(&self, kind: PersonKind, id: Uuid) -> AppResult<Option<Person>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", kind.collection());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(person_from_row).transpose()?)
    }

    async fn find_people(&self, kind: PersonKind, ids: &[Uuid]) -> AppResult<Vec<Person>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM {} WHERE id = ANY($1) ORDER BY name, id",
            kind.collection()
        );
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;
        collect(rows, person_from_row)
    }

    async fn list_people(&self, kind: PersonKind) -> AppResult<Vec<Person>> {
        let sql = format!("SELECT * FROM {} ORDER BY name, id", kind.collection());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect(rows, person_from_row)
    }

    async fn update_person(&self, kind: PersonKind, person: &Person) -> AppResult<bool> {
        let sql = format!(
            "UPDATE {} SET name = $2, bio = $3, birthdate = $4, nationality = $5, awards = $6, \
             last_modified = $7 WHERE id = $1",
            kind.collection()
        );
        let result = sqlx::query(&sql)
            .bind(person.id)
            .bind(&person.name)
            .bind(&person.bio)
            .bind(person.birthdate)
            .bind(&person.nationality)
            .bind(Json(&person.awards))
            .bind(person.last_modified)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_people(&self, kind: PersonKind, name: &str) -> AppResult<Vec<Person>> {
        let sql = format!(
            "SELECT * FROM {} WHERE name ILIKE $1 ORDER BY name, id",
            kind.collection()
        );
        let rows = sqlx::query(&sql)
            .bind(format!("%{}%", escape_like(name)))
            .fetch_all(&self.pool)
            .await?;
        collect(rows, person_from_row)
    }

    async fn insert_review(&self, review: &Review) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (id, user_id, movie_id, rating, comment, status, created_at, last_modified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.movie_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.status.as_str())
        .bind(review.created_at)
        .bind(review.last_modified)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(
                AppError::NotFound("User or movie not found.".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(review_from_row).transpose()?)
    }

    async fn list_reviews(&self) -> AppResult<Vec<Review>> {
        let rows = sqlx::query("SELECT * FROM reviews ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        collect(rows, review_from_row)
    }

    async fn reviews_for(&self, reference: Reference) -> AppResult<Vec<Review>> {
        let (column, id) = reference_column(reference);
        let sql = format!("SELECT * FROM reviews WHERE {column} = $1 ORDER BY created_at, id");
        let rows = sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?;
        collect(rows, review_from_row)
    }

    async fn update_review(&self, review: &Review) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reviews
            SET rating = $2, comment = $3, status = $4, last_modified = $5
            WHERE id = $1
            "#,
        )
        .bind(review.id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.status.as_str())
        .bind(review.last_modified)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        let row = sqlx::query("DELETE FROM reviews WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(review_from_row).transpose()?)
    }

    async fn suggestions_for_user(&self, user_id: Uuid) -> AppResult<Vec<Suggestion>> {
        let rows =
            sqlx::query("SELECT * FROM suggestions WHERE user_id = $1 ORDER BY created_at, id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        collect(rows, suggestion_from_row)
    }

    async fn suggested_movie_ids(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT movie_id FROM suggestions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn find_suggestion(&self, id: Uuid) -> AppResult<Option<Suggestion>> {
        let row = sqlx::query("SELECT * FROM suggestions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(suggestion_from_row).transpose()?)
    }

    async fn insert_suggestions(&self, suggestions: &[Suggestion]) -> AppResult<u64> {
        if suggestions.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = suggestions.iter().map(|s| s.id).collect();
        let user_ids: Vec<Uuid> = suggestions.iter().map(|s| s.user_id).collect();
        let movie_ids: Vec<Uuid> = suggestions.iter().map(|s| s.movie_id).collect();
        let reasons: Vec<String> = suggestions
            .iter()
            .map(|s| s.suggested_because.clone())
            .collect();
        let relevance: Vec<String> = suggestions
            .iter()
            .map(|s| s.relevance.as_str().to_string())
            .collect();
        let statuses: Vec<String> = suggestions
            .iter()
            .map(|s| s.status.as_str().to_string())
            .collect();
        let created: Vec<DateTime<Utc>> = suggestions.iter().map(|s| s.created_at).collect();
        let modified: Vec<DateTime<Utc>> = suggestions.iter().map(|s| s.last_modified).collect();

        // A user or movie deleted between the existence filter and the
        // foreign key check fails the statement once; the rerun skips the row.
        for attempt in 1..=2 {
            let result = sqlx::query(
                r#"
                INSERT INTO suggestions (
                    id, user_id, movie_id, suggested_because, relevance, status,
                    created_at, last_modified
                )
                SELECT s.* FROM UNNEST(
                    $1::uuid[], $2::uuid[], $3::uuid[], $4::text[], $5::text[], $6::text[],
                    $7::timestamptz[], $8::timestamptz[]
                ) AS s(id, user_id, movie_id, suggested_because, relevance, status,
                       created_at, last_modified)
                WHERE EXISTS (SELECT 1 FROM users u WHERE u.id = s.user_id)
                  AND EXISTS (SELECT 1 FROM movies m WHERE m.id = s.movie_id)
                ON CONFLICT (user_id, movie_id) DO NOTHING
                "#,
            )
            .bind(&ids)
            .bind(&user_ids)
            .bind(&movie_ids)
            .bind(&reasons)
            .bind(&relevance)
            .bind(&statuses)
            .bind(&created)
            .bind(&modified)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => return Ok(done.rows_affected()),
                Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() && attempt == 1 => {
                    tracing::warn!(
                        error = %db,
                        "Suggestion references were deleted during the insert, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(
            "Suggestion insert kept hitting deleted references".to_string(),
        ))
    }

    async fn update_suggestion_status(
        &self,
        id: Uuid,
        status: SuggestionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Suggestion>> {
        let row = sqlx::query(
            "UPDATE suggestions SET status = $2, last_modified = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(suggestion_from_row).transpose()?)
    }

    async fn delete_suggestion(&self, id: Uuid) -> AppResult<Option<Suggestion>> {
        let row = sqlx::query("DELETE FROM suggestions WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(suggestion_from_row).transpose()?)
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Locks, in id order, every person of `kind` credited on the movie bound to `$1`
fn lock_credited_sql(kind: PersonKind) -> String {
    format!(
        "SELECT id FROM {} WHERE $1 = ANY(movies) ORDER BY id FOR UPDATE",
        kind.collection()
    )
}

/// A Postgres transaction; rolled back by sqlx when dropped uncommitted
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_movie(&mut self, id: Uuid) -> AppResult<Option<Movie>> {
        // People before the movie: the order the person cascade locks in
        for kind in [PersonKind::Actor, PersonKind::Director] {
            sqlx::query(&lock_credited_sql(kind))
                .bind(id)
                .fetch_all(&mut *self.tx)
                .await?;
        }

        let row = sqlx::query("SELECT * FROM movies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(movie_from_row).transpose()?)
    }

    async fn lock_user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn lock_person(&mut self, kind: PersonKind, id: Uuid) -> AppResult<Option<Person>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", kind.collection());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(person_from_row).transpose()?)
    }

    async fn pull_movie_from_people(
        &mut self,
        kind: PersonKind,
        movie_id: Uuid,
    ) -> AppResult<u64> {
        let sql = format!(
            "UPDATE {} SET movies = array_remove(movies, $1), last_modified = NOW() \
             WHERE $1 = ANY(movies)",
            kind.collection()
        );
        let result = sqlx::query(&sql)
            .bind(movie_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pull_person_from_movies(
        &mut self,
        kind: PersonKind,
        person_id: Uuid,
    ) -> AppResult<u64> {
        let column = kind.collection();
        let sql = format!(
            "UPDATE movies SET {column} = array_remove({column}, $1), last_modified = NOW() \
             WHERE $1 = ANY({column})"
        );
        let result = sqlx::query(&sql)
            .bind(person_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_reviews(&mut self, reference: Reference) -> AppResult<u64> {
        let (column, id) = reference_column(reference);
        let sql = format!("DELETE FROM reviews WHERE {column} = $1");
        let result = sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn delete_suggestions(&mut self, reference: Reference) -> AppResult<u64> {
        let (column, id) = reference_column(reference);
        let sql = format!("DELETE FROM suggestions WHERE {column} = $1");
        let result = sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn delete_movie(&mut self, id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_user(&mut self, id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_person(&mut self, kind: PersonKind, id: Uuid) -> AppResult<u64> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.collection());
        let result = sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

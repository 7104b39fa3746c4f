use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use cinelog_api::db::MemoryEntityStore;
use cinelog_api::routes::{create_router, AppState};

fn create_test_server() -> TestServer {
    let state = AppState::new(Arc::new(MemoryEntityStore::new()));
    let app = create_router(Arc::new(state));
    TestServer::new(app).unwrap()
}

async fn create_user(server: &TestServer, email: &str, genres: &[&str]) -> String {
    let response = server
        .post("/api/v1/users")
        .json(&json!({
            "name": "Robin",
            "email": email,
            "birthdate": "1990-04-12",
            "preferences": { "genres": genres }
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn create_movie(server: &TestServer, body: Value) -> String {
    let response = server.post("/api/v1/movies").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn create_actor(server: &TestServer, name: &str) -> String {
    let response = server
        .post("/api/v1/actors")
        .json(&json!({ "name": name, "birthdate": "1970-01-01" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let server = create_test_server();

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-me"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-me");

    let response = server.get("/health").await;
    let generated = response.header("x-request-id");
    assert!(uuid::Uuid::parse_str(generated.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_signup_rules() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/users")
        .json(&json!({ "name": "Kid", "email": "kid@example.com", "birthdate": "2023-01-01" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "validation");

    let response = server
        .post("/api/v1/users")
        .json(&json!({ "name": "NoDate", "email": "nodate@example.com" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    create_user(&server, "robin@example.com", &[]).await;
    let response = server
        .post("/api/v1/users")
        .json(&json!({ "name": "Twin", "email": "Robin@Example.com", "birthdate": "1990-04-12" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_user_response_includes_age() {
    let server = create_test_server();
    let id = create_user(&server, "robin@example.com", &[]).await;

    let response = server.get(&format!("/api/v1/users/{}", id)).await;
    response.assert_status_ok();
    let user: Value = response.json();
    assert_eq!(user["email"], "robin@example.com");
    assert!(user["age"].as_u64().unwrap() >= 30);
}

#[tokio::test]
async fn test_movie_create_links_actor_and_filters() {
    let server = create_test_server();
    let actor = create_actor(&server, "Bill Murray").await;
    let movie = create_movie(
        &server,
        json!({
            "title": "Lost in Translation",
            "year": 2003,
            "genres": ["Comedy", "Drama"],
            "actors": [actor],
            "contentAdvisory": { "vulgarLanguage": true }
        }),
    )
    .await;
    create_movie(&server, json!({ "title": "Heat", "genres": ["Crime"] })).await;

    let response = server.get(&format!("/api/v1/actors/{}/movies", actor)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Vec<String>>(), vec!["Lost in Translation"]);

    let response = server
        .get(&format!("/api/v1/movies/{}/actors", movie))
        .await;
    let actors: Vec<Value> = response.json();
    assert_eq!(actors[0]["name"], "Bill Murray");

    let response = server
        .get("/api/v1/movies")
        .add_query_param("genres", "Drama,Crime")
        .await;
    assert_eq!(response.json::<Vec<Value>>().len(), 2);

    let response = server
        .get("/api/v1/movies")
        .add_query_param("vulgarLanguage", "true")
        .await;
    let movies: Vec<Value> = response.json();
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0]["title"], "Lost in Translation");

    let response = server
        .get("/api/v1/movies/search")
        .add_query_param("title", "translation")
        .await;
    assert_eq!(response.json::<Vec<Value>>().len(), 1);
}

#[tokio::test]
async fn test_movie_validation_and_lookup_errors() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/movies")
        .json(&json!({ "title": "Future", "rating": 11 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/movies")
        .json(&json!({ "title": "Ghost Cast", "actors": [uuid::Uuid::new_v4()] }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/v1/movies/not-a-uuid").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get(&format!("/api/v1/movies/{}", uuid::Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "not_found");
}

#[tokio::test]
async fn test_generate_and_list_suggestions() {
    let server = create_test_server();
    let user = create_user(&server, "robin@example.com", &["Comedy"]).await;
    create_movie(
        &server,
        json!({
            "title": "Groundhog Day",
            "year": 1993,
            "genres": ["Comedy", "Fantasy"],
            "rating": 8.0,
            "duration": "1h 41m",
            "poster": "https://example.com/groundhog.jpg"
        }),
    )
    .await;
    create_movie(&server, json!({ "title": "Heat", "genres": ["Crime"] })).await;

    let response = server
        .post("/api/v1/suggestions/generate")
        .json(&json!({ "userId": user }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let outcome: Value = response.json();
    assert_eq!(outcome["written"], 1);
    assert_eq!(outcome["coldStart"], false);

    let response = server
        .get("/api/v1/suggestions")
        .add_query_param("userId", &user)
        .await;
    response.assert_status_ok();
    let suggestions: Vec<Value> = response.json();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["movieId"]["title"], "Groundhog Day");
    assert_eq!(suggestions[0]["movieId"]["duration"], "1h 41m");
    assert_eq!(suggestions[0]["relevance"], "Minimally Relevant");
    assert_eq!(suggestions[0]["status"], "no-response");
    assert_eq!(
        suggestions[0]["suggestedBecause"],
        "Suggested because your preferences contain: Comedy"
    );

    // A second run has nothing new to write
    let response = server
        .post("/api/v1/suggestions/generate")
        .json(&json!({ "userId": user }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["written"], 0);
}

#[tokio::test]
async fn test_generate_requires_known_user() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/suggestions/generate")
        .json(&json!({}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "User ID is required.");

    let response = server
        .post("/api/v1/suggestions/generate")
        .json(&json!({ "userId": uuid::Uuid::new_v4() }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_suggestion_status_workflow() {
    let server = create_test_server();
    let user = create_user(&server, "robin@example.com", &["Comedy"]).await;
    create_movie(&server, json!({ "title": "Tootsie", "genres": ["Comedy"] })).await;
    server
        .post("/api/v1/suggestions/generate")
        .json(&json!({ "userId": user }))
        .await
        .assert_status(StatusCode::CREATED);

    let suggestions: Vec<Value> = server
        .get("/api/v1/suggestions")
        .add_query_param("userId", &user)
        .await
        .json();
    let id = suggestions[0]["id"].as_str().unwrap().to_string();

    let response = server
        .put(&format!("/api/v1/suggestions/{}", id))
        .json(&json!({ "status": "dismissed" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "dismissed");

    let response = server
        .put(&format!("/api/v1/suggestions/{}", id))
        .json(&json!({ "status": "accepted" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    server
        .delete(&format!("/api/v1/suggestions/{}", id))
        .await
        .assert_status_ok();
    server
        .delete(&format!("/api/v1/suggestions/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_lifecycle() {
    let server = create_test_server();
    let user = create_user(&server, "robin@example.com", &[]).await;
    let movie = create_movie(&server, json!({ "title": "Rushmore" })).await;

    let response = server
        .post("/api/v1/reviews")
        .json(&json!({ "userId": user, "movieId": movie, "rating": 11 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/reviews")
        .json(&json!({ "userId": user, "movieId": movie, "rating": 9, "comment": "Sharp." }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    let response = server
        .put(&format!("/api/v1/reviews/{}", id))
        .json(&json!({ "rating": 7 }))
        .await;
    response.assert_status_ok();
    let review: Value = response.json();
    assert_eq!(review["rating"], 7);
    assert_eq!(review["comment"], "Sharp.");

    let reviews: Vec<Value> = server
        .get(&format!("/api/v1/movies/{}/reviews", movie))
        .await
        .json();
    assert_eq!(reviews.len(), 1);

    server
        .delete(&format!("/api/v1/reviews/{}", id))
        .await
        .assert_status_ok();
    server
        .get(&format!("/api/v1/reviews/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_delete_cascades() {
    let server = create_test_server();
    let user = create_user(&server, "robin@example.com", &["Drama"]).await;
    let mut movies = Vec::new();
    for title in ["Magnolia", "Boogie Nights", "The Master"] {
        movies.push(create_movie(&server, json!({ "title": title, "genres": ["Drama"] })).await);
    }
    for movie in &movies {
        server
            .post("/api/v1/reviews")
            .json(&json!({ "userId": user, "movieId": movie, "rating": 8 }))
            .await
            .assert_status(StatusCode::CREATED);
    }
    server
        .post("/api/v1/suggestions/generate")
        .json(&json!({ "userId": user }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.delete(&format!("/api/v1/users/{}", user)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["deleted"]["id"], user.as_str());
    assert_eq!(body["cascade"]["reviewsDeleted"], 3);
    assert_eq!(body["cascade"]["suggestionsDeleted"], 3);

    let reviews: Vec<Value> = server.get("/api/v1/reviews").await.json();
    assert!(reviews.is_empty());
    server
        .get(&format!("/api/v1/users/{}", user))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_movie_delete_cascades() {
    let server = create_test_server();
    let actor = create_actor(&server, "Frances McDormand").await;
    let user = create_user(&server, "robin@example.com", &["Crime"]).await;
    let movie = create_movie(
        &server,
        json!({ "title": "Fargo", "genres": ["Crime"], "actors": [actor] }),
    )
    .await;
    server
        .post("/api/v1/reviews")
        .json(&json!({ "userId": user, "movieId": movie, "rating": 10 }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/v1/suggestions/generate")
        .json(&json!({ "userId": user }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.delete(&format!("/api/v1/movies/{}", movie)).await;
    response.assert_status_ok();
    let cascade = &response.json::<Value>()["cascade"];
    assert_eq!(cascade["actorsUpdated"], 1);
    assert_eq!(cascade["reviewsDeleted"], 1);
    assert_eq!(cascade["suggestionsDeleted"], 1);

    let actor: Value = server
        .get(&format!("/api/v1/actors/{}", actor))
        .await
        .json();
    assert_eq!(actor["movies"], json!([]));

    server
        .delete(&format!("/api/v1/movies/{}", movie))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_actor_delete_pulls_credit_from_movies() {
    let server = create_test_server();
    let actor = create_actor(&server, "Jeff Bridges").await;
    let movie = create_movie(
        &server,
        json!({ "title": "The Big Lebowski", "actors": [actor] }),
    )
    .await;

    let response = server.delete(&format!("/api/v1/actors/{}", actor)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["cascade"]["moviesUpdated"], 1);

    let movie: Value = server
        .get(&format!("/api/v1/movies/{}", movie))
        .await
        .json();
    assert_eq!(movie["actors"], json!([]));

    let response = server
        .get("/api/v1/actors/search")
        .add_query_param("name", "bridges")
        .await;
    assert!(response.json::<Vec<Value>>().is_empty());
}

#[tokio::test]
async fn test_movie_update_keeps_credits() {
    let server = create_test_server();
    let actor = create_actor(&server, "Al Pacino").await;
    let movie = create_movie(
        &server,
        json!({ "title": "Heat", "genres": ["Crime"], "actors": [actor] }),
    )
    .await;

    let response = server
        .put(&format!("/api/v1/movies/{}", movie))
        .json(&json!({ "rating": 8.3, "plot": "A heist crew and the detective after them.", "actors": [] }))
        .await;
    response.assert_status_ok();

    let updated: Value = server
        .get(&format!("/api/v1/movies/{}", movie))
        .await
        .json();
    assert_eq!(updated["rating"], 8.3);
    assert_eq!(updated["title"], "Heat");
    assert_eq!(updated["genres"], json!(["Crime"]));
    assert_eq!(updated["actors"], json!([actor]));

    server
        .put(&format!("/api/v1/movies/{}", movie))
        .json(&json!({ "rating": 12 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .put(&format!("/api/v1/movies/{}", uuid::Uuid::new_v4()))
        .json(&json!({ "title": "Nowhere" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_actor_and_director_updates() {
    let server = create_test_server();
    let actor = create_actor(&server, "Frances McDormand").await;
    let movie = create_movie(&server, json!({ "title": "Fargo", "actors": [actor] })).await;

    let response = server
        .put(&format!("/api/v1/actors/{}", actor))
        .json(&json!({ "nationality": ["American"], "bio": "Plays Marge Gunderson." }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["nationality"], json!(["American"]));
    assert_eq!(updated["name"], "Frances McDormand");
    assert_eq!(updated["movies"], json!([movie]));

    server
        .put(&format!("/api/v1/actors/{}", actor))
        .json(&json!({ "name": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/directors")
        .json(&json!({ "name": "Joel Coen" }))
        .await;
    let director = response.json::<Value>()["id"].as_str().unwrap().to_string();

    let response = server
        .put(&format!("/api/v1/directors/{}", director))
        .json(&json!({ "awards": [{ "awardName": "Palme d'Or", "year": 1991 }] }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["awards"][0]["awardName"], "Palme d'Or");

    server
        .put(&format!("/api/v1/directors/{}", uuid::Uuid::new_v4()))
        .json(&json!({ "name": "Nobody" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_profile_update() {
    let server = create_test_server();
    let user = create_user(&server, "robin@example.com", &["Drama"]).await;

    let response = server
        .put(&format!("/api/v1/users/{}", user))
        .json(&json!({ "name": "Robin H.", "bio": "Watches everything twice." }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["name"], "Robin H.");
    assert_eq!(updated["email"], "robin@example.com");
    assert_eq!(updated["preferences"]["genres"], json!(["Drama"]));

    let fetched: Value = server.get(&format!("/api/v1/users/{}", user)).await.json();
    assert_eq!(fetched["bio"], "Watches everything twice.");

    server
        .put(&format!("/api/v1/users/{}", user))
        .json(&json!({ "birthdate": "2022-01-01" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .put(&format!("/api/v1/users/{}", uuid::Uuid::new_v4()))
        .json(&json!({ "name": "Ghost" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

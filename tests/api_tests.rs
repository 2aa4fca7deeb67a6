//! API integration tests
//!
//! Run against a live server with: cargo test -- --ignored
//! Staff-only flows log in with LIBRARY_TEST_ADMIN_EMAIL / LIBRARY_TEST_ADMIN_PASSWORD.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique_suffix() -> String {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string()
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert!(response.status().is_success(), "login failed for {}", email);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    let email = std::env::var("LIBRARY_TEST_ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".to_string());
    let password = std::env::var("LIBRARY_TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    login(client, &email, &password).await
}

/// Register a fresh reader and return (user id, email, token)
async fn register_reader(client: &Client) -> (i64, String, String) {
    let email = format!("reader{}@example.com", unique_suffix());
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "name": "Test Reader",
            "email": email,
            "password": "secret123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    let id = body["id"].as_i64().expect("No user ID");
    let token = login(client, &email, "secret123").await;
    (id, email, token)
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_register_then_login() {
    let client = Client::new();
    let (id, email, token) = register_reader(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["id"].as_i64(), Some(id));
    assert_eq!(body["email"], email.as_str());
    assert_eq!(body["role"], "READER");
    assert!(body.get("password").is_none());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": "nobody@example.com", "password": "wrong-password" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_requires_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_create_book() {
    let client = Client::new();
    let (_, _, token) = register_reader(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "isbn": format!("isbn-{}", unique_suffix()),
            "title": "Forbidden",
            "available_quantity": 1,
            "total_quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_loan_lifecycle() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (reader_id, _, reader) = register_reader(&client).await;

    // Single-copy book
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({
            "isbn": format!("isbn-{}", unique_suffix()),
            "title": "Integration Test Book",
            "available_quantity": 1,
            "total_quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let book: Value = response.json().await.expect("Failed to parse response");
    let book_id = book["id"].as_i64().expect("No book ID");

    // Borrow
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "user_id": reader_id, "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.expect("Failed to parse response");
    let loan_id = loan["id"].as_i64().expect("No loan ID");
    assert_eq!(loan["status"], "ACTIVE");
    assert_eq!(loan["renewal_count"], 0);

    // No copies left
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&admin)
        .json(&json!({ "user_id": reader_id, "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The borrower can renew their own loan
    let response = client
        .put(format!("{}/loans/{}/renew", BASE_URL, loan_id))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let renewed: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(renewed["renewal_count"], 1);

    // Readers cannot return
    let response = client
        .put(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .put(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "RETURNED");
    assert!(returned["fine"].is_null());

    // Second return is rejected
    let response = client
        .put(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Copy is back on the shelf
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    let book: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(book["available_quantity"], 1);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_see_other_users_loans() {
    let client = Client::new();
    let (first_id, _, _) = register_reader(&client).await;
    let (_, _, second) = register_reader(&client).await;

    let response = client
        .get(format!("{}/users/{}/loans", BASE_URL, first_id))
        .bearer_auth(&second)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_dashboard() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let response = client
        .get(format!("{}/dashboard", BASE_URL))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["total_books"].is_number());
    assert!(body["recent_activities"].is_array());
}

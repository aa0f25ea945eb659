//! End-to-end tests for the user endpoints.

mod common;

use common::{TestClient, TestServer, OTHER_PASS, OTHER_USER, TEST_PASS, TEST_USER};
use reqwest::StatusCode;
use serde_json::Value;

async fn user_id_by_login(client: &TestClient, login: &str) -> String {
    let users: Vec<Value> = client.get_users().await.json().await.unwrap();
    users
        .iter()
        .find(|u| u["login"] == login)
        .unwrap_or_else(|| panic!("user {} not listed", login))["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn listed_users_carry_no_secrets() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.get_users().await;
    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);
    for user in &users {
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());
        assert_eq!(user["version"], 1);
    }
}

#[tokio::test]
async fn get_user_by_id_and_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let id = user_id_by_login(&client, TEST_USER).await;

    let response = client.get_user(&id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["login"], TEST_USER);

    let response = client.get_user("no-such-id").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_user_through_the_user_endpoint() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.create_user("admincreated", "somepass1").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The new user can log in right away.
    let fresh = TestClient::new(server.base_url.clone());
    let response = fresh.login("admincreated", "somepass1").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // And the login is now taken.
    let response = client.create_user("admincreated", "otherpass").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn password_change_bumps_version_and_rotates_credentials() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let id = user_id_by_login(&client, TEST_USER).await;

    let response = client.update_password(&id, TEST_PASS, "brandnewpass").await;
    assert_eq!(response.status(), StatusCode::OK);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["version"], 2);
    assert!(user["updated_at"].as_i64().unwrap() >= user["created_at"].as_i64().unwrap());

    let fresh = TestClient::new(server.base_url.clone());
    let response = fresh.login(TEST_USER, TEST_PASS).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = fresh.login(TEST_USER, "brandnewpass").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn password_change_with_wrong_old_password_is_forbidden() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let id = user_id_by_login(&client, TEST_USER).await;

    let response = client.update_password(&id, "nottheoldpass", "whatever1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Version stays untouched after the failed attempt.
    let user: Value = client.get_user(&id).await.json().await.unwrap();
    assert_eq!(user["version"], 1);
}

#[tokio::test]
async fn password_change_for_unknown_user_is_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .update_password("no-such-id", "oldpass", "newpass")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_user_disappears_and_cannot_log_in() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;
    let id = user_id_by_login(&client, OTHER_USER).await;

    let response = client.delete_user(&id).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get_user(&id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.delete_user(&id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let fresh = TestClient::new(server.base_url.clone());
    let response = fresh.login(OTHER_USER, OTHER_PASS).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

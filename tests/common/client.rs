//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all library-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication flows.
    /// For most tests, use `authenticated()` instead.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as the pre-registered test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(TEST_USER, TEST_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/signup
    pub async fn signup(&self, login: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/signup", self.base_url))
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await
            .expect("Signup request failed")
    }

    /// POST /v1/auth/login
    pub async fn login(&self, login: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// GET /v1/user
    pub async fn get_users(&self) -> Response {
        self.client
            .get(format!("{}/v1/user", self.base_url))
            .send()
            .await
            .expect("Get users request failed")
    }

    /// GET /v1/user/{id}
    pub async fn get_user(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/user/{}", self.base_url, id))
            .send()
            .await
            .expect("Get user request failed")
    }

    /// POST /v1/user
    pub async fn create_user(&self, login: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/user", self.base_url))
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await
            .expect("Create user request failed")
    }

    /// PUT /v1/user/{id}
    pub async fn update_password(&self, id: &str, old_password: &str, new_password: &str) -> Response {
        self.client
            .put(format!("{}/v1/user/{}", self.base_url, id))
            .json(&json!({ "oldPassword": old_password, "newPassword": new_password }))
            .send()
            .await
            .expect("Update password request failed")
    }

    /// DELETE /v1/user/{id}
    pub async fn delete_user(&self, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/user/{}", self.base_url, id))
            .send()
            .await
            .expect("Delete user request failed")
    }

    // ========================================================================
    // Artist Endpoints
    // ========================================================================

    /// GET /v1/artist
    pub async fn get_artists(&self) -> Response {
        self.client
            .get(format!("{}/v1/artist", self.base_url))
            .send()
            .await
            .expect("Get artists request failed")
    }

    /// GET /v1/artist/{id}
    pub async fn get_artist(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/artist/{}", self.base_url, id))
            .send()
            .await
            .expect("Get artist request failed")
    }

    /// POST /v1/artist
    pub async fn create_artist(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/v1/artist", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create artist request failed")
    }

    /// PUT /v1/artist/{id}
    pub async fn update_artist(&self, id: &str, body: serde_json::Value) -> Response {
        self.client
            .put(format!("{}/v1/artist/{}", self.base_url, id))
            .json(&body)
            .send()
            .await
            .expect("Update artist request failed")
    }

    /// DELETE /v1/artist/{id}
    pub async fn delete_artist(&self, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/artist/{}", self.base_url, id))
            .send()
            .await
            .expect("Delete artist request failed")
    }

    // ========================================================================
    // Album Endpoints
    // ========================================================================

    /// GET /v1/album
    pub async fn get_albums(&self) -> Response {
        self.client
            .get(format!("{}/v1/album", self.base_url))
            .send()
            .await
            .expect("Get albums request failed")
    }

    /// GET /v1/album/{id}
    pub async fn get_album(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/album/{}", self.base_url, id))
            .send()
            .await
            .expect("Get album request failed")
    }

    /// POST /v1/album
    pub async fn create_album(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/v1/album", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create album request failed")
    }

    /// PUT /v1/album/{id}
    pub async fn update_album(&self, id: &str, body: serde_json::Value) -> Response {
        self.client
            .put(format!("{}/v1/album/{}", self.base_url, id))
            .json(&body)
            .send()
            .await
            .expect("Update album request failed")
    }

    /// DELETE /v1/album/{id}
    pub async fn delete_album(&self, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/album/{}", self.base_url, id))
            .send()
            .await
            .expect("Delete album request failed")
    }

    // ========================================================================
    // Track Endpoints
    // ========================================================================

    /// GET /v1/track
    pub async fn get_tracks(&self) -> Response {
        self.client
            .get(format!("{}/v1/track", self.base_url))
            .send()
            .await
            .expect("Get tracks request failed")
    }

    /// GET /v1/track/{id}
    pub async fn get_track(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/track/{}", self.base_url, id))
            .send()
            .await
            .expect("Get track request failed")
    }

    /// POST /v1/track
    pub async fn create_track(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/v1/track", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create track request failed")
    }

    /// PUT /v1/track/{id}
    pub async fn update_track(&self, id: &str, body: serde_json::Value) -> Response {
        self.client
            .put(format!("{}/v1/track/{}", self.base_url, id))
            .json(&body)
            .send()
            .await
            .expect("Update track request failed")
    }

    /// DELETE /v1/track/{id}
    pub async fn delete_track(&self, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/track/{}", self.base_url, id))
            .send()
            .await
            .expect("Delete track request failed")
    }

    // ========================================================================
    // Favorites Endpoints
    // ========================================================================

    /// GET /v1/favs
    pub async fn get_favorites(&self) -> Response {
        self.client
            .get(format!("{}/v1/favs", self.base_url))
            .send()
            .await
            .expect("Get favorites request failed")
    }

    /// POST /v1/favs/{kind}/{id}
    pub async fn add_favorite(&self, kind: &str, id: &str) -> Response {
        self.client
            .post(format!("{}/v1/favs/{}/{}", self.base_url, kind, id))
            .send()
            .await
            .expect("Add favorite request failed")
    }

    /// DELETE /v1/favs/{kind}/{id}
    pub async fn remove_favorite(&self, kind: &str, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/favs/{}/{}", self.base_url, kind, id))
            .send()
            .await
            .expect("Remove favorite request failed")
    }

    // ========================================================================
    // Convenience helpers
    // ========================================================================

    /// Creates an artist and returns its id.
    pub async fn seed_artist(&self, name: &str) -> String {
        let response = self
            .create_artist(json!({ "name": name, "grammy": false }))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json::<serde_json::Value>().await.unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Creates an album and returns its id.
    pub async fn seed_album(&self, name: &str, artist_id: Option<&str>) -> String {
        let response = self
            .create_album(json!({ "name": name, "year": 2020, "artist_id": artist_id }))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json::<serde_json::Value>().await.unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Creates a track and returns its id.
    pub async fn seed_track(
        &self,
        name: &str,
        artist_id: Option<&str>,
        album_id: Option<&str>,
    ) -> String {
        let response = self
            .create_track(json!({
                "name": name,
                "duration_secs": 240,
                "artist_id": artist_id,
                "album_id": album_id
            }))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json::<serde_json::Value>().await.unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

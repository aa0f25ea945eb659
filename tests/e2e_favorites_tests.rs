//! End-to-end tests for the global favorites set.

mod common;

use common::{TestClient, TestServer};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn favorites_start_empty() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let favs: Value = client.get_favorites().await.json().await.unwrap();
    assert_eq!(favs["artists"].as_array().unwrap().len(), 0);
    assert_eq!(favs["albums"].as_array().unwrap().len(), 0);
    assert_eq!(favs["tracks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn favorites_resolve_to_full_entities() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let artist_id = client.seed_artist("Freddie").await;
    let album_id = client.seed_album("Night", Some(&artist_id)).await;
    let track_id = client.seed_track("Bohemian", Some(&artist_id), Some(&album_id)).await;

    assert_eq!(
        client.add_favorite("artist", &artist_id).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        client.add_favorite("album", &album_id).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        client.add_favorite("track", &track_id).await.status(),
        StatusCode::CREATED
    );

    let favs: Value = client.get_favorites().await.json().await.unwrap();
    assert_eq!(favs["artists"][0]["name"], "Freddie");
    assert_eq!(favs["albums"][0]["id"], album_id.as_str());
    assert_eq!(favs["tracks"][0]["duration_secs"], 240);
}

#[tokio::test]
async fn adding_a_favorite_twice_is_a_no_op() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let artist_id = client.seed_artist("Freddie").await;
    assert_eq!(
        client.add_favorite("artist", &artist_id).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        client.add_favorite("artist", &artist_id).await.status(),
        StatusCode::CREATED
    );

    let favs: Value = client.get_favorites().await.json().await.unwrap();
    assert_eq!(favs["artists"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn favorites_keep_insertion_order() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let second = client.seed_artist("Second").await;
    let first = client.seed_artist("First").await;

    client.add_favorite("artist", &first).await;
    client.add_favorite("artist", &second).await;

    let favs: Value = client.get_favorites().await.json().await.unwrap();
    let names: Vec<&str> = favs["artists"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["First", "Second"]);
}

#[tokio::test]
async fn favoriting_a_missing_target_is_unprocessable() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    for kind in ["artist", "album", "track"] {
        let response = client.add_favorite(kind, "ghost").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", kind);
    }
}

#[tokio::test]
async fn unknown_favorite_kind_is_a_bad_request() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client.add_favorite("playlist", "whatever").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = client.remove_favorite("playlist", "whatever").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn removing_a_favorite_is_strict() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let artist_id = client.seed_artist("Freddie").await;

    // Not a member yet.
    let response = client.remove_favorite("artist", &artist_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    client.add_favorite("artist", &artist_id).await;
    let response = client.remove_favorite("artist", &artist_id).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Second removal fails again.
    let response = client.remove_favorite("artist", &artist_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_an_entity_silently_drops_its_favorite() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let artist_id = client.seed_artist("Freddie").await;
    let track_id = client.seed_track("Bohemian", Some(&artist_id), None).await;
    client.add_favorite("artist", &artist_id).await;
    client.add_favorite("track", &track_id).await;

    client.delete_artist(&artist_id).await;

    let favs: Value = client.get_favorites().await.json().await.unwrap();
    assert_eq!(favs["artists"].as_array().unwrap().len(), 0);
    // The track survived the cascade and is still a favorite.
    assert_eq!(favs["tracks"].as_array().unwrap().len(), 1);
    assert!(favs["tracks"][0]["artist_id"].is_null());
}

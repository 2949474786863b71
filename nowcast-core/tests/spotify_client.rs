//! HTTP-level tests for the Spotify client against a mock server

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nowcast_core::config::SpotifyConfig;
use nowcast_core::model::{PlaybackState, PlaybackUpdate};
use nowcast_core::spotify::{SpotifyClient, StreamingUpstream};
use nowcast_core::Error;

fn test_config() -> SpotifyConfig {
    SpotifyConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        redirect_uri: "https://relay.example/auth/callback".to_string(),
        user_id: "owner".to_string(),
    }
}

fn client_against(server: &MockServer) -> SpotifyClient {
    SpotifyClient::with_endpoints(test_config(), server.uri(), server.uri())
}

#[tokio::test]
async fn test_refresh_token_sends_credentials_and_parses_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .and(body_string_contains("client_id=test-client-id"))
        .and(body_string_contains("client_secret=test-client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "refresh_token": "rotated-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_against(&server);
    let grant = client.refresh_token("old-refresh").await.unwrap();
    assert_eq!(grant.access_token, "fresh-access");
    assert_eq!(grant.refresh_token.as_deref(), Some("rotated-refresh"));
}

#[tokio::test]
async fn test_refresh_token_without_rotation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh-access"})),
        )
        .mount(&server)
        .await;

    let client = client_against(&server);
    let grant = client.refresh_token("old-refresh").await.unwrap();
    assert_eq!(grant.refresh_token, None);
}

#[tokio::test]
async fn test_refresh_token_rejection_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client.refresh_token("revoked").await.unwrap_err();
    match err {
        Error::Upstream { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_currently_playing_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .and(header("authorization", "Bearer the-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": {
                "name": "Everything In Its Right Place",
                "duration_ms": 251000,
                "artists": [{"name": "Radiohead"}],
                "album": {
                    "name": "Kid A",
                    "images": [{"url": "https://i.example/kid-a.jpg"}]
                },
                "external_urls": {"spotify": "https://open.spotify.com/track/eiirp"}
            },
            "progress_ms": 12345,
            "is_playing": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_against(&server);
    let playing = client.currently_playing("the-access-token").await.unwrap();
    let update = PlaybackUpdate::from(playing);
    assert_eq!(
        update.title.as_deref(),
        Some("Everything In Its Right Place")
    );
    assert_eq!(update.progress, Some(12_345));
    assert_eq!(update.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_currently_playing_no_content_means_nothing_playing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let playing = client.currently_playing("token").await.unwrap();
    assert!(playing.item.is_none());
    assert!(!playing.is_playing);
}

#[tokio::test]
async fn test_currently_playing_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client.currently_playing("expired").await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized));
}

#[tokio::test]
async fn test_exchange_code_uses_authorization_code_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access",
            "refresh_token": "refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_against(&server);
    let grant = client.exchange_code("the-code").await.unwrap();
    assert_eq!(grant.access_token, "access");
    assert_eq!(grant.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn test_profile_returns_account_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header("authorization", "Bearer access"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "owner", "display_name": "Owner"})),
        )
        .mount(&server)
        .await;

    let client = client_against(&server);
    let profile = client.profile("access").await.unwrap();
    assert_eq!(profile.id, "owner");
    assert_eq!(profile.display_name.as_deref(), Some("Owner"));
}

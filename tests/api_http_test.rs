use chrono::Utc;
use mockito::Matcher;
use ososync::api::{ApiClient, HttpInstallationDirectory, InstallationDirectory};
use ososync::auth::{Credential, HttpTokenExchange, TokenExchange, TokenKind};
use ososync::config::{ApiConfig, TokenConfig};
use ososync::persistence::RefreshTokenStore;

fn credential() -> Credential {
    Credential {
        bearer: "test-bearer".to_string(),
        kind: TokenKind::Bearer,
        issued_at: Utc::now(),
        valid_for_secs: 240,
        refresh_token: None,
    }
}

fn api_config(base_url: &str, page_size: u32) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        email: "info@avrupaelektrik.com.tr".to_string(),
        company_id: 2,
        page_size,
        request_timeout_secs: 5,
    }
}

fn token_config(url: &str, grant: &str, refresh_token_file: &str) -> TokenConfig {
    TokenConfig {
        url: url.to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        consumer_id: "MDMAYPRD".to_string(),
        grant: grant.to_string(),
        refresh_token_file: refresh_token_file.to_string(),
        refresh_interval_secs: 240,
        freshness_factor: 0.5,
    }
}

const TOKEN_BODY: &str = r#"{
    "access_token": "acc-1",
    "expires_in": 240,
    "refresh_expires_in": 1800,
    "refresh_token": "rot-2",
    "token_type": "Bearer",
    "id_token": "id-1",
    "session_state": "s",
    "scope": "openid"
}"#;

#[tokio::test]
async fn installation_listing_follows_total_count_pagination() {
    let mut server = mockito::Server::new_async().await;

    let page_one = server
        .mock("GET", "/InstallationOperations/GetInstallationInfo")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pageSize".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .match_header("authorization", "Bearer test-bearer")
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data":[{"id":1,"tesisatNo":"1000000001"},{"id":2,"tesisatNo":"1000000002"}],
                "totalCount":3,"success":true,"message":null}"#,
        )
        .create_async()
        .await;

    let page_two = server
        .mock("GET", "/InstallationOperations/GetInstallationInfo")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pageSize".into(), "2".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data":[{"id":3,"tesisatNo":"1000000003"}],
                "totalCount":3,"success":true,"message":null}"#,
        )
        .create_async()
        .await;

    let client = ApiClient::new(5).unwrap();
    let directory = HttpInstallationDirectory::new(client, api_config(&server.url(), 2));

    let installations = directory.list(&credential()).await.unwrap();
    assert_eq!(installations.len(), 3);
    assert_eq!(installations[2].number, "1000000003");

    page_one.assert_async().await;
    page_two.assert_async().await;
}

#[tokio::test]
async fn non_success_status_surfaces_as_api_error() {
    let mut server = mockito::Server::new_async().await;

    let unauthorized = server
        .mock("GET", "/InstallationOperations/GetInstallationInfo")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body("token expired")
        .create_async()
        .await;

    let client = ApiClient::new(5).unwrap();
    let directory = HttpInstallationDirectory::new(client, api_config(&server.url(), 1000));

    let err = directory.list(&credential()).await.unwrap_err();
    assert!(err.is_unauthorized());

    unauthorized.assert_async().await;
}

#[tokio::test]
async fn client_credentials_exchange_uses_query_parameters() {
    let mut server = mockito::Server::new_async().await;

    let token = server
        .mock("POST", "/oauth/token")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("client_id".into(), "client".into()),
            Matcher::UrlEncoded("client_secret".into(), "secret".into()),
            Matcher::UrlEncoded("consumerID".into(), "MDMAYPRD".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let refresh_file = dir.path().join("refresh_token.json");
    let config = token_config(
        &format!("{}/oauth/token", server.url()),
        "client_credentials",
        refresh_file.to_str().unwrap(),
    );

    let exchange = HttpTokenExchange::new(config).unwrap();
    let response = exchange.exchange().await.unwrap();
    assert_eq!(response.access_token, "acc-1");
    assert_eq!(response.id_token.as_deref(), Some("id-1"));

    token.assert_async().await;
}

#[tokio::test]
async fn client_credentials_exchange_falls_back_to_form_body() {
    let mut server = mockito::Server::new_async().await;

    // The provider variant that rejects query parameters...
    let rejected = server
        .mock("POST", "/oauth/token")
        .match_query(Matcher::UrlEncoded(
            "grant_type".into(),
            "client_credentials".into(),
        ))
        .with_status(400)
        .with_body("use form encoding")
        .create_async()
        .await;

    // ...and accepts the same parameters form-encoded
    let accepted = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("client_id".into(), "client".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let refresh_file = dir.path().join("refresh_token.json");
    let config = token_config(
        &format!("{}/oauth/token", server.url()),
        "client_credentials",
        refresh_file.to_str().unwrap(),
    );

    let exchange = HttpTokenExchange::new(config).unwrap();
    let response = exchange.exchange().await.unwrap();
    assert_eq!(response.access_token, "acc-1");

    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn refresh_token_exchange_persists_the_rotated_token() {
    let mut server = mockito::Server::new_async().await;

    let token = server
        .mock("POST", "/oauth/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "rot-1".into()),
            Matcher::UrlEncoded("client_id".into(), "client".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let refresh_file = dir.path().join("refresh_token.json");
    let refresh_store = RefreshTokenStore::new(refresh_file.to_str().unwrap());
    refresh_store.save("rot-1").unwrap();

    let config = token_config(
        &format!("{}/oauth/token", server.url()),
        "refresh_token",
        refresh_file.to_str().unwrap(),
    );

    let exchange = HttpTokenExchange::new(config).unwrap();
    let response = exchange.exchange().await.unwrap();
    assert_eq!(response.access_token, "acc-1");

    // The single-use token was rotated on disk
    assert_eq!(refresh_store.load().unwrap(), Some("rot-2".to_string()));

    token.assert_async().await;
}

#[tokio::test]
async fn missing_refresh_token_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let refresh_file = dir.path().join("refresh_token.json");

    // No HTTP server at all: the exchange must fail before any request
    let config = token_config(
        "http://127.0.0.1:9/oauth/token",
        "refresh_token",
        refresh_file.to_str().unwrap(),
    );

    let exchange = HttpTokenExchange::new(config).unwrap();
    let err = exchange.exchange().await.unwrap_err();
    assert!(matches!(err, ososync::OsosyncError::Config { .. }));
}

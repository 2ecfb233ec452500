use std::sync::Arc;

use axum::{body::Body, routing::get, Router};
use cachet::{jwt, Algorithm, Hmac, Jwt};
use cachet_axum::{token_endpoint, Oauth2Authorizer};
use cachet_clock::{Clock, DurationSecs, System, UnixTime};
use cachet_oauth2::{
    policy, scope, Authority, BasicClaimsWithScope, ClientRegistry, Scope, TokenIssuer,
};
use color_eyre::Result;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn test_key() -> Hmac {
    Hmac::new(&b"integration-test-signing-secret"[..]).unwrap()
}

fn test_authority(key: Hmac) -> Authority {
    Authority::new(
        key,
        jwt::CoreValidator::default()
            .add_approved_algorithm(Algorithm::HS256)
            .require_issuer(jwt::Issuer::from_static("test-authority"))
            .add_allowed_audience(jwt::Audience::from_static("test-api")),
    )
}

fn test_issuer(key: Hmac) -> Arc<TokenIssuer> {
    let registry = ClientRegistry::new()
        .with_client(
            "svc-billing".into(),
            "billing-secret".into(),
            scope!["users:read", "users:write"],
        )
        .with_client("svc-mailer".into(), "mailer-secret".into(), Scope::empty());

    Arc::new(
        TokenIssuer::new(
            key,
            Algorithm::HS256,
            jwt::Issuer::from_static("test-authority"),
            jwt::Audience::from_static("test-api"),
            registry,
        )
        .with_token_lifetime(DurationSecs(300)),
    )
}

fn app(key: Hmac) -> Router {
    let authorizer = Oauth2Authorizer::new().with_terse_error_handler();

    Router::new()
        .route(
            "/users",
            get(|| async { "users" })
                .layer(authorizer.scope_layer(policy![scope!["users:read"]])),
        )
        .route(
            "/admin",
            get(|| async { "admin" })
                .layer(authorizer.scope_layer(policy![scope!["users:admin"]])),
        )
        .layer(authorizer.jwt_layer(test_authority(key.clone())))
        .merge(token_endpoint::routes(test_issuer(key)))
}

fn signed_token(key: &Hmac, scope: Scope, expiry: UnixTime) -> Jwt {
    let claims = BasicClaimsWithScope {
        basic: jwt::Claims::new()
            .with_issuer("test-authority")
            .with_audience("test-api")
            .with_subject("svc-billing")
            .with_token_id("tok-0001")
            .with_issued_at(expiry.saturating_sub(DurationSecs(300)))
            .with_expiration(expiry),
        scope,
    };
    Jwt::try_from_parts_with_signature(&jwt::Headers::new(Algorithm::HS256), &claims, key)
        .expect("token should sign")
}

fn valid_token(key: &Hmac, scope: Scope) -> Jwt {
    signed_token(key, scope, System.now() + DurationSecs(300))
}

fn get_with_token(uri: &str, token: &Jwt) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token.as_str()))
        .body(Body::empty())
        .unwrap()
}

fn token_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(body.to_owned()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn request_with_sufficient_scope_is_served() -> Result<()> {
    let key = test_key();
    let token = valid_token(&key, scope!["users:read"]);

    let response = app(key).oneshot(get_with_token("/users", &token)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await?.to_bytes();
    assert_eq!(&body[..], b"users");
    Ok(())
}

#[tokio::test]
async fn insufficient_scope_is_forbidden_and_names_the_required_scope() -> Result<()> {
    let key = test_key();
    let token = valid_token(&key, scope!["users:read"]);

    let response = app(key).oneshot(get_with_token("/admin", &token)).await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let www_authenticate = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .expect("www-authenticate header")
        .to_str()?;
    assert!(www_authenticate.contains(r#"error="insufficient_scope""#));
    assert!(www_authenticate.contains(r#"scope="users:admin""#));
    Ok(())
}

#[tokio::test]
async fn missing_token_is_unauthorized() -> Result<()> {
    let key = test_key();

    let response = app(key)
        .oneshot(Request::builder().uri("/users").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn malformed_token_is_unauthorized_without_detail() -> Result<()> {
    let key = test_key();

    let response = app(key)
        .oneshot(
            Request::builder()
                .uri("/users")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let www_authenticate = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .expect("www-authenticate header")
        .to_str()?;
    assert_eq!(www_authenticate, r#"Bearer error="invalid_token""#);

    let body = response.into_body().collect().await?.to_bytes();
    assert!(body.is_empty());
    Ok(())
}

#[tokio::test]
async fn token_signed_with_the_wrong_key_is_unauthorized() -> Result<()> {
    let other_key = Hmac::new(&b"some-other-secret"[..]).unwrap();
    let token = valid_token(&other_key, scope!["users:read"]);

    let response = app(test_key())
        .oneshot(get_with_token("/users", &token))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_unauthorized() -> Result<()> {
    let key = test_key();
    let token = signed_token(
        &key,
        scope!["users:read"],
        System.now().saturating_sub(DurationSecs(1)),
    );

    let response = app(key).oneshot(get_with_token("/users", &token)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn issued_token_is_accepted_by_the_protected_routes() -> Result<()> {
    let key = test_key();

    let response = app(key.clone())
        .oneshot(token_request(
            "grant_type=client_credentials\
             &client_id=svc-billing\
             &client_secret=billing-secret\
             &scope=users%3Aread",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    let body = body_json(response).await?;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 300);
    assert_eq!(body["scope"], "users:read");

    let token = Jwt::from(body["access_token"].as_str().expect("an access token"));
    let response = app(key).oneshot(get_with_token("/users", &token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn wrong_client_secret_is_invalid_client() -> Result<()> {
    let response = app(test_key())
        .oneshot(token_request(
            "grant_type=client_credentials&client_id=svc-billing&client_secret=wrong",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "invalid_client");
    Ok(())
}

#[tokio::test]
async fn unsupported_grant_type_is_rejected() -> Result<()> {
    let response = app(test_key())
        .oneshot(token_request(
            "grant_type=password&client_id=svc-billing&client_secret=billing-secret",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "unsupported_grant_type");
    Ok(())
}

#[tokio::test]
async fn excessive_scope_request_is_invalid_scope() -> Result<()> {
    let response = app(test_key())
        .oneshot(token_request(
            "grant_type=client_credentials\
             &client_id=svc-billing\
             &client_secret=billing-secret\
             &scope=users%3Aadmin",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "invalid_scope");
    Ok(())
}

#[tokio::test]
async fn missing_credentials_are_invalid_request() -> Result<()> {
    let response = app(test_key())
        .oneshot(token_request("grant_type=client_credentials"))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"], "invalid_request");
    Ok(())
}

#[tokio::test]
async fn client_with_empty_grant_receives_an_empty_scope_token() -> Result<()> {
    let key = test_key();

    let response = app(key.clone())
        .oneshot(token_request(
            "grant_type=client_credentials&client_id=svc-mailer&client_secret=mailer-secret",
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;

    // an empty grant still yields a verifiable token, it just satisfies no policy
    let token = Jwt::from(body["access_token"].as_str().expect("an access token"));
    let response = app(key).oneshot(get_with_token("/users", &token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

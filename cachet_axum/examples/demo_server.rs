use std::sync::Arc;

use cachet::{jwt, Algorithm, Hmac};
use cachet_axum::{token_endpoint, Oauth2Authorizer};
use cachet_oauth2::{policy, scope, Authority, ClientRegistry, TokenIssuer};
use clap::Parser;

#[derive(Debug, Parser)]
struct Opts {
    /// The address to listen on
    #[clap(short, long, env, default_value = "127.0.0.1:8080")]
    listen: String,

    /// The shared secret used to sign and verify tokens
    #[clap(short = 's', long, env, hide_env_values = true)]
    signing_secret: Option<String>,
}

const ISSUER: &str = "https://demo.issuer.example.com/";
const AUDIENCE: &str = "https://demo.api.example.com/";

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let key = match opts.signing_secret {
        Some(secret) => Hmac::new(secret.into_bytes())?,
        None => Hmac::generate(Algorithm::HS256)?,
    };

    let registry = ClientRegistry::new().with_client(
        "svc-demo".into(),
        "demo-secret".into(),
        scope!["users:read", "users:write"],
    );

    let issuer = Arc::new(TokenIssuer::new(
        key.clone(),
        Algorithm::HS256,
        jwt::Issuer::from_static(ISSUER),
        jwt::Audience::from_static(AUDIENCE),
        registry,
    ));

    let validator = jwt::CoreValidator::default()
        .add_approved_algorithm(Algorithm::HS256)
        .add_allowed_audience(jwt::Audience::from_static(AUDIENCE))
        .require_issuer(jwt::Issuer::from_static(ISSUER));

    let authority = Authority::new(key, validator);

    // Authentication failures stay opaque; authorization failures may name
    // the scopes that would have been accepted.
    let jwt_authorizer = Oauth2Authorizer::new().with_terse_error_handler();
    let scope_authorizer = Oauth2Authorizer::new().with_verbose_error_handler();

    let app = axum::Router::new()
        .route(
            "/users",
            axum::routing::get(|| async { "Handled GET /users" })
                .layer(scope_authorizer.scope_layer(policy![scope!["users:read"]])),
        )
        .route(
            "/users/:id",
            axum::routing::delete(|| async { "Handled DELETE /users/:id" })
                .layer(scope_authorizer.scope_layer(policy![scope!["users:write"]])),
        )
        .layer(jwt_authorizer.jwt_layer(authority))
        .merge(token_endpoint::routes(issuer));

    println!("Request a token with:");
    println!(
        "  curl -d 'grant_type=client_credentials&client_id=svc-demo&client_secret=demo-secret&scope=users:read' http://{}/oauth/token",
        opts.listen
    );
    println!("Press Ctrl+C to exit");

    let listener = tokio::net::TcpListener::bind(&opts.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

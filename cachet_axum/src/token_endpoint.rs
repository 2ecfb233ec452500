//! The token issuance endpoint
//!
//! Serves `POST /oauth/token` for the client-credentials grant, per
//! [RFC 6749, Section 4.4][RFC6749 4.4]. Credentials arrive as URL-encoded
//! form data; both success and error responses are JSON, with error codes
//! drawn from [RFC 6749, Section 5.2][RFC6749 5.2].
//!
//!   [RFC6749 4.4]: (https://datatracker.ietf.org/doc/html/rfc6749#section-4.4)
//!   [RFC6749 5.2]: (https://datatracker.ietf.org/doc/html/rfc6749#section-5.2)

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use cachet_clock::Clock;
use cachet_oauth2::{ClientId, ClientSecret, IssueError, Scope, TokenIssuer};
use http::{header, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// The form body of a token request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    grant_type: String,
    client_id: Option<ClientId>,
    client_secret: Option<ClientSecret>,
    scope: Option<String>,
}

/// Machine-readable token endpoint error codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is missing a required parameter or is otherwise malformed
    InvalidRequest,
    /// Client authentication failed
    InvalidClient,
    /// The requested scope is malformed or exceeds the client's grant
    InvalidScope,
    /// The grant type is not supported by this endpoint
    UnsupportedGrantType,
}

/// A token endpoint error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The machine-readable error code
    pub error: ErrorCode,

    /// A human-readable description of the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

// Token responses must not be cached by intermediaries (RFC 6749 §5.1)
fn no_store() -> [(HeaderName, HeaderValue); 2] {
    [
        (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
    ]
}

fn error_response(status: StatusCode, error: ErrorCode, description: &str) -> Response {
    let body = ErrorResponse {
        error,
        error_description: (!description.is_empty()).then(|| description.to_owned()),
    };
    (status, no_store(), Json(body)).into_response()
}

/// Handles a token request for the client-credentials grant
///
/// Expects an `Arc<TokenIssuer>` as router state.
pub async fn token_endpoint<C>(
    State(issuer): State<Arc<TokenIssuer<C>>>,
    Form(form): Form<TokenRequest>,
) -> Response
where
    C: Clock + Send + Sync + 'static,
{
    if form.grant_type != "client_credentials" {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::UnsupportedGrantType,
            "only the client_credentials grant is supported",
        );
    }

    let (Some(client_id), Some(client_secret)) = (form.client_id, form.client_secret) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidRequest,
            "client_id and client_secret are required",
        );
    };

    let requested_scope = match form.scope.as_deref().map(str::parse::<Scope>).transpose() {
        Ok(scope) => scope,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidScope,
                "requested scope is malformed",
            )
        }
    };

    match issuer.issue_token(&client_id, &client_secret, requested_scope) {
        Ok(issued) => (StatusCode::OK, no_store(), Json(issued)).into_response(),
        Err(IssueError::InvalidClient) => {
            error_response(StatusCode::UNAUTHORIZED, ErrorCode::InvalidClient, "")
        }
        Err(IssueError::InvalidScope) => error_response(
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidScope,
            "requested scope exceeds the client's grant",
        ),
        Err(error @ IssueError::SigningFailed(_)) => {
            let error_ref: &dyn std::error::Error = &error;
            tracing::error!(
                error = error_ref,
                "unable to issue token"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Builds a router serving the token endpoint at `POST /oauth/token`
pub fn routes<C>(issuer: Arc<TokenIssuer<C>>) -> Router
where
    C: Clock + Send + Sync + 'static,
{
    Router::new()
        .route("/oauth/token", post(token_endpoint::<C>))
        .with_state(issuer)
}

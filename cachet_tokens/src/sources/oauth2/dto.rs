//! DTOs for interacting with OAuth2 token source servers

use cachet_clock::DurationSecs;
use cachet_oauth2::{ClientId, ClientIdRef, ClientSecret, Scope};
use serde::{Deserialize, Serialize, Serializer};

use crate::AccessTokenRef;

/// Client credentials
#[derive(Debug, Serialize)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,
}

/// Client credentials with an optional requested scope
#[derive(Debug)]
pub struct ClientCredentialsWithScope {
    /// The client credentials
    pub credentials: std::sync::Arc<ClientCredentials>,

    /// The scope to request, or `None` to accept the authority's default
    pub scope: Option<Scope>,
}

impl ClientCredentialsWithScope {
    pub(crate) fn client_id(&self) -> &ClientIdRef {
        &self.credentials.client_id
    }
}

impl Serialize for ClientCredentialsWithScope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("ClientCredentialsWithScope", 4)?;
        ser.serialize_field("grant_type", "client_credentials")?;
        ser.serialize_field("client_id", &self.credentials.client_id)?;
        ser.serialize_field("client_secret", &self.credentials.client_secret)?;
        if let Some(scope) = &self.scope {
            let joined = scope
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            ser.serialize_field("scope", &joined)?;
        } else {
            ser.skip_field("scope")?;
        }
        ser.end()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub(super) struct TokenResponse<'a> {
    #[serde(borrow)]
    pub access_token: &'a AccessTokenRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub expires_in: DurationSecs,
}

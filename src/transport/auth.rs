use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::hub::registry::{Identity, Role};

/// JWT claims carried in the handshake token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

/// Handshake authentication seam. The token is issued and validated by an
/// external collaborator; the hub only consumes the resulting identity and
/// never re-validates it afterwards.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<Identity>;
}

/// HS256 token verification against a shared secret.
pub struct JwtAuthenticator {
    secret: String,
}

impl JwtAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for an identity, mostly useful to tests and tooling.
    pub fn issue(&self, identity: &Identity, ttl_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            role: identity.role,
            exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Option<Identity> {
        let validation = Validation::default();
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &validation,
        )
        .ok()?;
        Some(Identity {
            id: data.claims.sub,
            name: data.claims.name,
            role: data.claims.role,
        })
    }
}

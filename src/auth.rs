//! Bearer-token authentication and the two admin authorization policies.

use crate::{errors::AppError, routes::routes::AppState};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "Admin";
pub const MODERATOR_ROLE: &str = "Moderator";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub roles: Vec<String>,
    pub exp: usize,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Who may reach a group of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Role management.
    RequireAdminRole,
    /// Photo moderation.
    ModeratePhotoRole,
}

impl Policy {
    pub fn allows(self, claims: &Claims) -> bool {
        match self {
            Policy::RequireAdminRole => claims.has_role(ADMIN_ROLE),
            Policy::ModeratePhotoRole => {
                claims.has_role(ADMIN_ROLE) || claims.has_role(MODERATOR_ROLE)
            }
        }
    }
}

/// HS256 signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: i64, username: &str, roles: Vec<String>) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            roles,
            exp: (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state.auth, Policy::RequireAdminRole, req, next).await
}

pub async fn require_moderator(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state.auth, Policy::ModeratePhotoRole, req, next).await
}

async fn authorize(
    keys: &AuthKeys,
    policy: Policy,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

    let claims = keys.verify(token)?;
    if !policy.allows(&claims) {
        tracing::debug!(user = %claims.username, ?policy, "forbidden");
        return Err(AppError::forbidden("Insufficient role"));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(roles: &[&str]) -> Claims {
        Claims {
            sub: 1,
            username: "u".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: 0,
        }
    }

    #[test]
    fn moderators_can_moderate_but_not_administer() {
        let moderator = claims(&[MODERATOR_ROLE]);
        assert!(Policy::ModeratePhotoRole.allows(&moderator));
        assert!(!Policy::RequireAdminRole.allows(&moderator));

        let admin = claims(&[ADMIN_ROLE]);
        assert!(Policy::ModeratePhotoRole.allows(&admin));
        assert!(Policy::RequireAdminRole.allows(&admin));

        assert!(!Policy::ModeratePhotoRole.allows(&claims(&["Member"])));
    }

    #[test]
    fn tokens_round_trip_and_reject_foreign_secrets() {
        let keys = AuthKeys::from_secret("s3cret");
        let token = keys.issue(7, "lisa", vec![MODERATOR_ROLE.into()]).unwrap();

        let decoded = keys.verify(&token).unwrap();
        assert_eq!(decoded.sub, 7);
        assert_eq!(decoded.roles, vec![MODERATOR_ROLE]);

        assert!(AuthKeys::from_secret("other").verify(&token).is_err());
    }
}

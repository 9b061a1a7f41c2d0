use std::str::FromStr;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use jsonwebtoken::{decode, DecodingKey, TokenData, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_number_from_string;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub exp: u64,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// Verifies the bearer token and makes the caller available as an
/// `Extension<User>` to every route behind it.
pub async fn auth_middleware(
    State(signing_key): State<Secret<String>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| ApiError::AuthError("bearer token missing".to_string()))?;

    let token = decode_jwt(bearer.token(), &signing_key).map_err(|e| {
        tracing::warn!(?e, "JWT decoding error");
        ApiError::AuthError("invalid token".to_string())
    })?;

    let id = Uuid::from_str(&token.claims.user_id)
        .map_err(|_| ApiError::AuthError("token subject is not a user id".to_string()))?;
    let user = User {
        id,
        username: token.claims.username,
    };
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

fn decode_jwt(
    token: &str,
    signing_key: &Secret<String>,
) -> jsonwebtoken::errors::Result<TokenData<Claims>> {
    decode(
        token,
        &DecodingKey::from_secret(signing_key.expose_secret().as_ref()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
}

//! Bearer-token author identity.
//!
//! No token means an anonymous request; a token that fails validation is
//! rejected with 401. The author is bound to the request's task so the
//! document service can credit history versions without threading it through
//! every call.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use draftline_core::author::{AuthorIdentity, AuthorRef};
use jsonwebtoken::{decode, encode, Algorithm, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

tokio::task_local! {
    static CURRENT_AUTHOR: Option<AuthorRef>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Author id.
    pub sub: String,
    pub exp: usize,
}

/// Reads the author bound by [`authenticate`]. Outside a request it is
/// anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestAuthor;

impl AuthorIdentity for RequestAuthor {
    fn current_author(&self) -> Option<AuthorRef> {
        CURRENT_AUTHOR.try_with(Clone::clone).ok().flatten()
    }
}

pub async fn authenticate(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let author = match bearer {
        Some(TypedHeader(Authorization(bearer))) => {
            let token = decode::<Claims>(
                bearer.token(),
                state.decoding_key(),
                &Validation::new(Algorithm::HS256),
            )
            .map_err(|e| {
                tracing::warn!(error = %e, "JWT validation failed");
                ApiError::Unauthorized
            })?;
            Some(AuthorRef::new(token.claims.sub))
        }
        None => None,
    };
    tracing::debug!(author = ?author.as_ref().map(|a| &a.id), "request author");

    Ok(CURRENT_AUTHOR.scope(author, next.run(request)).await)
}

/// Sign an HS256 token for `sub`, valid for `ttl_secs`.
pub fn issue_token(
    secret: &str,
    sub: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = chrono::Utc::now().timestamp() + ttl_secs;
    let claims = Claims {
        sub: sub.to_string(),
        exp: usize::try_from(exp).unwrap_or_default(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

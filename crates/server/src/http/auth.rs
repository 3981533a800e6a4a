use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use deployment::Deployment;
use url::form_urlencoded;
use utils::response::ApiResponse;
use utils_jwt::{AccessClaims, TokenClaimsError, decode_access_token};
use uuid::Uuid;

use crate::DeploymentImpl;

/// The caller identity, inserted as a request extension once the token checks out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    fn from_claims(claims: AccessClaims, admin_role: &str) -> Self {
        Self {
            is_admin: claims.has_role(admin_role),
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_query_token(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_sse_events_endpoint(req: &Request) -> bool {
    // paths are relative to the nested `/api` router
    req.uri().path().starts_with("/events")
}

fn extract_request_token(req: &Request) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    if let Some(value) = req
        .headers()
        .get("x-api-token")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(value.to_string());
    }

    // EventSource cannot set headers
    if is_sse_events_endpoint(req) {
        return extract_query_token(req);
    }

    None
}

enum AuthFailure {
    MissingSecret,
    MissingToken,
    Invalid(TokenClaimsError),
}

impl AuthFailure {
    fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MissingSecret => "jwt_secret_not_configured",
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::Invalid(TokenClaimsError::Expired) => "token_expired",
            AuthFailure::Invalid(_) => "invalid_token",
        }
    }
}

// Takes the token rather than the request: `Body` is not `Sync`, so a
// `&Request` must not be held across the config lock.
async fn authenticate(
    deployment: &DeploymentImpl,
    token: Option<String>,
) -> Result<AuthUser, AuthFailure> {
    let (secret, admin_role) = {
        let config = deployment.config().read().await;
        (config.auth.jwt_secret.clone(), config.auth.admin_role.clone())
    };
    let secret = secret.ok_or(AuthFailure::MissingSecret)?;
    let token = token.ok_or(AuthFailure::MissingToken)?;
    let claims = decode_access_token(&token, &secret).map_err(AuthFailure::Invalid)?;
    Ok(AuthUser::from_claims(claims, &admin_role))
}

fn unauthorized() -> Response {
    let response = ApiResponse::<()>::error("Unauthorized");
    (StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

/// Rejects the request with 401 unless it carries a valid access token.
pub async fn require_user(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_request_token(&req);
    match authenticate(&deployment, token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(failure) => {
            if matches!(failure, AuthFailure::MissingSecret) {
                tracing::warn!("auth.jwtSecret is not configured; rejecting authenticated routes");
            }
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                reason = failure.reason(),
                "Unauthorized API request"
            );
            unauthorized()
        }
    }
}

/// Attaches the caller when a valid token is present, otherwise passes the
/// request through anonymously.
pub async fn attach_user(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_request_token(&req);
    match authenticate(&deployment, token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
        }
        Err(AuthFailure::Invalid(err)) => {
            tracing::debug!(error = %err, "ignoring invalid token on public route");
        }
        Err(_) => {}
    }
    next.run(req).await
}

/// Layered inside `require_user`; only admins get through.
pub async fn require_admin(req: Request, next: Next) -> Response {
    let Some(user) = req.extensions().get::<AuthUser>() else {
        return unauthorized();
    };
    if !user.is_admin {
        tracing::warn!(
            user_id = %user.user_id,
            path = %req.uri().path(),
            "Forbidden admin request"
        );
        let response = ApiResponse::<()>::error("Admin access required");
        return (StatusCode::FORBIDDEN, Json(response)).into_response();
    }
    next.run(req).await
}

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{adapters::http::app_state::AppState, app_error::AppError, jwt};

/// Admin back-office guard: a valid HS256 bearer token with the admin role.
///
/// Verified claims are inserted into the request extensions.
pub async fn require_admin(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::InvalidCredentials)?;
    let claims = jwt::verify_admin(token, &app_state.config.admin_jwt_secret)?;

    if !claims.is_admin() {
        tracing::warn!(sub = %claims.sub, role = %claims.role, "Non-admin token on admin route");
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use genline_core::{CallerRole, RequestContext};
use http::HeaderMap;

use crate::error::ApiError;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header naming the subscription to debit
pub const SUBSCRIPTION_ID_HEADER: &str = "x-subscription-id";
/// Header carrying the caller role
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Middleware that builds a [`RequestContext`] from identity headers
///
/// The authentication layer in front of Genline sets these headers.
/// Requests without a user id are rejected with 401.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let Some(context) = context_from_headers(request.headers()) else {
        return ApiError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn context_from_headers(headers: &HeaderMap) -> Option<RequestContext> {
    let user_id = header(headers, USER_ID_HEADER)?;
    let mut context = RequestContext::user(user_id);

    if let Some(subscription_id) = header(headers, SUBSCRIPTION_ID_HEADER) {
        context = context.with_subscription(subscription_id);
    }

    context.role = header(headers, USER_ROLE_HEADER).map_or_else(CallerRole::user, |role| CallerRole(role.to_owned()));

    Some(context)
}

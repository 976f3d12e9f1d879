//! Authentication extractors
//!
//! Custom extractors rather than middleware, so each route states the
//! credential class it accepts. The verifier does the actual work; these
//! only pull the header and map failures to API errors.

use crate::api::server::AppContext;
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use mimg_common::auth::Principal;

/// Requires an operator override token or admin key (Bearer)
pub struct AdminAuth(pub Principal);

/// Requires any end-user credential: Bearer user/admin key or Basic
pub struct UserAuth(pub Principal);

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let principal = ctx.verifier.verify_admin(header).await?;
        Ok(AdminAuth(principal))
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let principal = ctx.verifier.verify_user(header).await?;
        Ok(UserAuth(principal))
    }
}

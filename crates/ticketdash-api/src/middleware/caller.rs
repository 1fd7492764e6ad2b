//! Caller context middleware.
//!
//! The service sits behind a gateway that authenticates users and forwards
//! the acting guild and user as `x-guild-id` and `x-user-id`. This layer
//! parses them into a [`Caller`] request extension and rejects requests
//! without them.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use tracing::debug;

use ticketdash_server::Caller;

use crate::errors::ApiError;

pub const GUILD_ID_HEADER: &str = "x-guild-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Layer that requires caller headers on every request.
#[derive(Clone, Default)]
pub struct CallerLayer;

impl CallerLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CallerLayer {
    type Service = CallerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CallerService { inner }
    }
}

#[derive(Clone)]
pub struct CallerService<S> {
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for CallerService<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let caller = match caller_from_headers(request.headers()) {
            Ok(caller) => caller,
            Err(message) => {
                debug!(reason = message, "rejecting request without caller context");
                return Box::pin(async move { Ok(ApiError::unauthenticated(message).into_response()) });
            }
        };

        request.extensions_mut().insert(caller);
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

/// Parses the caller headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, &'static str> {
    let guild_id = snowflake(headers, GUILD_ID_HEADER)
        .ok_or("missing or invalid x-guild-id header")?;
    let user_id = snowflake(headers, USER_ID_HEADER)
        .ok_or("missing or invalid x-user-id header")?;
    Ok(Caller::new(guild_id, user_id))
}

fn snowflake(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

//! Core type definitions and aliases used throughout the SentinAI middleware.
//!
//! This module provides the type aliases that pin down the hosting seam: the request
//! and response types the filter operates on, and the boxed function types used to
//! compose the middleware chain. Hiding the generic parameters behind aliases keeps
//! the rest of the crate readable and makes the crate droppable into any hyper-based
//! stack that uses the same shapes.
//!
//! # Examples
//!
//! ```rust
//! use sentinai::types::{Request, Response};
//! use sentinai::body::SentinBody;
//!
//! async fn handler(req: Request) -> Response {
//!     Response::new(SentinBody::from("Hello, World!"))
//! }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::combinators::UnsyncBoxBody;

use crate::{body::SentinBody, middleware::Next};

/// HTTP request type flowing through the filter.
///
/// Requests carry a [`SentinBody`] rather than a raw streaming body so the filter can
/// buffer, inspect, and re-inject the payload before the downstream handler reads it.
pub type Request = http::Request<SentinBody>;

/// HTTP response type produced by the downstream handler and the filter itself.
pub type Response = http::Response<SentinBody>;

/// Boxed HTTP body type for internal request/response handling.
pub(crate) type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

/// Boxed error type for thread-safe error handling.
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed middleware function type for dynamic middleware composition.
///
/// A middleware takes the request and the remaining chain and resolves to a response.
/// The security filter is exposed in exactly this shape (see
/// [`IntoMiddleware`](crate::middleware::IntoMiddleware)).
pub type BoxMiddleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Type-erased downstream endpoint invoked once the chain is exhausted.
pub type BoxHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Authenticated principal resolved by the host framework.
///
/// When the host's authentication layer has already identified the caller, it inserts
/// this extension into the request; the filter prefers it over credential parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

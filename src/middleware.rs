//! Middleware chain plumbing the security filter mounts into.
//!
//! The host frames its request path as a stack of middleware functions terminated by an
//! endpoint handler. `Next` carries the remainder of that stack; calling `run` advances
//! through it. [`IntoMiddleware`] is the conversion seam: the security filter implements
//! it, so mounting the filter is one `into_middleware()` call away regardless of how the
//! host stores its chain.
//!
//! # Examples
//!
//! ```rust
//! use sentinai::{middleware::Next, types::{Request, Response}};
//!
//! async fn logging_middleware(req: Request, next: Next) -> Response {
//!     println!("processing {}", req.uri());
//!     next.run(req).await
//! }
//! ```

use std::{future::Future, pin::Pin, sync::Arc};

use crate::types::{BoxHandler, BoxMiddleware, Request, Response};

/// Trait for converting types into middleware functions.
///
/// Implementors produce a cloneable async function from `(Request, Next)` to
/// `Response`. The [`SecurityFilter`](crate::filter::SecurityFilter) implements this so
/// hosts can mount the whole detection pipeline as one middleware.
pub trait IntoMiddleware {
    fn into_middleware(
        self,
    ) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>>
    + Clone
    + Send
    + Sync
    + 'static;
}

/// Represents the next step in the middleware execution chain.
pub struct Next {
    /// Remaining middlewares to be executed in the chain.
    pub middlewares: Arc<Vec<BoxMiddleware>>,
    /// Final endpoint handler to be called after all middlewares.
    pub endpoint: BoxHandler,
}

impl Next {
    /// Executes the next middleware or the endpoint if the chain is exhausted.
    pub async fn run(self, req: Request) -> Response {
        if let Some((mw, rest)) = self.middlewares.split_first() {
            let rest = Arc::new(rest.to_vec());
            mw(
                req,
                Next {
                    middlewares: rest,
                    endpoint: self.endpoint.clone(),
                },
            )
            .await
        } else {
            (self.endpoint)(req).await
        }
    }
}

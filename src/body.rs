//! HTTP request and response body handling for the filter's buffering needs.
//!
//! `SentinBody` is a boxed body wrapper in the same mold as the hosting frameworks it
//! slots into: any `http_body::Body` can be type-erased into it, and buffered bytes go
//! back in through the `From` conversions. The filter collects a body once, hands the
//! bytes to the detection pipeline, and re-injects them so the downstream handler still
//! sees the full payload.
//!
//! # Examples
//!
//! ```rust
//! use sentinai::body::SentinBody;
//! use bytes::Bytes;
//!
//! let empty = SentinBody::empty();
//! let text = SentinBody::from("{\"ok\":true}");
//! let raw = SentinBody::from(Bytes::from_static(b"payload"));
//! ```

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::body::{Body, Frame, SizeHint};

use crate::types::{BoxBody, BoxError};

/// Unified body type for requests entering and responses leaving the filter.
pub struct SentinBody(BoxBody);

impl SentinBody {
    /// Wraps any body implementation, erasing its concrete type.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(|e| e.into()).boxed_unsync())
    }

    /// Creates a body that immediately signals end-of-stream.
    pub fn empty() -> Self {
        Self::new(Empty::new())
    }
}

impl Default for SentinBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for SentinBody {
    fn from(buf: &str) -> Self {
        Self::new(http_body_util::Full::from(buf.to_owned()))
    }
}

macro_rules! body_from_impl {
    ($ty:ty) => {
        impl From<$ty> for SentinBody {
            fn from(buf: $ty) -> Self {
                Self::new(http_body_util::Full::from(buf))
            }
        }
    };
}

body_from_impl!(String);
body_from_impl!(Vec<u8>);
body_from_impl!(Bytes);

impl Body for SentinBody {
    type Data = Bytes;
    type Error = BoxError;

    #[inline]
    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.0).poll_frame(cx)
    }

    #[inline]
    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }

    #[inline]
    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }
}

//! Transport-independent request and response values.
//!
//! A `Request` is built once per inbound exchange and never mutated; the only
//! derived value is the copy the router produces with route params bound.
//! A `Response` is produced by a handler and handed back unmodified to the
//! transport, which emits it with `Response::into_http`.

pub mod request;
pub mod response;

pub use request::{Request, RequestBuilder, UploadedFile};
pub use response::Response;

pub use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

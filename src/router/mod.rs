//! # Router Module
//!
//! Matches a method and path to a registered handler.
//!
//! Patterns are `/`-delimited; each segment is either a literal or a
//! `{name}` capture that binds exactly one non-empty path segment
//! (URL-decoded) into the request params. There is no tail capture.
//!
//! ## Dispatch order
//!
//! 1. Registered routes, in registration order; the first match wins.
//! 2. A regular file under the static root, if one is configured.
//!    Paths escaping the root fall through silently.
//! 3. The not-found handler, else a default 404.
//!
//! ```rust,ignore
//! let mut router = Router::new().static_root("public");
//! router.get("/c/{slug}", show_community)?;
//! let response = router.dispatch(request).await?;
//! ```

mod core;
mod handler;
mod pattern;
mod static_files;

pub use self::core::Router;
pub use handler::{BoxedHandler, Handler};
pub use pattern::{Pattern, RouteError};
pub use static_files::StaticFiles;

pub mod cli;
pub mod config;
pub mod context;
pub mod csrf;
pub mod database;
pub mod error;
pub mod http;
pub mod models;
pub mod router;
pub mod server;
pub mod session;

pub use context::RequestContext;
pub use csrf::CsrfGuard;
pub use error::HandlerError;
pub use http::{Request, Response};
pub use router::{Handler, Router};

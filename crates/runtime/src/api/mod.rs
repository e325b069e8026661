//! Thin HTTP boundary over the core runtime, gated behind the
//! `http-api` feature (spec §6.1: "the API layer translates core errors
//! into `application/problem+json`; core logic never constructs HTTP
//! status codes").

#[cfg(feature = "http-api")]
pub mod middleware;
#[cfg(feature = "http-api")]
pub mod routes;
#[cfg(feature = "http-api")]
pub mod server;
#[cfg(feature = "http-api")]
pub mod traits;
pub mod types;

#[cfg(feature = "http-api")]
pub use server::build_router;
#[cfg(feature = "http-api")]
pub use traits::RuntimeApiProvider;
pub use types::ProblemDetails;

//! Transport adapters above the shared `edgepay_pipeline::Pipeline`: an
//! axum HTTP server plus a line-delimited TCP listener, both exposing the
//! same operational endpoints (health, readiness, metrics, version,
//! transaction lookup).

mod http;
mod state;
mod tcp;

pub use http::{router, serve as serve_http};
pub use state::{authorized, RpcState};
pub use tcp::serve as serve_tcp;

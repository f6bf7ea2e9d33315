pub(crate) mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fc;
pub mod observability;
pub mod protocol;
pub mod routing;
pub mod state;
pub mod stream;
pub mod translate;
pub mod transport;

pub(crate) mod json_scan;
mod util;

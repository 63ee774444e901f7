//! # API Gateway Handler
//!
//! Maps ledger operations onto HTTP-style status codes and JSON bodies.
//!
//! ## Modules
//!
//! - `handler`: ApiGatewayHandler struct and methods
//! - `types`: Response and request body types

mod handler;
mod types;

pub use handler::{handle_api_query, ApiGatewayHandler, ApiQueryError};
pub use types::{ApiResponse, EntryView, ReferenceRequest, ReversalRequest};

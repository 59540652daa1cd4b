//! Pipeline Module - Inference orchestration
//!
//! A request moves through parse, input validation, inference with
//! attribution, and output validation. Each stage either hands an owned
//! value to the next or ends the request with a [`Rejected`].

pub mod context;
pub mod model;
pub mod orchestrator;
pub mod parse;


pub use context::ModelContext;
pub use orchestrator::{Pipeline, Rejected, Rejection};
pub use parse::DEFAULT_MAX_ROWS;

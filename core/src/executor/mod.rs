//! Executors: the three request shapes the HTTP front door dispatches
//! to, each selecting a backend, acquiring a pooled connection, and returning a
//! JSON-ready response without ever leaking the connection past its own scope.

mod command;
mod pipeline;
mod transaction;

pub use command::execute_command;
pub use pipeline::execute_pipeline;
pub use transaction::execute_transaction;

use std::time::Instant;

/// Milliseconds as an `f64`, the unit every response envelope reports timings in.
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

//! Distributes a submitted task across the agents in a run (spec §4.5).

mod error;
mod mode;
mod router;

pub use error::RouterError;
pub use mode::RouteMode;
pub use router::Router;

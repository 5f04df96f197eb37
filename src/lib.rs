//! Bounded purge queue with retrying CDN submission and a deadline-bounded
//! shutdown drain for OCSP response caches.
//!
//! Purge requests enter through [`PurgeService`], wait in a [`PurgeQueue`],
//! and are driven to a terminal outcome by a [`WorkerPool`] through a
//! [`RetryingSubmitter`]. On shutdown the [`DrainCoordinator`] closes intake
//! and produces the [`DrainReport`] that decides the process exit status.

mod config;
mod drain;
mod errors;
pub mod metrics;
mod purger;
mod queue;
mod service;
mod submitter;
mod upstream;
mod utils;
mod worker;

pub use config::*;
pub use drain::*;
pub use errors::*;
pub use purger::*;
pub use queue::*;
pub use service::*;
pub use submitter::*;
pub use upstream::*;
pub use worker::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;

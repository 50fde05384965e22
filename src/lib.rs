//! Publishing of APT archives: pool placement, domination, index and
//! Release generation, and content-addressed by-hash trees.

pub mod by_hash;
pub mod clock;
pub mod config;
pub mod database;
pub mod dominator;
pub mod error;
pub mod index_writer;
pub mod logging;
pub mod model;
pub mod pool;
pub mod publisher;
pub mod registry;
pub mod release_writer;
pub mod signing;
pub mod store;

pub use error::{PoolError, PublisherError, PublisherResult};
pub use publisher::{CarefulFlags, Publisher, RunSummary};

// Library exports for the terminal front end and integration tests

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod logging;
pub mod review;
pub mod shutdown;
pub mod sync;
pub mod upload_queue;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub mod batch;
pub mod config;
pub mod handler;
pub mod metrics;
pub mod prober;
pub mod server;
pub mod util;

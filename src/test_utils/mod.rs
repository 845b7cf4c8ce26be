//! Test utilities: an in-memory simulated coordination service and
//! recording listeners.

mod listeners;
mod sim_cluster;

pub use listeners::*;
pub use sim_cluster::*;

use once_cell::sync::Lazy;

static LOGGER: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

/// Ensure the test logger is only initialized once.
pub fn init_logging() {
    Lazy::force(&LOGGER);
}

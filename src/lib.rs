//! Typed expression trees for genetic programming.
//!
//! - `gp`: typed trees, their evaluation, generation, structural operators and text form.
//! - `ga`: a generic, threaded genetic algorithm driver.
//! - `config`: run-time configuration, loadable from TOML.

pub mod config;
pub mod error;
pub mod ga;
pub mod gp;

pub use error::{Error, Result};

#[cfg(test)]
pub mod test_utils {
    /// Route `tracing` output through the test harness. Set `RUST_LOG` to filter it.
    ///
    /// Safe to call from every test, only the first call installs the subscriber.
    pub fn init_test_logging() {
        use tracing_subscriber::{fmt, EnvFilter};

        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}

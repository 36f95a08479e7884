pub mod config;
pub mod error;
pub mod kernel;
pub mod services;

// Entry points for the console binary and tests.
pub use config::MonitorConfig;
pub use error::{ClientError, Operation};
pub use kernel::reactor::Reactor;
pub use services::assessment::{AssessmentBackend, AssessmentClient};

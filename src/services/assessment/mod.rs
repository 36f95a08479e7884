pub mod client;
pub mod types;

pub use client::{frame_url, AssessmentBackend, AssessmentClient};
pub use types::*;

//! The merge pipeline: concatenation, trailer page and per-job artifacts.

pub mod job;
pub mod merger;
pub mod trailer;

pub use job::MergeJob;
pub use merger::{MergeOutcome, Merger};
pub use trailer::{TrailerContent, TrailerGenerator};

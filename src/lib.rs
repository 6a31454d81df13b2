//! Copies CSV objects from one S3 location to another with a fixed set of
//! fields removed from every record.

pub mod aws;
pub mod config;
pub mod csvchunker;
pub mod error;
pub mod job;
pub mod logging;
pub mod parser;
pub mod redact;
pub mod store;
pub mod testdata;

pub use config::{JobArgs, JobConfig};
pub use error::{Error, Result};
pub use job::{redact_and_copy, CopyOptions, CopyStats, Job, JobReport};
pub use redact::{MissingFieldPolicy, RedactionSet};
pub use store::{MemoryStore, ObjectLocation, ObjectStore};

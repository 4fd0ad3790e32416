//! rust-denoise library crate.
//!
//! An HTTP service that runs audio through an ffmpeg decode, an RNNoise
//! denoise pass and an optional ffmpeg encode, with bounded concurrency and
//! per-job scratch directories. Exposed as a library for integration testing.

pub mod admission;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod utils;
pub mod workspace;

pub use error::{Error, ErrorKind, Result};

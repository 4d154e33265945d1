//! Calibration resolution and measurement orchestration.
//!
//! Takes a loosely specified measurement request, works out which
//! calibration strategy applies, validates that strategy's parameters,
//! runs the external measurement computation once under a hard timeout,
//! and assembles the uniform response envelope. The computation itself is
//! an opaque child process.

pub mod artifacts;
pub mod calibration;
pub mod config;
pub mod depth_map;
pub mod error;
pub mod invocation;
pub mod measurement;
pub mod request;
pub mod response;
pub mod scripting;
pub mod service;
pub mod types;
pub mod validation;

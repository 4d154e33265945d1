//! External measurement computation: process execution and invocation.
//!
//! [`subprocess`] owns spawning, output capture and the hard timeout.
//! [`invoker::MeasurementInvoker`] runs one [`InvocationSpec`](crate::invocation::InvocationSpec)
//! and classifies the outcome against the result contract.

pub mod executor;
pub mod invoker;
pub mod subprocess;

pub use executor::{ProcessExecutor, ProcessInput, ProcessOutput, ScriptError, SystemExecutor};
pub use invoker::MeasurementInvoker;

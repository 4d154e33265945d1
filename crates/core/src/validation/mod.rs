//! Request validation -- pure logic, no I/O.
//!
//! [`validate_request`] checks every field it can and reports all
//! violations at once. Method-specific requirements (which parameters a
//! chosen method needs) are enforced later by the resolver.

pub mod errors;
pub mod request;

pub use errors::FieldErrors;
pub use request::{validate_request, DepthPayload, ValidatedRequest};

//! Request middleware.
//!
//! [`Trace`] wraps the whole application; [`Admission`] wraps the
//! tenant-scoped route tree.

pub mod admission;
pub mod trace;

pub use admission::Admission;
pub use trace::Trace;

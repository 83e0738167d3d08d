//! Outbound adapters implementing the domain's driven ports.
//!
//! - **persistence**: PostgreSQL repositories using Diesel ORM
//! - **memory**: in-process store used when no database is configured
//!
//! Adapters translate between domain types and storage representations.
//! They contain no business logic.

pub mod memory;
pub mod persistence;

//! Services layer (ports + adapters).
//!
//! - `ports`: contracts for the external collaborators (sandbox runtime,
//!   project store, editor surface).
//! - `adapters`: concrete implementations backed by the local OS.

pub mod adapters;
pub mod ports;

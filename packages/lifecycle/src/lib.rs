#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident lifecycle rules.
//!
//! Everything in this crate is pure: no I/O, no clocks. The store calls
//! [`reliability::evaluate`] inside its vote transaction, and clients run
//! [`merge::merge`] followed by [`expiry::is_current`] on every refresh.

pub mod expiry;
pub mod merge;
pub mod reliability;

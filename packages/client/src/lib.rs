#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client core for road-watch.
//!
//! [`api::ApiClient`] talks to the road-watch API server.
//! [`board::IncidentBoard`] holds what a map screen shows: local incidents
//! merged with the third-party feed, filtered by expiry each time it is
//! read.

pub mod api;
pub mod board;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from the road-watch API, split by what the caller can do about
/// them.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the input (HTTP 400).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The incident does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("Server error ({status}): {message}")]
    Server {
        /// The response status.
        status: StatusCode,
        /// Message from the error body, or the raw body.
        message: String,
    },

    /// Transport failure or undecodable response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

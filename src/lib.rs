//! Client for the WildTrax environmental-sensor platform.
//!
//! Two pipelines sit behind [`app::WildTrax`]:
//! - bulk report exports, downloaded as a zip archive, unpacked into scratch
//!   space and parsed into [`table::ReportTable`]s;
//! - data-discovery queries, returning per-project counts and per-location
//!   counts for a list of species, optionally inside a polygon boundary.
//!
//! Every remote call needs an unexpired token; call
//! [`app::WildTrax::authenticate`] first. Tokens are never refreshed implicitly.

#![forbid(unsafe_code)]

pub mod api;
pub mod app;
pub mod archive;
pub mod auth;
pub mod config;
pub mod discover;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod media;
pub mod report;
pub mod species;
pub mod table;

pub use app::WildTrax;
pub use error::{ErrorKind, WildtraxError};

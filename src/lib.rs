#![forbid(unsafe_code)]

//! Shared pieces of the xgrab service: post URL handling, format ranking,
//! the extraction cache, cookie-jar conversion and the HTTP router.
//!
//! The binaries in `src/bin` are thin wrappers that load configuration and
//! wire these modules together.

pub mod cache;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod logging;
pub mod post_url;
pub mod server;
pub mod supervisor;
pub mod video;
pub mod watcher;

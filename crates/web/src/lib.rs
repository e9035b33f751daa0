//! dashcheck static file server
//!
//! Serves a dashboard's static assets over plain HTTP so a headless browser
//! can load it. No application logic lives here.

pub mod static_files;

pub use static_files::{router, serve, serve_listener, shutdown_signal};

#![forbid(unsafe_code)]

//! Layered CSS injection for web pages
//!
//! [`compositor`] flattens the stored configuration into one stylesheet per
//! hostname, [`dispatcher`] delivers it to tabs, and [`page`] holds the
//! content-side applicator, picker and drag repositioner. The binary runs
//! the background side as a browser native messaging host
//! ([`native_host`]).

pub mod compositor;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod host;
pub mod ipc;
pub mod native_host;
pub mod page;

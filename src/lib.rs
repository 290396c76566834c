//! vhostd - virtual-hosting HTTP/1.x server
//!
//! Requests are parsed incrementally, matched to a virtual host by their
//! Host header, routed through that host's resource tree and answered by a
//! static, dynamic or embedded handler.

pub mod config;
pub mod handlers;
pub mod http;
pub mod routing;
pub mod server;

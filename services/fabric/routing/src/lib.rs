//! Packet-in handling, path model and path resolution for the fabric.
//!
//! This crate provides the forwarding engine of the fabric controller: host
//! learning through a forwarding database, hop-by-hop path installation
//! with staggered idle timeouts, flooding restricted to action ports, and
//! the resolvers that turn two host attachment points into a hop list.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fdb;
pub mod path;
pub mod resolver;
pub mod router;

pub use error::*;
pub use fdb::*;
pub use path::*;
pub use resolver::*;
pub use router::*;

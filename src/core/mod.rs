//! Core configuration engine
//!
//! This module contains the pieces that do the actual work:
//!
//! - [`sysconfig`]: structure-preserving editor for the persisted
//!   key/value-and-array configuration format
//! - [`matcher`]: port matchers built from service definition fields
//! - [`services`]: the standard + HANA service definition catalogue and
//!   port-to-name resolution
//! - [`config`]: the firewall configuration model and the auto-discovery
//!   proposal algorithm
//! - [`discovery`]: read-only probes of sockets, installed instances and
//!   network interfaces
//! - [`error`]: error types for engine operations

pub mod config;
pub mod discovery;
pub mod error;
pub mod matcher;
pub mod services;
pub mod sysconfig;

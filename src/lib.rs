//! hanafw - SAP HANA host firewall configuration
//!
//! Discovers which HANA-related network services are active, maps ports to
//! service names, and maintains the `/etc/sysconfig/hana-firewall`
//! configuration file describing which services are permitted on which
//! network interfaces. Packet rules themselves are applied by the external
//! `hana-firewall` program; this crate only computes and records the
//! service-to-interface permission data.
//!
//! # Architecture
//!
//! - [`core`] - Configuration engine: sysconfig editor, port matchers,
//!   service catalogue, configuration model, discovery probes
//! - [`command`] - Wrappers around the external firewall program and the
//!   systemd service manager
//! - [`validators`] - Input validation for user-supplied values

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]

pub mod command;
pub mod core;
pub mod validators;

// Re-export commonly used types
pub use crate::core::config::{AutoConfigInputs, AutoConfigProposal, HanaFirewallConfig};
pub use crate::core::error::{Error, Result};
pub use crate::core::matcher::PortMatcher;
pub use crate::core::services::{Origin, Protocol, ServiceCatalogue};
pub use crate::core::sysconfig::SysconfigEditor;

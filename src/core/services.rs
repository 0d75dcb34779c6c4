//! Service definition catalogue
//!
//! Two sources feed the catalogue: the host services database
//! (`/etc/services`-style `name port/proto` lines) and a directory of HANA
//! service definition files, one file per service, written in the same
//! sysconfig syntax as the main configuration (`TCP`/`UDP` keys holding
//! whitespace-separated port fields).
//!
//! Port resolution gives HANA definitions precedence over standard ones, so
//! a HANA firewall rule wins naming conflicts with whatever the services
//! database calls the same port.

use crate::core::error::Result;
use crate::core::matcher::PortMatcher;
use crate::core::sysconfig::SysconfigEditor;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Default location of the host services database.
pub const SERVICES_DB_PATH: &str = "/etc/services";
/// Default location of the HANA service definition files.
pub const DEFINITIONS_DIR: &str = "/etc/hana-firewall";

/// Transport protocol of a port definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Protocol {
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
}

/// Where a resolved service name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Hana,
    Standard,
}

/// Port matchers of one service, split by protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePorts {
    pub tcp: Vec<PortMatcher>,
    pub udp: Vec<PortMatcher>,
}

impl ServicePorts {
    fn for_protocol(&self, protocol: Protocol) -> &[PortMatcher] {
        match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        }
    }
}

/// Name -> matcher mapping that keeps first-seen order, so port resolution
/// walks services in the order their source enumerated them.
#[derive(Debug, Clone, Default)]
struct ServiceTable {
    order: Vec<String>,
    by_name: HashMap<String, ServicePorts>,
}

impl ServiceTable {
    fn entry_mut(&mut self, name: &str) -> &mut ServicePorts {
        if !self.by_name.contains_key(name) {
            self.order.push(name.to_owned());
        }
        self.by_name.entry(name.to_owned()).or_default()
    }

    fn insert(&mut self, name: String, ports: ServicePorts) {
        if !self.by_name.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.by_name.insert(name, ports);
    }

    fn get(&self, name: &str) -> Option<&ServicePorts> {
        self.by_name.get(name)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &ServicePorts)> {
        self.order
            .iter()
            .filter_map(|name| Some((name.as_str(), self.by_name.get(name)?)))
    }
}

/// The combined standard + HANA service definition mapping.
///
/// Built once at startup and immutable thereafter; re-read only by
/// constructing a new catalogue.
#[derive(Debug, Clone)]
pub struct ServiceCatalogue {
    standard: ServiceTable,
    hana: ServiceTable,
}

impl ServiceCatalogue {
    /// Builds the catalogue from the host services database and the HANA
    /// definitions directory.
    ///
    /// Both sources are read as raw bytes and interpreted lossily, so
    /// invalid UTF-8 never fails the load. A missing definitions directory
    /// reads as "no HANA services"; an unreadable services database is a
    /// real I/O error.
    pub fn load(services_db: &Path, definitions_dir: &Path) -> Result<Self> {
        let db_raw = fs::read(services_db)?;
        let mut definitions: Vec<(String, String)> = Vec::new();
        match fs::read_dir(definitions_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let Ok(name) = entry.file_name().into_string() else {
                        continue;
                    };
                    if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
                        continue;
                    }
                    if !entry.path().is_file() {
                        continue;
                    }
                    match fs::read(entry.path()) {
                        Ok(raw) => {
                            definitions.push((name, String::from_utf8_lossy(&raw).into_owned()));
                        }
                        Err(err) => {
                            warn!(file = %entry.path().display(), %err, "skipping unreadable service definition");
                        }
                    }
                }
            }
            Err(err) => {
                warn!(dir = %definitions_dir.display(), %err, "no HANA service definitions found");
            }
        }
        Ok(Self::from_text(
            &String::from_utf8_lossy(&db_raw),
            definitions,
        ))
    }

    /// Builds the catalogue from already-loaded texts. Definition files are
    /// enumerated in lexicographic name order regardless of input order.
    pub fn from_text(services_db: &str, mut definitions: Vec<(String, String)>) -> Self {
        let mut standard = ServiceTable::default();
        for line in services_db.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            let Ok(protocol) = proto.parse::<Protocol>() else {
                continue;
            };
            let Ok(matcher) = PortMatcher::from_field(port) else {
                debug!(name, port, "skipping unparseable services database entry");
                continue;
            };
            let ports = standard.entry_mut(name);
            match protocol {
                Protocol::Tcp => ports.tcp.push(matcher),
                Protocol::Udp => ports.udp.push(matcher),
            }
        }

        definitions.sort_by(|a, b| a.0.cmp(&b.0));
        let mut hana = ServiceTable::default();
        for (name, text) in definitions {
            hana.insert(name, Self::interpret_definition(&text));
        }

        Self { standard, hana }
    }

    /// Parses the `TCP` and `UDP` keys of one definition file into matcher
    /// lists. Absent keys yield empty lists; unparseable fields are skipped.
    pub fn interpret_definition(text: &str) -> ServicePorts {
        let conf = SysconfigEditor::new(text);
        let parse = |key: &str| -> Vec<PortMatcher> {
            conf.get(key)
                .split_whitespace()
                .filter_map(|field| match PortMatcher::from_field(field) {
                    Ok(matcher) => Some(matcher),
                    Err(err) => {
                        debug!(key, field, %err, "skipping unparseable port field");
                        None
                    }
                })
                .collect()
        };
        ServicePorts {
            tcp: parse("TCP"),
            udp: parse("UDP"),
        }
    }

    /// Resolves a live port number to a known service name.
    ///
    /// HANA services are searched first, then standard services, each in
    /// their enumeration order; the first matcher hit wins.
    pub fn find_port(&self, port: u16, protocol: Protocol) -> Option<(Origin, &str)> {
        let port = port.to_string();
        for (origin, table) in [(Origin::Hana, &self.hana), (Origin::Standard, &self.standard)] {
            for (name, ports) in table.iter() {
                if ports
                    .for_protocol(protocol)
                    .iter()
                    .any(|m| m.matches(&port))
                {
                    return Some((origin, name));
                }
            }
        }
        None
    }

    /// All HANA service names, sorted lexicographically with case
    /// preserved.
    pub fn hana_service_names(&self) -> Vec<String> {
        // Enumeration order is already sorted by construction.
        self.hana.order.clone()
    }

    /// Matchers of one standard service, if known.
    pub fn standard_service(&self, name: &str) -> Option<&ServicePorts> {
        self.standard.get(name)
    }

    /// Matchers of one HANA service, if known.
    pub fn hana_service(&self, name: &str) -> Option<&ServicePorts> {
        self.hana.get(name)
    }
}

//! Read-only system probes feeding auto-configuration
//!
//! Everything here degrades gracefully: an unreadable socket table, a
//! missing SAP directory or an empty sysfs all read back as "nothing
//! found", never as an error. Auto-configuration is a best-effort proposal
//! and must not fail just because a probe came up empty.

use crate::core::services::{Origin, Protocol, ServiceCatalogue};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Where installed HANA instances leave their on-disk markers
/// (`/usr/sap/<SID>/HDB<NN>`).
pub const SAP_ROOT: &str = "/usr/sap";

/// Socket table state meaning "TCP listener".
const TCP_LISTEN: &str = "0A";
/// Socket table state of an unconnected (listening) UDP socket.
const UDP_LISTEN: &str = "07";

/// Returns the local ports of all any-address listening sockets.
pub fn listening_ports() -> Vec<(u16, Protocol)> {
    let mut ports = Vec::new();
    for (path, protocol, state) in [
        ("/proc/net/tcp", Protocol::Tcp, TCP_LISTEN),
        ("/proc/net/tcp6", Protocol::Tcp, TCP_LISTEN),
        ("/proc/net/udp", Protocol::Udp, UDP_LISTEN),
        ("/proc/net/udp6", Protocol::Udp, UDP_LISTEN),
    ] {
        match fs::read_to_string(path) {
            Ok(table) => {
                ports.extend(parse_socket_table(&table, state).into_iter().map(|p| (p, protocol)));
            }
            Err(err) => {
                // Treated as "no sockets" - auto-discovery still proceeds.
                warn!(path, %err, "cannot read socket table");
            }
        }
    }
    ports
}

/// Extracts local ports from one `/proc/net/{tcp,udp}[6]` table, keeping
/// only sockets in the given state that are bound to the any address.
///
/// Table lines look like
/// `0: 00000000:0016 00000000:0000 0A ...` with the local address in hex;
/// the header and anything malformed is skipped.
pub fn parse_socket_table(table: &str, state: &str) -> Vec<u16> {
    let mut ports = Vec::new();
    for line in table.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let (Some(_sl), Some(local), Some(_remote), Some(st)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if st != state {
            continue;
        }
        let Some((addr, port_hex)) = local.rsplit_once(':') else {
            continue;
        };
        // Only sockets bound to the any address (v4 or v6) are visible to
        // remote peers on every interface.
        if !addr.chars().all(|c| c == '0') {
            continue;
        }
        if let Ok(port) = u16::from_str_radix(port_hex, 16) {
            ports.push(port);
        }
    }
    ports
}

/// Resolves the live listening sockets through the catalogue and returns
/// the names of running HANA services, sorted and deduplicated.
pub fn running_hana_services(catalogue: &ServiceCatalogue) -> Vec<String> {
    hana_services_for_ports(catalogue, &listening_ports())
}

/// Pure half of [`running_hana_services`].
pub fn hana_services_for_ports(
    catalogue: &ServiceCatalogue,
    ports: &[(u16, Protocol)],
) -> Vec<String> {
    let mut names: Vec<String> = ports
        .iter()
        .filter_map(|&(port, protocol)| match catalogue.find_port(port, protocol) {
            Some((Origin::Hana, name)) => Some(name.to_owned()),
            _ => None,
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Enumerates installed HANA instances from their `/usr/sap` markers.
pub fn installed_hana_instances() -> Vec<String> {
    installed_hana_instances_in(Path::new(SAP_ROOT))
}

/// Walks `root/<SID>/HDB<NN>` markers and yields `SIDNN` strings. IDs that
/// are not exactly three characters, or instance suffixes that are not two
/// digits, are ignored.
pub fn installed_hana_instances_in(root: &Path) -> Vec<String> {
    let mut instances = Vec::new();
    let Ok(entries) = fs::read_dir(root) else {
        return instances;
    };
    for entry in entries.flatten() {
        let Ok(sid) = entry.file_name().into_string() else {
            continue;
        };
        if sid.len() != 3
            || !sid.starts_with(|c: char| c.is_ascii_uppercase())
            || !sid.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            continue;
        }
        let Ok(children) = fs::read_dir(entry.path()) else {
            continue;
        };
        for child in children.flatten() {
            let Ok(name) = child.file_name().into_string() else {
                continue;
            };
            let Some(number) = name.strip_prefix("HDB") else {
                continue;
            };
            if number.len() == 2 && number.chars().all(|c| c.is_ascii_digit()) {
                instances.push(format!("{sid}{number}"));
            }
        }
    }
    instances.sort();
    instances.dedup();
    instances
}

/// Lists the interfaces eligible for firewall rules: everything in sysfs
/// except loopback, sorted and deduplicated.
pub fn eligible_interfaces() -> Vec<String> {
    eligible_interfaces_in(Path::new("/sys/class/net"))
}

pub fn eligible_interfaces_in(root: &Path) -> Vec<String> {
    let mut interfaces = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            match entry.file_name().into_string() {
                Ok(name) if name != "lo" => interfaces.push(name),
                _ => {}
            }
        }
    }
    interfaces.sort();
    interfaces.dedup();
    interfaces
}

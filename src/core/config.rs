//! Persisted firewall configuration model
//!
//! A structured view over the sysconfig file that records which HANA
//! systems exist on the host, whether SSH is globally allowed, and which
//! services each network interface may carry. The model keeps the backing
//! [`SysconfigEditor`] around so comments and unrelated keys survive a
//! load/serialize cycle untouched.
//!
//! Recognized keys:
//!
//! ```text
//! HANA_SYSTEMS="TTT00 UUU01"          # SID + instance number, sorted
//! OPEN_ALL_SSH="yes"
//! INTERFACE_0="eth0"                  # indexed array of interface names
//! INTERFACE_0_SERVICES="smtp ssh:10.0.0.0/24 HANA_DATABASE_CLIENT"
//! ```

use crate::core::sysconfig::{ScanAction, SysconfigEditor};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Default location of the persisted configuration.
pub const SYSCONFIG_PATH: &str = "/etc/sysconfig/hana-firewall";

/// Source value meaning "any address may use this service".
pub const ANY_SOURCE: &str = "0.0.0.0/0";

/// HANA service names with special roles during auto-configuration. When
/// the high-availability service is observed running, its two companions
/// are operationally required even if not yet listening.
pub const HIGH_AVAILABILITY: &str = "HANA_HIGH_AVAILABILITY";
pub const DATABASE_CLIENT: &str = "HANA_DATABASE_CLIENT";
pub const SYSTEM_REPLICATION: &str = "HANA_SYSTEM_REPLICATION";

/// Recognizes `INTERFACE_<digits>_SERVICES` keys, whatever the index.
fn is_interface_services_key(key: &str) -> bool {
    key.strip_prefix("INTERFACE_")
        .and_then(|rest| rest.strip_suffix("_SERVICES"))
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// One permitted service on an interface, with the source address or CIDR
/// block allowed to use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRule {
    pub service: String,
    pub source: String,
}

impl ServiceRule {
    /// Parses a `service[:source]` token; a missing source means any.
    fn parse(token: &str) -> Self {
        match token.split_once(':') {
            Some((service, source)) => Self {
                service: service.to_owned(),
                source: source.to_owned(),
            },
            None => Self {
                service: token.to_owned(),
                source: ANY_SOURCE.to_owned(),
            },
        }
    }

    /// Renders back to a token: bare name when the source is "any".
    fn render(&self) -> String {
        if self.source == ANY_SOURCE || self.source == "0.0.0.0" {
            self.service.clone()
        } else {
            format!("{}:{}", self.service, self.source)
        }
    }
}

/// Services permitted on one interface, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceRules {
    pub name: String,
    pub services: Vec<ServiceRule>,
}

impl InterfaceRules {
    pub fn has_service(&self, service: &str) -> bool {
        self.services.iter().any(|r| r.service == service)
    }

    /// Adds or updates a service permission.
    pub fn set_service(&mut self, service: &str, source: &str) {
        if let Some(rule) = self.services.iter_mut().find(|r| r.service == service) {
            rule.source = source.to_owned();
        } else {
            self.services.push(ServiceRule {
                service: service.to_owned(),
                source: source.to_owned(),
            });
        }
    }

    /// Removes a service permission. Returns whether it was present.
    pub fn remove_service(&mut self, service: &str) -> bool {
        let before = self.services.len();
        self.services.retain(|r| r.service != service);
        self.services.len() != before
    }
}

/// Discovery inputs feeding [`HanaFirewallConfig::generate_config`]. Filled
/// from the live system by `core::discovery`, or by hand in tests.
#[derive(Debug, Clone, Default)]
pub struct AutoConfigInputs {
    /// Installed HANA instances as `SIDNN` strings.
    pub installed_instances: Vec<String>,
    /// HANA service names currently listening on the host.
    pub running_services: Vec<String>,
    /// Interface names eligible for firewall rules (loopback excluded).
    pub interfaces: Vec<String>,
}

/// Proposed configuration produced by auto-discovery. A proposal only:
/// callers decide whether to adopt it before anything is written back.
#[derive(Debug, Clone)]
pub struct AutoConfigProposal {
    pub systems: Vec<String>,
    pub open_ssh: bool,
    pub interfaces: Vec<InterfaceRules>,
    /// Service names newly added anywhere, sorted and deduplicated, for
    /// caller approval.
    pub new_services: Vec<String>,
}

/// In-memory firewall configuration bound to its backing document.
#[derive(Debug, Clone)]
pub struct HanaFirewallConfig {
    doc: SysconfigEditor,
    pub systems: Vec<String>,
    pub open_ssh: bool,
    pub interfaces: Vec<InterfaceRules>,
}

impl Default for HanaFirewallConfig {
    fn default() -> Self {
        Self::load("")
    }
}

impl HanaFirewallConfig {
    /// Parses the persisted configuration text.
    pub fn load(text: &str) -> Self {
        let doc = SysconfigEditor::new(text);
        let systems = doc
            .get("HANA_SYSTEMS")
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        let open_ssh = doc.get("OPEN_ALL_SSH") == "yes";

        let mut interfaces: Vec<InterfaceRules> = Vec::new();
        for idx in 0..doc.array_len("INTERFACE") {
            let name = doc.array_get("INTERFACE", idx);
            if name.is_empty() {
                continue;
            }
            let services = doc
                .get(&format!("INTERFACE_{idx}_SERVICES"))
                .split_whitespace()
                .map(ServiceRule::parse)
                .collect();
            interfaces.push(InterfaceRules { name, services });
        }

        Self {
            doc,
            systems,
            open_ssh,
            interfaces,
        }
    }

    /// Reads and parses the configuration file. A missing file loads as an
    /// empty configuration.
    pub fn load_file(path: &Path) -> std::io::Result<Self> {
        let text = match fs::read(path) {
            Ok(raw) => String::from_utf8_lossy(&raw).into_owned(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err),
        };
        Ok(Self::load(&text))
    }

    /// Looks up the rules of one interface.
    pub fn interface(&self, name: &str) -> Option<&InterfaceRules> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Looks up or creates the rules of one interface.
    pub fn interface_mut(&mut self, name: &str) -> &mut InterfaceRules {
        let pos = match self.interfaces.iter().position(|i| i.name == name) {
            Some(pos) => pos,
            None => {
                self.interfaces.push(InterfaceRules {
                    name: name.to_owned(),
                    services: Vec::new(),
                });
                self.interfaces.len() - 1
            }
        };
        &mut self.interfaces[pos]
    }

    /// Serializes the configuration back to text.
    ///
    /// `HANA_SYSTEMS` is written sorted and space-joined; the `INTERFACE`
    /// array and the per-interface `_SERVICES` keys are torn down and
    /// rebuilt contiguously, dropping interfaces that carry no services.
    /// Unrelated lines keep their place.
    pub fn to_text(&mut self) -> String {
        let mut systems = self.systems.clone();
        systems.sort();
        self.doc.set("HANA_SYSTEMS", &systems.join(" "));
        self.doc
            .set("OPEN_ALL_SSH", if self.open_ssh { "yes" } else { "no" });

        // Tear down the old interface block. Every `INTERFACE_<n>_SERVICES`
        // scalar goes, including orphans whose index has no interface line.
        self.doc.scan(is_interface_services_key, |_, idx, _| {
            if idx.is_none() {
                ScanAction::DeleteContinue
            } else {
                ScanAction::Continue
            }
        });
        self.doc.array_resize("INTERFACE", 0);

        let mut idx = 0;
        for iface in &self.interfaces {
            if iface.services.is_empty() {
                continue;
            }
            let tokens: Vec<String> = iface.services.iter().map(ServiceRule::render).collect();
            self.doc.array_set("INTERFACE", idx, &iface.name);
            self.doc
                .set(&format!("INTERFACE_{idx}_SERVICES"), &tokens.join(" "));
            idx += 1;
        }

        self.doc.to_text()
    }

    /// Serializes and writes the configuration atomically: a temporary file
    /// in the target directory, then a rename over the destination.
    pub fn save_file(&mut self, path: &Path) -> std::io::Result<()> {
        let text = self.to_text();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        info!(path = %path.display(), "configuration written");
        Ok(())
    }

    /// Proposes a configuration from what is currently installed, running
    /// and cabled on the host.
    ///
    /// Without any installed HANA instance the proposal is the unchanged
    /// current state with an empty `new_services` list. Otherwise the
    /// instance list becomes the union of configured and installed
    /// instances, every eligible interface gains the currently-running HANA
    /// services it lacks (any source), and observing the high-availability
    /// service force-adds its companion services.
    pub fn generate_config(&self, inputs: &AutoConfigInputs) -> AutoConfigProposal {
        let mut proposal = AutoConfigProposal {
            systems: self.systems.clone(),
            open_ssh: self.open_ssh,
            interfaces: self.interfaces.clone(),
            new_services: Vec::new(),
        };
        if inputs.installed_instances.is_empty() {
            return proposal;
        }

        for instance in &inputs.installed_instances {
            if !proposal.systems.contains(instance) {
                proposal.systems.push(instance.clone());
            }
        }
        proposal.systems.sort();

        let mut added: Vec<String> = Vec::new();
        for name in &inputs.interfaces {
            let pos = match proposal.interfaces.iter().position(|i| &i.name == name) {
                Some(pos) => pos,
                None => {
                    proposal.interfaces.push(InterfaceRules {
                        name: name.clone(),
                        services: Vec::new(),
                    });
                    proposal.interfaces.len() - 1
                }
            };
            let iface = &mut proposal.interfaces[pos];
            let mut wanted: Vec<&str> =
                inputs.running_services.iter().map(String::as_str).collect();
            if inputs.running_services.iter().any(|s| s == HIGH_AVAILABILITY) {
                // HA implies these companions even before they listen.
                wanted.push(DATABASE_CLIENT);
                wanted.push(SYSTEM_REPLICATION);
            }
            for service in wanted {
                if !iface.has_service(service) {
                    iface.services.push(ServiceRule {
                        service: service.to_owned(),
                        source: ANY_SOURCE.to_owned(),
                    });
                    added.push(service.to_owned());
                }
            }
        }

        added.sort();
        added.dedup();
        proposal.new_services = added;
        proposal
    }

    /// Adopts a previously generated proposal.
    pub fn apply_proposal(&mut self, proposal: AutoConfigProposal) {
        self.systems = proposal.systems;
        self.open_ssh = proposal.open_ssh;
        self.interfaces = proposal.interfaces;
    }
}

//! hanafw - SAP HANA host firewall configuration tool
//!
//! Thin command-line shell over the configuration engine. All logic lives
//! in the library; this binary parses arguments, loads the catalogue and
//! the configuration, and prints results.
//!
//! # Usage
//!
//! ```bash
//! hanafw show                 # Print the parsed configuration
//! hanafw status               # Service and firewall status
//! hanafw autoconfig           # Propose rules from discovery (dry run)
//! hanafw autoconfig --write   # Adopt the proposal and persist it
//! hanafw add-system TTT00     # Register a HANA system
//! hanafw allow eth0 HANA_DATABASE_CLIENT --source 10.0.0.0/24
//! hanafw enable               # Enable the service and apply rules
//! hanafw disable              # Remove rules and disable the service
//! ```

use clap::{Parser, Subcommand};
use hanafw::command::{self, FirewallVerb};
use hanafw::core::config::{ANY_SOURCE, SYSCONFIG_PATH};
use hanafw::core::discovery;
use hanafw::core::services::{DEFINITIONS_DIR, SERVICES_DB_PATH};
use hanafw::validators;
use hanafw::{AutoConfigInputs, HanaFirewallConfig, ServiceCatalogue};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hanafw")]
#[command(about = "SAP HANA host firewall configuration", long_about = None)]
struct Cli {
    /// Path of the persisted configuration file
    #[arg(long, default_value = SYSCONFIG_PATH, global = true)]
    config: PathBuf,

    /// Directory holding the HANA service definition files
    #[arg(long, default_value = DEFINITIONS_DIR, global = true)]
    definitions: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the parsed configuration
    Show,
    /// Show service state and firewall status
    Status,
    /// Discover running HANA services and propose firewall rules
    Autoconfig {
        /// Adopt the proposal and write the configuration file
        #[arg(long)]
        write: bool,
    },
    /// Register a HANA system (SID plus instance number, e.g. TTT00)
    AddSystem {
        #[arg(value_parser = validators::validate_hana_system)]
        system: String,
    },
    /// Remove a HANA system from the configuration
    RemoveSystem { system: String },
    /// Set the global SSH-allow flag
    SetSsh {
        #[arg(value_parser = ["yes", "no"])]
        state: String,
    },
    /// Permit a service on an interface
    Allow {
        #[arg(value_parser = validators::validate_interface)]
        interface: String,
        service: String,
        /// Source address or CIDR block allowed to use the service
        #[arg(long, default_value = ANY_SOURCE, value_parser = validators::validate_source)]
        source: String,
    },
    /// Withdraw a service permission from an interface
    Disallow {
        interface: String,
        service: String,
    },
    /// Enable the firewall service and apply the rules
    Enable,
    /// Remove the rules and disable the firewall service
    Disable,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn require_root() -> Result<(), hanafw::Error> {
    if nix::unistd::getuid().is_root() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "this command must run as root",
        )
        .into())
    }
}

fn run(cli: &Cli) -> Result<ExitCode, hanafw::Error> {
    match &cli.command {
        Commands::Show => {
            let conf = HanaFirewallConfig::load_file(&cli.config)?;
            print_config(&conf);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let active = command::service_state();
            println!(
                "service: {}",
                if active { "active" } else { "inactive" }
            );
            let outcome = command::run_firewall(FirewallVerb::Status);
            print!("{}", outcome.output);
            Ok(if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Autoconfig { write } => {
            let write = *write;
            if write {
                require_root()?;
            }
            let catalogue =
                ServiceCatalogue::load(SERVICES_DB_PATH.as_ref(), &cli.definitions)?;
            let mut conf = HanaFirewallConfig::load_file(&cli.config)?;
            let inputs = AutoConfigInputs {
                installed_instances: discovery::installed_hana_instances(),
                running_services: discovery::running_hana_services(&catalogue),
                interfaces: discovery::eligible_interfaces(),
            };
            if inputs.installed_instances.is_empty() {
                println!("No HANA instance installed; nothing to propose.");
                return Ok(ExitCode::SUCCESS);
            }
            if inputs.interfaces.is_empty() {
                println!("No eligible network interfaces found.");
                return Ok(ExitCode::FAILURE);
            }
            let proposal = conf.generate_config(&inputs);
            if proposal.new_services.is_empty() {
                println!("Configuration already covers all running HANA services.");
            } else {
                println!("New services to permit: {}", proposal.new_services.join(" "));
            }
            if write {
                conf.apply_proposal(proposal);
                conf.save_file(&cli.config)?;
                println!("Configuration written to {}", cli.config.display());
            } else {
                println!("(dry run - pass --write to adopt)");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::AddSystem { system } => {
            let mut conf = HanaFirewallConfig::load_file(&cli.config)?;
            if conf.systems.contains(system) {
                println!("{system} is already configured");
            } else {
                conf.systems.push(system.clone());
                conf.save_file(&cli.config)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::RemoveSystem { system } => {
            let mut conf = HanaFirewallConfig::load_file(&cli.config)?;
            let before = conf.systems.len();
            conf.systems.retain(|s| s != system);
            if conf.systems.len() == before {
                eprintln!("{system} is not configured");
                return Ok(ExitCode::FAILURE);
            }
            conf.save_file(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::SetSsh { state } => {
            let mut conf = HanaFirewallConfig::load_file(&cli.config)?;
            conf.open_ssh = state == "yes";
            conf.save_file(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Allow {
            interface,
            service,
            source,
        } => {
            let mut conf = HanaFirewallConfig::load_file(&cli.config)?;
            conf.interface_mut(interface).set_service(service, source);
            conf.save_file(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Disallow { interface, service } => {
            let mut conf = HanaFirewallConfig::load_file(&cli.config)?;
            let removed = match conf.interfaces.iter_mut().find(|i| &i.name == interface) {
                Some(iface) => iface.remove_service(service),
                None => false,
            };
            if !removed {
                eprintln!("{service} is not permitted on {interface}");
                return Ok(ExitCode::FAILURE);
            }
            conf.save_file(&cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Enable => {
            require_root()?;
            let (ok, message) = command::set_state(true);
            print!("{message}");
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Disable => {
            require_root()?;
            let (ok, message) = command::set_state(false);
            print!("{message}");
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn print_config(conf: &HanaFirewallConfig) {
    println!("HANA systems:  {}", conf.systems.join(" "));
    println!(
        "Open all SSH:  {}",
        if conf.open_ssh { "yes" } else { "no" }
    );
    for iface in &conf.interfaces {
        println!("{}:", iface.name);
        if iface.services.is_empty() {
            println!("  (no services)");
        }
        for rule in &iface.services {
            println!("  {} from {}", rule.service, rule.source);
        }
    }
}

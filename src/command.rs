//! External collaborators: the `hana-firewall` command-line program and the
//! systemd service manager
//!
//! The engine never applies packet rules itself. It writes the
//! configuration file and delegates the actual firewall work to the
//! `hana-firewall` program and its systemd unit. Both are invoked through
//! narrow wrappers here; a missing binary is a distinct, recoverable
//! outcome (success flag false plus diagnostic text), never a panic.

use std::io;
use std::process::Command;
use tracing::{info, warn};

/// Name of the external firewall program and of its systemd unit.
pub const FIREWALL_PROGRAM: &str = "hana-firewall";

/// Verbs understood by the external firewall program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum FirewallVerb {
    #[strum(serialize = "status")]
    Status,
    #[strum(serialize = "apply")]
    Apply,
    #[strum(serialize = "unapply")]
    Unapply,
    #[strum(serialize = "generate-firewalld-services")]
    GenerateFirewalldServices,
}

/// Result of one external invocation: exit code 0 means success, anything
/// else (including "command not found") is failure with the combined
/// stdout/stderr text kept for diagnostics.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

fn run_capture(program: &str, args: &[&str]) -> CommandOutcome {
    match Command::new(program).args(args).output() {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            let success = output.status.success();
            if !success {
                warn!(program, ?args, code = ?output.status.code(), "external command failed");
            }
            CommandOutcome {
                success,
                output: text,
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(program, "external command not found");
            CommandOutcome {
                success: false,
                output: format!("{program}: command not found"),
            }
        }
        Err(err) => CommandOutcome {
            success: false,
            output: format!("{program}: {err}"),
        },
    }
}

/// Invokes the external firewall program with a single verb.
pub fn run_firewall(verb: FirewallVerb) -> CommandOutcome {
    info!(verb = verb.as_ref(), "invoking {FIREWALL_PROGRAM}");
    run_capture(FIREWALL_PROGRAM, &[verb.as_ref()])
}

/// Returns whether the firewall service is currently active.
pub fn service_state() -> bool {
    run_capture("systemctl", &["is-active", "--quiet", FIREWALL_PROGRAM]).success
}

/// One step of a state change: a `systemctl` verb against the firewall
/// unit, or a firewall program invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateStep {
    Service(&'static str),
    Firewall(FirewallVerb),
}

/// Ordered steps taken to enable or disable the firewall. Enabling
/// regenerates the firewalld service definitions before applying, so rules
/// always reflect the current definition files.
fn state_plan(enable: bool) -> &'static [(&'static str, StateStep)] {
    if enable {
        &[
            ("enable service", StateStep::Service("enable")),
            ("start service", StateStep::Service("start")),
            (
                "regenerate firewalld services",
                StateStep::Firewall(FirewallVerb::GenerateFirewalldServices),
            ),
            ("apply rules", StateStep::Firewall(FirewallVerb::Apply)),
        ]
    } else {
        &[
            ("remove rules", StateStep::Firewall(FirewallVerb::Unapply)),
            ("stop service", StateStep::Service("stop")),
            ("disable service", StateStep::Service("disable")),
        ]
    }
}

/// Enables and applies, or unapplies and disables, the firewall.
///
/// Returns a success flag and the combined diagnostic output of every step
/// taken. Steps after a failure are skipped so the caller sees the first
/// real problem, not follow-on noise.
pub fn set_state(enable: bool) -> (bool, String) {
    let mut transcript = String::new();
    for (step, action) in state_plan(enable) {
        let outcome = match *action {
            StateStep::Service(verb) => run_capture("systemctl", &[verb, FIREWALL_PROGRAM]),
            StateStep::Firewall(verb) => run_firewall(verb),
        };
        if !outcome.output.is_empty() {
            transcript.push_str(&outcome.output);
            if !transcript.ends_with('\n') {
                transcript.push('\n');
            }
        }
        if !outcome.success {
            transcript.push_str(&format!("failed to {step}\n"));
            return (false, transcript);
        }
    }
    (true, transcript)
}

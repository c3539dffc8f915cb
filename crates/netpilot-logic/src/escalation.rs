//! Escalation: open ports and nuke every server the player can take.
//!
//! Run as a traversal over the whole network. Servers already rooted are
//! skipped; the others are taken when the hacking level and the available
//! port openers allow it.

use crate::error::PilotError;
use crate::host::{Host, PortOpener};
use crate::traversal::{Traversal, TraversalContext};

/// Accumulator for [`escalate_node`]: what the player has, and what happened.
#[derive(Debug, Clone, Default)]
pub struct EscalationReport {
    pub hacking_level: u32,
    /// Port openers present on home, in unlock order.
    pub openers: Vec<PortOpener>,
    pub escalated: Vec<String>,
    pub level_too_low: Vec<String>,
    pub missing_tools: Vec<String>,
}

impl EscalationReport {
    /// Capture the player's current hacking level and tools.
    pub fn prepare<H>(host: &H) -> Self
    where
        H: Host + ?Sized,
    {
        Self {
            hacking_level: host.hacking_level(),
            openers: PortOpener::all()
                .iter()
                .copied()
                .filter(|o| host.has_program(o.program()))
                .collect(),
            ..Self::default()
        }
    }
}

/// Traversal visitor taking one server if possible.
pub fn escalate_node<H>(host: &mut H, ctx: &TraversalContext<'_>, report: &mut EscalationReport) -> Result<(), PilotError>
where
    H: Host + ?Sized,
{
    let node = host
        .node(ctx.hostname())
        .ok_or_else(|| PilotError::UnknownNode(ctx.hostname().to_string()))?;

    if node.has_root {
        return Ok(());
    }

    let quiet = ctx.traversal().suppress_output();

    if report.hacking_level < node.required_hacking_level {
        if !quiet {
            log::error!(
                "hacking level {} required for {}",
                node.required_hacking_level,
                node.hostname
            );
        }
        report.level_too_low.push(node.hostname);
        return Ok(());
    }

    let required = node.ports_required as usize;
    if report.openers.len() < required {
        if !quiet {
            log::warn!("{} needs more tools ({} ports)", node.hostname, required);
        }
        report.missing_tools.push(node.hostname);
        return Ok(());
    }

    for opener in report.openers[..required].iter().rev() {
        if !host.open_port(&node.hostname, *opener) {
            log::warn!("{} failed on {}", opener.program(), node.hostname);
        }
    }

    if host.nuke(&node.hostname) {
        log::info!("hacked {}", node.hostname);
        report.escalated.push(node.hostname);
    } else {
        log::warn!("nuke failed on {}", node.hostname);
    }
    Ok(())
}

/// Try to root every reachable server.
pub fn escalate<H>(host: &mut H, quiet: bool) -> Result<EscalationReport, PilotError>
where
    H: Host + ?Sized,
{
    let start = host.home().to_string();
    let mut report = EscalationReport::prepare(&*host);
    Traversal::new()
        .quiet(quiet)
        .run(host, &start, &mut report, escalate_node::<H>)?;
    Ok(report)
}

//! Target discovery: which servers are worth attacking.

use crate::config::PilotConfig;
use crate::error::PilotError;
use crate::host::Host;
use crate::traversal::{Traversal, TraversalContext};

/// Accumulator for [`collect_target`].
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Servers must hold more max money than this.
    pub min_money: f64,
    /// Targets in walk order.
    pub targets: Vec<String>,
}

/// Traversal visitor keeping rooted servers that can hold money.
pub fn collect_target<H>(host: &mut H, ctx: &TraversalContext<'_>, acc: &mut Discovered) -> Result<(), PilotError>
where
    H: Host + ?Sized,
{
    let node = host
        .node(ctx.hostname())
        .ok_or_else(|| PilotError::UnknownNode(ctx.hostname().to_string()))?;

    if node.has_root && node.max_money > acc.min_money {
        acc.targets.push(node.hostname);
    }
    Ok(())
}

/// Walk the whole network and list eligible targets, skipping ignored servers.
pub fn discover_targets<H>(host: &mut H, config: &PilotConfig) -> Result<Vec<String>, PilotError>
where
    H: Host + ?Sized,
{
    let start = host.home().to_string();
    let mut acc = Discovered {
        min_money: config.min_target_money,
        targets: Vec::new(),
    };
    Traversal::new()
        .excluding(config.ignored.iter().cloned())
        .quiet(true)
        .run(host, &start, &mut acc, collect_target::<H>)?;
    Ok(acc.targets)
}

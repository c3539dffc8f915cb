//! Greedy thread allocation over a capacity snapshot.
//!
//! Servers are filled in map order until the requirement is met or the map
//! runs out; there is no largest-first sorting. Partial fulfilment is the
//! normal case and the caller retries the shortfall on a later tick.
//!
//! [`allocate`] is not idempotent: every call copies scripts and starts
//! processes on the host.

use crate::capacity::CapacityMap;
use crate::host::{Host, Pid};

/// A process started by [`allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub pid: Pid,
    pub node: String,
    pub threads: u64,
}

/// Threads actually started across `grants`.
pub fn granted(grants: &[Grant]) -> u64 {
    grants.iter().map(|g| g.threads).sum()
}

/// Threads a server can run after its reservation.
fn available_threads(free: f64, reserve: f64, unit_cost: f64) -> u64 {
    let threads = ((free - reserve) / unit_cost).floor();
    if threads >= 1.0 {
        threads as u64
    } else {
        0
    }
}

/// Split `required` threads over `map` without touching the host.
///
/// Only `home` has `home_reserve` held back. A non-positive `unit_cost`
/// yields an empty plan.
pub fn plan(
    map: &CapacityMap,
    unit_cost: f64,
    required: u64,
    home: &str,
    home_reserve: f64,
) -> Vec<(String, u64)> {
    let mut plan = Vec::new();
    if required == 0 || !(unit_cost > 0.0) {
        return plan;
    }

    let mut remaining = required;
    for node in map.iter() {
        if remaining == 0 {
            break;
        }
        let reserve = if node.name == home { home_reserve } else { 0.0 };
        let threads = available_threads(node.free, reserve, unit_cost).min(remaining);
        if threads == 0 {
            continue;
        }
        plan.push((node.name.clone(), threads));
        remaining -= threads;
    }
    plan
}

/// Threads the whole map could run for `unit_cost`, reservation applied.
pub fn capacity_threads(map: &CapacityMap, unit_cost: f64, home: &str, home_reserve: f64) -> u64 {
    if !(unit_cost > 0.0) {
        return 0;
    }
    map.iter()
        .map(|node| {
            let reserve = if node.name == home { home_reserve } else { 0.0 };
            available_threads(node.free, reserve, unit_cost)
        })
        .fold(0u64, u64::saturating_add)
}

/// Start up to `required` threads of `script` against `target`.
///
/// The script is copied to each chosen server that lacks it and started
/// with `[target, threads, 0]` as arguments. Starts that fail are dropped
/// from the result, so callers must account using the returned grants.
pub fn allocate<H>(
    host: &mut H,
    script: &str,
    target: &str,
    required: u64,
    map: &CapacityMap,
    home_reserve: f64,
) -> Vec<Grant>
where
    H: Host + ?Sized,
{
    let home = host.home().to_string();
    let unit_cost = host.script_ram(script);
    let plan = plan(map, unit_cost, required, &home, home_reserve);

    let mut grants = Vec::with_capacity(plan.len());
    for (node, threads) in plan {
        if !host.file_exists(script, &node) && !host.scp(script, &node) {
            log::warn!("could not copy {} to {}", script, node);
            continue;
        }

        let args = [target.to_string(), threads.to_string(), "0".to_string()];
        match host.exec(script, &node, threads, &args) {
            Some(pid) => grants.push(Grant { pid, node, threads }),
            None => log::debug!("{} on {} failed to start ({} threads)", script, node, threads),
        }
    }

    log::debug!(
        "{} -> {:<18} ({} / {} => {})",
        script,
        target,
        capacity_threads(map, unit_cost, &home, home_reserve),
        required,
        granted(&grants)
    );
    grants
}

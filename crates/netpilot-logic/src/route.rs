//! Connection routes to a server.
//!
//! A route starts at the closest backdoored ancestor of the destination
//! (or home) since the terminal can jump straight to those.

use crate::error::PilotError;
use crate::host::Host;
use crate::traversal::{Traversal, TraversalContext};

/// Accumulator for [`record_route`].
#[derive(Debug, Clone)]
pub struct RouteSearch {
    pub destination: String,
    pub route: Option<Vec<String>>,
}

impl RouteSearch {
    pub fn new(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            route: None,
        }
    }

    pub fn found(&self) -> bool {
        self.route.is_some()
    }
}

/// Traversal visitor recording the route once the destination is reached.
pub fn record_route<H>(host: &mut H, ctx: &TraversalContext<'_>, search: &mut RouteSearch) -> Result<(), PilotError>
where
    H: Host + ?Sized,
{
    // The walk itself cannot be cut short.
    if search.found() || ctx.hostname() != search.destination {
        return Ok(());
    }

    let home = host.home().to_string();
    let host = &*host;
    let route = ctx.path_from(|name| {
        name == home || host.node(name).map_or(false, |n| n.backdoor_installed)
    });
    search.route = Some(route);
    Ok(())
}

/// Route to `destination`, or `None` when it is not on the network.
pub fn find_route<H>(host: &mut H, destination: &str) -> Result<Option<Vec<String>>, PilotError>
where
    H: Host + ?Sized,
{
    if host.node(destination).is_none() {
        return Ok(None);
    }

    let start = host.home().to_string();
    let mut search = RouteSearch::new(destination);
    Traversal::new()
        .quiet(true)
        .run(host, &start, &mut search, record_route::<H>)?;
    Ok(search.route)
}

/// Terminal commands following a route, skipping its anchor.
pub fn connect_commands(route: &[String]) -> String {
    route
        .iter()
        .skip(1)
        .map(|hop| format!("connect {}", hop))
        .collect::<Vec<_>>()
        .join("; ")
}

//! Free-RAM snapshot of the network.
//!
//! A [`CapacityMap`] lists every rooted server with its free and maximum
//! RAM, in traversal order (home first when home is not excluded).
//! Servers without root access are absent rather than listed as zero.

use serde::{Deserialize, Serialize};

use crate::error::PilotError;
use crate::host::Host;
use crate::traversal::{Traversal, TraversalContext};

/// RAM figures for one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub name: String,
    pub free: f64,
    pub max: f64,
}

/// Ordered capacity snapshot with running totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityMap {
    nodes: Vec<NodeCapacity>,
    total_free: f64,
    total_max: f64,
}

impl CapacityMap {
    /// Build a map from explicit entries, keeping their order.
    pub fn from_nodes(nodes: Vec<NodeCapacity>) -> Self {
        let mut map = Self::default();
        for node in nodes {
            map.push(node);
        }
        map
    }

    fn push(&mut self, node: NodeCapacity) {
        self.total_free += node.free;
        self.total_max += node.max;
        self.nodes.push(node);
    }

    pub fn get(&self, name: &str) -> Option<&NodeCapacity> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeCapacity> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_free(&self) -> f64 {
        self.total_free
    }

    pub fn total_max(&self) -> f64 {
        self.total_max
    }

    /// Total free RAM after holding back `reserve` on `home`.
    pub fn usable_free(&self, home: &str, reserve: f64) -> f64 {
        let held = self
            .get(home)
            .map(|h| reserve.max(0.0).min(h.free))
            .unwrap_or(0.0);
        self.total_free - held
    }
}

/// Traversal visitor recording one server's RAM.
pub fn scan_node<H>(host: &mut H, ctx: &TraversalContext<'_>, map: &mut CapacityMap) -> Result<(), PilotError>
where
    H: Host + ?Sized,
{
    let node = host
        .node(ctx.hostname())
        .ok_or_else(|| PilotError::UnknownNode(ctx.hostname().to_string()))?;

    if !node.has_root {
        return Ok(());
    }

    map.push(NodeCapacity {
        name: node.hostname.clone(),
        free: node.free_ram(),
        max: node.max_ram,
    });
    Ok(())
}

/// Snapshot the RAM of every rooted server reachable from home.
pub fn build_capacity_map<H>(host: &mut H, exclusions: &[&str]) -> Result<CapacityMap, PilotError>
where
    H: Host + ?Sized,
{
    let start = host.home().to_string();
    let mut map = CapacityMap::default();
    Traversal::new()
        .excluding(exclusions.iter().copied())
        .run(host, &start, &mut map, scan_node::<H>)?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{node, MockHost};

    fn host() -> MockHost {
        let mut host = MockHost::new("home", 64.0);
        host.node_mut("home").used_ram = 16.0;
        host.add(node("rooted", 32.0));
        let mut locked = node("locked", 128.0);
        locked.has_root = false;
        host.add(locked);
        host.link("home", "rooted").link("rooted", "locked");
        host
    }

    #[test]
    fn records_rooted_nodes_in_walk_order() {
        let mut host = host();
        let map = build_capacity_map(&mut host, &[]).unwrap();
        let names: Vec<_> = map.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["home", "rooted"]);
        assert_eq!(map.get("home").unwrap().free, 48.0);
        assert_eq!(map.total_free(), 80.0);
        assert_eq!(map.total_max(), 96.0);
    }

    #[test]
    fn locked_nodes_are_absent() {
        let mut host = host();
        let map = build_capacity_map(&mut host, &[]).unwrap();
        assert!(map.get("locked").is_none());
    }

    #[test]
    fn exclusions_drop_home() {
        let mut host = host();
        let map = build_capacity_map(&mut host, &["home"]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.total_free(), 32.0);
    }

    #[test]
    fn unknown_node_is_an_error() {
        let mut host = host();
        host.adjacency.get_mut("home").unwrap().push("ghost".into());
        let err = build_capacity_map(&mut host, &[]).unwrap_err();
        assert!(matches!(err, PilotError::UnknownNode(name) if name == "ghost"));
    }

    #[test]
    fn usable_free_holds_back_home_reserve() {
        let map = CapacityMap::from_nodes(vec![
            NodeCapacity { name: "home".into(), free: 20.0, max: 64.0 },
            NodeCapacity { name: "a".into(), free: 10.0, max: 10.0 },
        ]);
        assert_eq!(map.usable_free("home", 8.0), 22.0);
        assert_eq!(map.usable_free("home", 100.0), 10.0);
        assert_eq!(map.usable_free("elsewhere", 8.0), 30.0);
    }
}

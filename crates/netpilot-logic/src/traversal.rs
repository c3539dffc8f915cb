//! Depth-first walk over the server network.
//!
//! The network is discovered lazily through [`Host::scan`]; nothing is
//! cached between walks. Each visited server gets a [`TraversalContext`]
//! that links back to the context of the server it was reached from, so a
//! visitor can reconstruct the route it took.
//!
//! Results flow through a caller-owned accumulator `A` passed to every
//! visitor call. The walk never prunes on its own: a visitor that wants to
//! stop early records that in the accumulator and returns quickly for the
//! remaining servers. A visitor error aborts the walk and is returned as-is.
//!
//! The walk keeps its own stack, so chain length is bounded by memory and
//! not by the thread's call stack.

use std::collections::HashSet;

use crate::host::Host;

/// Walk settings shared by every context of one run.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    exclusions: Vec<String>,
    suppress_output: bool,
}

/// A server reached during a walk. Contexts refer to their parent by index.
#[derive(Debug)]
struct Frame {
    hostname: String,
    depth: usize,
    parent: Option<usize>,
}

/// One visit during a walk.
#[derive(Debug, Clone, Copy)]
pub struct TraversalContext<'a> {
    traversal: &'a Traversal,
    frames: &'a [Frame],
    index: usize,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Servers that are walked through but never handed to the visitor.
    pub fn excluding<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn quiet(mut self, suppress_output: bool) -> Self {
        self.suppress_output = suppress_output;
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.iter().any(|e| e == name)
    }

    pub fn suppress_output(&self) -> bool {
        self.suppress_output
    }

    /// Walk the network from `start`, calling `visit` once per reachable,
    /// non-excluded server. The start server is visited first and every
    /// server is visited after the server it was discovered from.
    pub fn run<H, A, E, F>(&self, host: &mut H, start: &str, acc: &mut A, mut visit: F) -> Result<(), E>
    where
        H: Host + ?Sized,
        F: FnMut(&mut H, &TraversalContext<'_>, &mut A) -> Result<(), E>,
    {
        let mut visited = HashSet::new();
        let mut frames: Vec<Frame> = Vec::new();
        // (hostname, depth, parent frame)
        let mut pending: Vec<(String, usize, Option<usize>)> = vec![(start.to_string(), 0, None)];

        while let Some((hostname, depth, parent)) = pending.pop() {
            // A server can be queued from several neighbors; the first pop wins.
            if !visited.insert(hostname.clone()) {
                continue;
            }

            let index = frames.len();
            frames.push(Frame {
                hostname,
                depth,
                parent,
            });

            let hostname = frames[index].hostname.as_str();
            if !self.is_excluded(hostname) {
                let context = TraversalContext {
                    traversal: self,
                    frames: &frames,
                    index,
                };
                visit(host, &context, acc)?;
            }

            // Reversed so the first neighbor in scan order is walked first.
            let neighbors = host.scan(&frames[index].hostname);
            for neighbor in neighbors.into_iter().rev() {
                if !visited.contains(&neighbor) {
                    pending.push((neighbor, depth + 1, Some(index)));
                }
            }
        }

        Ok(())
    }
}

impl<'a> TraversalContext<'a> {
    fn frame(&self) -> &'a Frame {
        &self.frames[self.index]
    }

    pub fn hostname(&self) -> &'a str {
        &self.frame().hostname
    }

    /// Hops from the start server (which is at depth 0).
    pub fn depth(&self) -> usize {
        self.frame().depth
    }

    pub fn parent(&self) -> Option<TraversalContext<'a>> {
        self.frame().parent.map(|index| TraversalContext {
            traversal: self.traversal,
            frames: self.frames,
            index,
        })
    }

    pub fn traversal(&self) -> &'a Traversal {
        self.traversal
    }

    /// Parent, grandparent, ... up to the start server.
    pub fn ancestors(&self) -> Ancestors<'a> {
        Ancestors { next: self.parent() }
    }

    /// Route from the nearest ancestor accepted by `is_anchor` down to this
    /// server, both ends included. Without such an ancestor the route starts
    /// at the start server of the walk.
    pub fn path_from<P>(&self, is_anchor: P) -> Vec<String>
    where
        P: Fn(&str) -> bool,
    {
        let mut path = vec![self.hostname().to_string()];
        for ancestor in self.ancestors() {
            path.push(ancestor.hostname().to_string());
            if is_anchor(ancestor.hostname()) {
                break;
            }
        }
        path.reverse();
        path
    }
}

/// Iterator over a context's ancestors, nearest first.
pub struct Ancestors<'a> {
    next: Option<TraversalContext<'a>>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = TraversalContext<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

//! Per-target action state machine.
//!
//! Each target cycles Weaken → Grow → Hack. A [`TargetState`] remembers
//! the next action, how many threads that action still needs, and the
//! processes already working on it.
//!
//! # Phases
//!
//! | Phase | Meaning |
//! |-------|---------|
//! | `Waiting` | Nothing in flight for this target |
//! | `Running` | At least one process was started since entering the phase |
//!
//! A target leaves `Running` when a finished hack cycle is followed by a
//! weaken or grow (the server dropped out of hackable condition), or when
//! it can no longer be acted on at all.
//!
//! Invariant: `action == Action::None` implies `threads_needed == 0`.

use serde::{Deserialize, Serialize};

use crate::allocator::{allocate, granted};
use crate::capacity::build_capacity_map;
use crate::config::PilotConfig;
use crate::error::PilotError;
use crate::host::{Host, Node, Pid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Waiting,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    None,
    Weaken,
    Grow,
    Hack,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Weaken => "weaken",
            Action::Grow => "grow",
            Action::Hack => "hack",
        }
    }

    /// Worker script for this action, if it has one.
    pub fn script(self, config: &PilotConfig) -> Option<&str> {
        match self {
            Action::None => None,
            Action::Weaken => Some(config.scripts.weaken.as_str()),
            Action::Grow => Some(config.scripts.grow.as_str()),
            Action::Hack => Some(config.scripts.hack.as_str()),
        }
    }
}

/// Scheduling record for one target server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub target: String,
    /// Root access is held, so actions can be started against it.
    pub reachable: bool,
    pub current_money: f64,
    pub max_money: f64,
    pub current_security: f64,
    pub min_security: f64,
    pub phase: Phase,
    /// Next action to dispatch; `None` once fully dispatched.
    pub action: Action,
    pub threads_needed: u64,
    pub monitor_pids: Vec<Pid>,
    /// Action of the processes currently in flight.
    pub cycle: Action,
}

/// Round a host thread estimate up; negative or non-finite means none.
pub fn ceil_threads(estimate: f64) -> u64 {
    if estimate.is_finite() && estimate > 0.0 {
        estimate.ceil() as u64
    } else {
        0
    }
}

/// Smallest thread count whose weaken effect covers `security - min_security`.
///
/// Linear search from one thread, stopping at `cap`.
pub fn weaken_threads<H>(host: &H, security: f64, min_security: f64, cap: u64) -> u64
where
    H: Host + ?Sized,
{
    let gap = security - min_security;
    let mut threads = 1;
    while host.weaken_analyze(threads, 1) < gap {
        if threads >= cap {
            log::warn!("weaken search hit the cap of {} threads", cap);
            break;
        }
        threads += 1;
    }
    threads
}

/// Grow threads needed to refill a target to its max money.
pub fn grow_threads<H>(host: &H, target: &str, money: f64, max_money: f64, money_floor: f64) -> u64
where
    H: Host + ?Sized,
{
    // An empty server would divide by zero.
    let current = if money <= 0.0 { money_floor } else { money };
    ceil_threads(host.growth_analyze(target, max_money / current))
}

/// Hack threads needed to take `fraction` of the current money.
pub fn hack_threads<H>(host: &H, target: &str, money: f64, fraction: f64) -> u64
where
    H: Host + ?Sized,
{
    ceil_threads(host.hack_analyze_threads(target, money * fraction))
}

fn safe_ratio(value: f64, reference: f64) -> f64 {
    if reference <= 0.0 {
        0.0
    } else {
        value / reference
    }
}

impl TargetState {
    /// Fresh record for a newly discovered target.
    pub fn discover<H>(host: &H, name: &str, config: &PilotConfig) -> Result<Self, PilotError>
    where
        H: Host + ?Sized,
    {
        let node = host
            .node(name)
            .ok_or_else(|| PilotError::UnknownNode(name.to_string()))?;

        let mut state = Self {
            target: name.to_string(),
            reachable: false,
            current_money: 0.0,
            max_money: 0.0,
            current_security: 0.0,
            min_security: 0.0,
            phase: Phase::Waiting,
            action: Action::None,
            threads_needed: 0,
            monitor_pids: Vec::new(),
            cycle: Action::None,
        };
        state.apply(&node);
        state.recompute(host, config);
        Ok(state)
    }

    fn apply(&mut self, node: &Node) {
        self.reachable = node.has_root;
        self.current_money = node.money;
        self.max_money = node.max_money;
        self.current_security = node.security;
        self.min_security = node.min_security;
    }

    /// Pull fresh metrics. A target the host no longer knows is unreachable.
    fn refresh<H>(&mut self, host: &H)
    where
        H: Host + ?Sized,
    {
        match host.node(&self.target) {
            Some(node) => self.apply(&node),
            None => {
                log::debug!("{} is no longer known to the host", self.target);
                self.reachable = false;
            }
        }
    }

    /// Next action from the current metrics.
    pub fn determine_next_action(&self, config: &PilotConfig) -> Action {
        if !self.reachable {
            return Action::None;
        }

        if self.min_security < self.current_security * config.security_threshold {
            Action::Weaken
        } else if self.current_money < self.max_money * config.money_threshold {
            Action::Grow
        } else {
            Action::Hack
        }
    }

    /// Threads the current action needs, from the current metrics.
    pub fn calculate_threads_needed<H>(&self, host: &H, config: &PilotConfig) -> u64
    where
        H: Host + ?Sized,
    {
        match self.action {
            Action::None => 0,
            Action::Weaken => weaken_threads(
                host,
                self.current_security,
                self.min_security,
                config.max_weaken_threads,
            ),
            Action::Grow => grow_threads(
                host,
                &self.target,
                self.current_money,
                self.max_money,
                config.grow_money_floor,
            ),
            Action::Hack => hack_threads(host, &self.target, self.current_money, config.hack_fraction),
        }
    }

    fn recompute<H>(&mut self, host: &H, config: &PilotConfig)
    where
        H: Host + ?Sized,
    {
        self.action = self.determine_next_action(config);
        self.threads_needed = self.calculate_threads_needed(host, config);
    }

    /// Prune finished processes, refresh metrics, and pick the next action
    /// once the previous one is fully dispatched and done.
    pub fn update<H>(&mut self, host: &H, config: &PilotConfig)
    where
        H: Host + ?Sized,
    {
        self.monitor_pids.retain(|pid| host.is_running(*pid));
        self.refresh(host);

        // Nothing more can be started against a server we lost access to.
        if !self.reachable && self.threads_needed > 0 {
            self.action = Action::None;
            self.threads_needed = 0;
        }

        if !self.monitor_pids.is_empty() || self.threads_needed > 0 {
            return;
        }

        let finished = self.cycle;
        self.recompute(host, config);
        self.cycle = Action::None;

        let left_hack = finished == Action::Hack && matches!(self.action, Action::Weaken | Action::Grow);
        if self.phase == Phase::Running && (left_hack || self.action == Action::None) {
            self.phase = Phase::Waiting;
            log::info!(
                "{} finished {}, next {} -> waiting",
                self.target,
                finished.label(),
                self.action.label()
            );
        }
    }

    /// Start as many of the outstanding threads as free RAM allows.
    ///
    /// Returns the number of threads started.
    pub fn perform_action<H>(&mut self, host: &mut H, config: &PilotConfig) -> Result<u64, PilotError>
    where
        H: Host + ?Sized,
    {
        let script = match self.action.script(config) {
            Some(script) => script.to_string(),
            None => return Ok(0),
        };
        if self.threads_needed == 0 {
            self.action = Action::None;
            return Ok(0);
        }

        let map = build_capacity_map(host, &[])?;
        let grants = allocate(
            host,
            &script,
            &self.target,
            self.threads_needed,
            &map,
            config.home_reserve_ram,
        );
        let started = granted(&grants);

        if !grants.is_empty() {
            if self.phase == Phase::Waiting {
                log::info!("{} -> running ({})", self.target, self.action.label());
            }
            self.phase = Phase::Running;
            self.cycle = self.action;
            log::info!(
                "{:<6} -> {:<18} {} threads started, {} outstanding",
                self.action.label(),
                self.target,
                started,
                self.threads_needed.saturating_sub(started)
            );
        }

        self.monitor_pids.extend(grants.iter().map(|g| g.pid));
        self.threads_needed = self.threads_needed.saturating_sub(started);

        // Fully dispatched: wait for the processes to finish.
        if self.threads_needed == 0 {
            self.action = Action::None;
        }
        Ok(started)
    }

    /// How close the target is to hackable condition; higher is closer.
    pub fn progression(&self) -> f64 {
        safe_ratio(self.current_money, self.max_money) - safe_ratio(self.current_security, self.min_security)
    }

    /// In the hack stage, either queued or in flight.
    pub fn is_hacking(&self) -> bool {
        self.action == Action::Hack || self.cycle == Action::Hack
    }
}

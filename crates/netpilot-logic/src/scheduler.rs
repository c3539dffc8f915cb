//! The scheduler loop.
//!
//! One [`Scheduler`] owns the whole target table. Each tick:
//!
//! 1. `update` every tracked target
//! 2. escalate and re-discover when the hacking level rose
//! 3. sort the table (see [`compare_targets`])
//! 4. dispatch running targets, then everything else
//! 5. soak up large idle RAM with the share filler
//! 6. persist the table
//!
//! [`Scheduler::run`] repeats this forever, sleeping for the poll interval
//! between ticks.

use std::cmp::Ordering;

use crate::allocator::{allocate, granted};
use crate::capacity::build_capacity_map;
use crate::config::PilotConfig;
use crate::discovery::discover_targets;
use crate::error::PilotError;
use crate::escalation::escalate;
use crate::host::Host;
use crate::persistence::{load_state, save_state};
use crate::target::{Phase, TargetState};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Host clock when the tick started.
    pub started_ms: u64,
    pub tracked: usize,
    /// Threads started against targets.
    pub dispatched: u64,
    pub share_threads: u64,
    /// Servers newly rooted this tick.
    pub escalated: usize,
}

/// Ordering used to decide who gets RAM first.
///
/// Reachable before unreachable, `Running` before `Waiting`. Two running
/// targets only differ by whether they are in the hack stage, so a stable
/// sort keeps the rest of the running queue as it was. Everything else
/// goes by descending progression, then descending max money.
pub fn compare_targets(a: &TargetState, b: &TargetState) -> Ordering {
    b.reachable
        .cmp(&a.reachable)
        .then_with(|| phase_rank(a.phase).cmp(&phase_rank(b.phase)))
        .then_with(|| {
            if a.phase == Phase::Running && b.phase == Phase::Running {
                b.is_hacking().cmp(&a.is_hacking())
            } else {
                b.progression()
                    .total_cmp(&a.progression())
                    .then_with(|| b.max_money.total_cmp(&a.max_money))
            }
        })
}

fn phase_rank(phase: Phase) -> u8 {
    match phase {
        Phase::Running => 0,
        Phase::Waiting => 1,
    }
}

pub struct Scheduler {
    config: PilotConfig,
    targets: Vec<TargetState>,
    /// Level seen at the last discovery; 0 forces one on the first tick.
    hacking_level: u32,
}

impl Scheduler {
    pub fn new(config: PilotConfig) -> Self {
        Self {
            config,
            targets: Vec::new(),
            hacking_level: 0,
        }
    }

    /// Scheduler seeded from the persisted table, if any.
    pub fn restore<H>(host: &H, config: PilotConfig) -> Self
    where
        H: Host + ?Sized,
    {
        let targets = load_state(host, &config.state_file);
        let in_flight: usize = targets.iter().map(|t| t.monitor_pids.len()).sum();
        log::info!(
            "restored {} targets with {} processes in flight",
            targets.len(),
            in_flight
        );
        Self {
            config,
            targets,
            hacking_level: 0,
        }
    }

    pub fn config(&self) -> &PilotConfig {
        &self.config
    }

    pub fn targets(&self) -> &[TargetState] {
        &self.targets
    }

    /// Run one scheduling cycle.
    pub fn tick<H>(&mut self, host: &mut H) -> Result<TickReport, PilotError>
    where
        H: Host + ?Sized,
    {
        let mut report = TickReport {
            started_ms: host.now_ms(),
            ..TickReport::default()
        };

        for target in &mut self.targets {
            target.update(&*host, &self.config);
        }

        let level = host.hacking_level();
        if level > self.hacking_level {
            let escalation = escalate(host, self.config.quiet_escalation)?;
            report.escalated = escalation.escalated.len();
            self.discover(host)?;
            log::debug!("hacking level {} -> {}", self.hacking_level, level);
            self.hacking_level = level;
        }

        self.targets.sort_by(compare_targets);

        // In-flight work first, then the rest in priority order.
        let running: Vec<bool> = self.targets.iter().map(|t| t.phase == Phase::Running).collect();
        for pass_running in [true, false] {
            for (target, was_running) in self.targets.iter_mut().zip(&running) {
                if *was_running == pass_running {
                    report.dispatched += target.perform_action(host, &self.config)?;
                }
            }
        }

        report.share_threads = self.share(host)?;

        save_state(host, &self.config.state_file, &self.targets)?;

        report.tracked = self.targets.len();
        log::debug!(
            "tick at {}ms: {} targets, {} threads dispatched, {} shared",
            report.started_ms,
            report.tracked,
            report.dispatched,
            report.share_threads
        );
        Ok(report)
    }

    /// Merge newly discovered targets into the table.
    fn discover<H>(&mut self, host: &mut H) -> Result<(), PilotError>
    where
        H: Host + ?Sized,
    {
        for name in discover_targets(host, &self.config)? {
            if self.targets.iter().any(|t| t.target == name) {
                continue;
            }
            log::info!("new target {}", name);
            self.targets.push(TargetState::discover(&*host, &name, &self.config)?);
        }
        Ok(())
    }

    /// Fill idle RAM with share threads when there is a lot of it.
    fn share<H>(&self, host: &mut H) -> Result<u64, PilotError>
    where
        H: Host + ?Sized,
    {
        let map = build_capacity_map(host, &[])?;
        let home = host.home().to_string();
        let idle = map.usable_free(&home, self.config.home_reserve_ram);
        if idle <= self.config.share_threshold {
            return Ok(0);
        }

        let grants = allocate(
            host,
            &self.config.scripts.share,
            "",
            u64::MAX,
            &map,
            self.config.home_reserve_ram,
        );
        let threads = granted(&grants);
        log::debug!("share: {} threads over {:.0} GB idle", threads, idle);
        host.sleep(self.config.share_pause_ms);
        Ok(threads)
    }

    /// Tick forever. Errors abort only the tick they happen in.
    pub fn run<H>(&mut self, host: &mut H) -> !
    where
        H: Host + ?Sized,
    {
        loop {
            if let Err(e) = self.tick(host) {
                log::error!("tick aborted: {}", e);
            }
            host.sleep(self.config.poll_interval_ms);
        }
    }

    /// Bounded [`Scheduler::run`]. Returns the reports of ticks that completed.
    pub fn run_ticks<H>(&mut self, host: &mut H, ticks: usize) -> Vec<TickReport>
    where
        H: Host + ?Sized,
    {
        let mut reports = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            match self.tick(host) {
                Ok(report) => reports.push(report),
                Err(e) => log::error!("tick aborted: {}", e),
            }
            host.sleep(self.config.poll_interval_ms);
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{capture_logs, logged, node, MockHost};
    use crate::persistence::decode;
    use crate::target::Action;

    fn single_target(home_ram: f64) -> MockHost {
        let mut host = MockHost::new("home", home_ram);
        host.add(node("n00dles", 0.0));
        host.link("home", "n00dles");
        host
    }

    fn state(name: &str, phase: Phase, action: Action) -> TargetState {
        TargetState {
            target: name.to_string(),
            reachable: true,
            current_money: 500.0,
            max_money: 1_000.0,
            current_security: 10.0,
            min_security: 10.0,
            phase,
            action,
            threads_needed: 0,
            monitor_pids: Vec::new(),
            cycle: Action::None,
        }
    }

    #[test]
    fn first_tick_discovers_dispatches_and_persists() {
        let mut host = single_target(64.0);
        let mut scheduler = Scheduler::new(PilotConfig::default());

        let report = scheduler.tick(&mut host).unwrap();

        // 32 GB left after the home reservation, 1.75 GB per thread.
        assert_eq!(report.tracked, 1);
        assert_eq!(report.dispatched, 18);
        assert_eq!(report.share_threads, 0);
        let target = &scheduler.targets()[0];
        assert_eq!(target.phase, Phase::Running);
        assert_eq!(target.threads_needed, 75 - 18);

        let saved = host.store.get("/tmp/hackingpilot.txt").unwrap();
        assert_eq!(decode(saved).unwrap(), scheduler.targets());
    }

    #[test]
    fn no_capacity_means_no_dispatch() {
        let mut host = single_target(64.0);
        let mut scheduler = Scheduler::new(PilotConfig::default());
        scheduler.tick(&mut host).unwrap();

        let report = scheduler.tick(&mut host).unwrap();
        assert_eq!(report.dispatched, 0);
        assert_eq!(scheduler.targets()[0].threads_needed, 57);
    }

    #[test]
    fn large_idle_ram_runs_share_filler() {
        let mut host = single_target(50_000.0);
        let mut scheduler = Scheduler::new(PilotConfig::default());

        let report = scheduler.tick(&mut host).unwrap();

        assert_eq!(report.dispatched, 75);
        // (50_000 - 75 * 1.75 - 32) / 4
        assert_eq!(report.share_threads, 12_459);
        let last = host.execs.last().unwrap();
        assert_eq!(last.script, "/lib/share.js");
        assert_eq!(last.args, vec!["", "12459", "0"]);
        assert_eq!(host.clock, 5_300);
    }

    #[test]
    fn rising_level_escalates_and_adds_targets() {
        let mut host = single_target(64.0);
        let mut locked = node("neo-net", 0.0);
        locked.has_root = false;
        locked.required_hacking_level = 5;
        host.add(locked);
        host.link("n00dles", "neo-net");
        let mut scheduler = Scheduler::new(PilotConfig::default());

        let first = scheduler.tick(&mut host).unwrap();
        assert_eq!(first.escalated, 0);
        assert_eq!(first.tracked, 1);

        host.hacking_level = 10;
        let second = scheduler.tick(&mut host).unwrap();
        assert_eq!(second.escalated, 1);
        assert_eq!(second.tracked, 2);
    }

    fn host_with_gated(name: &str, level: u32) -> MockHost {
        let mut host = single_target(64.0);
        let mut gated = node(name, 0.0);
        gated.has_root = false;
        gated.required_hacking_level = level;
        host.add(gated);
        host.link("n00dles", name);
        host
    }

    #[test]
    fn escalation_reports_locked_servers() {
        capture_logs();
        let mut host = host_with_gated("gated-net", 50);
        let mut scheduler = Scheduler::new(PilotConfig::default());

        scheduler.tick(&mut host).unwrap();

        assert!(logged("hacking level 50 required for gated-net"));
    }

    #[test]
    fn quiet_escalation_logs_nothing() {
        capture_logs();
        let mut host = host_with_gated("muted-net", 50);
        let config = PilotConfig {
            quiet_escalation: true,
            ..PilotConfig::default()
        };
        let mut scheduler = Scheduler::new(config);

        scheduler.tick(&mut host).unwrap();

        assert!(!logged("muted-net"));
    }

    #[test]
    fn restore_resumes_without_duplicates() {
        let mut host = single_target(64.0);
        let mut scheduler = Scheduler::new(PilotConfig::default());
        scheduler.tick(&mut host).unwrap();

        let mut restored = Scheduler::restore(&host, PilotConfig::default());
        assert_eq!(restored.targets(), scheduler.targets());

        let report = restored.tick(&mut host).unwrap();
        assert_eq!(report.tracked, 1);
        assert_eq!(restored.targets()[0].monitor_pids.len(), 1);
    }

    #[test]
    fn corrupt_state_file_restores_empty() {
        let mut host = single_target(64.0);
        host.store.insert("/tmp/hackingpilot.txt".into(), "{{{".into());
        let scheduler = Scheduler::restore(&host, PilotConfig::default());
        assert!(scheduler.targets().is_empty());
    }

    #[test]
    fn run_ticks_sleeps_between_ticks() {
        let mut host = single_target(64.0);
        let mut scheduler = Scheduler::new(PilotConfig::default());
        let reports = scheduler.run_ticks(&mut host, 3);
        assert_eq!(reports.len(), 3);
        let started: Vec<u64> = reports.iter().map(|r| r.started_ms).collect();
        assert_eq!(started, vec![0, 5_000, 10_000]);
        assert_eq!(host.clock, 15_000);
    }

    #[test]
    fn reachable_and_running_sort_first() {
        let mut unreachable = state("u", Phase::Waiting, Action::None);
        unreachable.reachable = false;
        let waiting = state("w", Phase::Waiting, Action::Grow);
        let running = state("r", Phase::Running, Action::Weaken);

        let mut table = vec![unreachable, waiting, running];
        table.sort_by(compare_targets);
        let order: Vec<_> = table.iter().map(|t| t.target.as_str()).collect();
        assert_eq!(order, vec!["r", "w", "u"]);
    }

    #[test]
    fn running_queue_only_promotes_hack_stage() {
        let mut in_flight_hack = state("h", Phase::Running, Action::None);
        in_flight_hack.cycle = Action::Hack;
        let mut poor = state("poor", Phase::Running, Action::Grow);
        poor.current_money = 0.0;
        let rich = state("rich", Phase::Running, Action::Weaken);

        let mut table = vec![poor, rich, in_flight_hack];
        table.sort_by(compare_targets);
        let order: Vec<_> = table.iter().map(|t| t.target.as_str()).collect();
        assert_eq!(order, vec!["h", "poor", "rich"]);
    }

    #[test]
    fn waiting_targets_by_progression_then_money() {
        let mut behind = state("behind", Phase::Waiting, Action::Grow);
        behind.current_money = 100.0;
        let ahead = state("ahead", Phase::Waiting, Action::Grow);
        let mut ahead_rich = ahead.clone();
        ahead_rich.target = "ahead-rich".into();
        ahead_rich.max_money *= 2.0;
        ahead_rich.current_money *= 2.0;

        let mut table = vec![behind, ahead, ahead_rich];
        table.sort_by(compare_targets);
        let order: Vec<_> = table.iter().map(|t| t.target.as_str()).collect();
        assert_eq!(order, vec!["ahead-rich", "ahead", "behind"]);
    }
}

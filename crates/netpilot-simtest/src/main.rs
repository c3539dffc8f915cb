//! NetPilot Headless Simulation Harness
//!
//! Runs the scheduler against a seeded simulated network and validates the
//! core invariants along the way. Runs entirely in-process on the
//! simulated clock.
//!
//! Usage:
//!   cargo run -p netpilot-simtest
//!   cargo run -p netpilot-simtest -- --verbose --seed 7 --ticks 500 --size 40
//!   cargo run -p netpilot-simtest -- --config pilot.json
//!
//! Set `RUST_LOG=info` to watch dispatches and state transitions.

use std::collections::HashSet;

use netpilot_logic::allocator::{allocate, capacity_threads, granted, plan};
use netpilot_logic::capacity::build_capacity_map;
use netpilot_logic::config::{validate_config, PilotConfig};
use netpilot_logic::discovery::discover_targets;
use netpilot_logic::host::Host;
use netpilot_logic::persistence::{decode, load_state};
use netpilot_logic::route::{connect_commands, find_route};
use netpilot_logic::scheduler::Scheduler;
use netpilot_logic::target::{Action, Phase};
use netpilot_logic::traversal::Traversal;
use netpilot_sim::SimNetwork;

// ── Options ─────────────────────────────────────────────────────────────

struct Options {
    verbose: bool,
    seed: u64,
    ticks: usize,
    size: usize,
    config: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            seed: 42,
            ticks: 300,
            size: 30,
            config: None,
        }
    }
}

fn print_usage() {
    println!("netpilot-simtest [options]");
    println!("options:");
    println!("  --verbose        print passing checks too");
    println!("  --seed <n>       network seed (default 42)");
    println!("  --ticks <n>      scheduler ticks to run (default 300)");
    println!("  --size <n>       servers besides home (default 30)");
    println!("  --config <path>  JSON scheduler config");
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {}", label))?;
    raw.parse::<u64>().map_err(|_| format!("invalid {}: {}", label, raw))
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--verbose" => options.verbose = true,
            "--seed" => {
                options.seed = parse_u64(args.get(i + 1), "seed")?;
                i += 1;
            }
            "--ticks" => {
                options.ticks = parse_u64(args.get(i + 1), "ticks")? as usize;
                i += 1;
            }
            "--size" => {
                options.size = parse_u64(args.get(i + 1), "size")? as usize;
                i += 1;
            }
            "--config" => {
                let path = args.get(i + 1).ok_or_else(|| "missing config path".to_string())?;
                options.config = Some(path.clone());
                i += 1;
            }
            other => return Err(format!("unknown option: {}", other)),
        }
        i += 1;
    }
    Ok(options)
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: String) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail,
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    println!("=== NetPilot Simulation Harness ===");
    println!("seed={} size={} ticks={}\n", options.seed, options.size, options.ticks);

    let mut results = Vec::new();

    // 1. Configuration
    let (config, config_results) = load_config(&options);
    results.extend(config_results);

    // 2. Traversal over the generated network
    results.extend(validate_traversal(&options));

    // 3. Allocator against a live capacity snapshot
    results.extend(validate_allocator(&options, &config));

    // 4. Scheduler loop
    results.extend(validate_scheduler(&options, &config));

    // 5. State file recovery
    results.extend(validate_recovery(&options, &config));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || options.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, total, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn load_config(options: &Options) -> (PilotConfig, Vec<TestResult>) {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let errors = validate_config(&PilotConfig::default());
    results.push(check(
        "config_defaults_valid",
        errors.is_empty(),
        format!("{} problems in defaults", errors.len()),
    ));

    let path = match &options.config {
        Some(path) => path,
        None => return (PilotConfig::default(), results),
    };

    let loaded = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| PilotConfig::from_json(&text).map_err(|e| e.to_string()));
    match loaded {
        Ok(config) => {
            results.push(check("config_file", true, format!("loaded {}", path)));
            (config, results)
        }
        Err(e) => {
            results.push(check("config_file", false, format!("{}: {}", path, e)));
            (PilotConfig::default(), results)
        }
    }
}

// ── 2. Traversal ────────────────────────────────────────────────────────

fn reachable_from_home(net: &SimNetwork) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![net.home().to_string()];
    while let Some(name) = stack.pop() {
        if seen.insert(name.clone()) {
            stack.extend(net.scan(&name));
        }
    }
    seen
}

fn validate_traversal(options: &Options) -> Vec<TestResult> {
    println!("--- Traversal ---");
    let mut results = Vec::new();
    let mut net = SimNetwork::generate(options.seed, options.size);
    let reachable = reachable_from_home(&net);

    let mut visited: Vec<String> = Vec::new();
    let walk = Traversal::new().run(&mut net, "home", &mut visited, |_, ctx, acc: &mut Vec<String>| {
        acc.push(ctx.hostname().to_string());
        Ok::<(), ()>(())
    });
    let unique: HashSet<String> = visited.iter().cloned().collect();

    results.push(check(
        "traversal_completes",
        walk.is_ok(),
        format!("{} servers visited", visited.len()),
    ));
    results.push(check(
        "traversal_visits_once",
        unique.len() == visited.len() && unique == reachable,
        format!("{} unique of {} reachable", unique.len(), reachable.len()),
    ));

    let mut through: Vec<String> = Vec::new();
    let excluded = Traversal::new().excluding(["n00dles"]).run(
        &mut net,
        "home",
        &mut through,
        |_, ctx, acc: &mut Vec<String>| {
            acc.push(ctx.hostname().to_string());
            Ok::<(), ()>(())
        },
    );
    results.push(check(
        "traversal_exclusion_through",
        excluded.is_ok() && !through.contains(&"n00dles".to_string()) && through.len() + 1 == visited.len(),
        format!("{} visited with n00dles excluded", through.len()),
    ));

    let mut bad_routes = Vec::new();
    for name in reachable.iter() {
        match find_route(&mut net, name) {
            Ok(Some(route)) => {
                let connected = route.windows(2).all(|hop| net.scan(&hop[0]).contains(&hop[1]));
                if route.first().map(String::as_str) != Some("home") || !connected {
                    bad_routes.push(name.clone());
                } else if options.verbose && route.len() > 4 {
                    println!("  route to {}: {}", name, connect_commands(&route));
                }
            }
            _ => bad_routes.push(name.clone()),
        }
    }
    results.push(check(
        "route_every_server",
        bad_routes.is_empty(),
        if bad_routes.is_empty() {
            format!("{} routes from home", reachable.len())
        } else {
            format!("bad routes: {:?}", bad_routes)
        },
    ));

    results
}

// ── 3. Allocator ────────────────────────────────────────────────────────

fn validate_allocator(options: &Options, config: &PilotConfig) -> Vec<TestResult> {
    println!("--- Allocator ---");
    let mut results = Vec::new();
    let mut net = SimNetwork::generate(options.seed, options.size);

    let map = match build_capacity_map(&mut net, &[]) {
        Ok(map) => map,
        Err(e) => {
            results.push(check("capacity_map", false, e.to_string()));
            return results;
        }
    };
    results.push(check(
        "capacity_map",
        !map.is_empty() && map.total_free() <= map.total_max(),
        format!("{} servers, {:.0}/{:.0} GB free", map.len(), map.total_free(), map.total_max()),
    ));

    let script = config.scripts.weaken.as_str();
    let cost = net.script_ram(script);
    let capacity = capacity_threads(&map, cost, "home", config.home_reserve_ram);
    let required = capacity + 10;

    let planned: u64 = plan(&map, cost, required, "home", config.home_reserve_ram)
        .iter()
        .map(|(_, t)| *t)
        .sum();
    results.push(check(
        "allocator_plan_conservation",
        planned <= required && planned <= capacity,
        format!("{} planned of {} required, {} fit", planned, required, capacity),
    ));

    let grants = allocate(&mut net, script, "n00dles", required, &map, config.home_reserve_ram);
    let started = granted(&grants);
    results.push(check(
        "allocator_started_within_capacity",
        started <= planned,
        format!("{} threads started in {} processes", started, grants.len()),
    ));

    let mut overcommitted = Vec::new();
    for name in net.server_names() {
        if let Some(node) = net.node(name) {
            if node.used_ram > node.max_ram + 1e-9 {
                overcommitted.push(name.to_string());
            }
        }
    }
    let home_used = net.node("home").map(|n| n.used_ram).unwrap_or(0.0);
    let home_max = net.node("home").map(|n| n.max_ram).unwrap_or(0.0);
    results.push(check(
        "allocator_respects_ram",
        overcommitted.is_empty() && home_used <= (home_max - config.home_reserve_ram).max(0.0) + 1e-9,
        format!("home {:.2}/{:.0} GB used, {} overcommitted", home_used, home_max, overcommitted.len()),
    ));

    results
}

// ── 4. Scheduler ────────────────────────────────────────────────────────

fn validate_scheduler(options: &Options, config: &PilotConfig) -> Vec<TestResult> {
    println!("--- Scheduler ---");
    let mut results = Vec::new();
    let mut net = SimNetwork::generate(options.seed, options.size);
    net.grant_program("BruteSSH.exe");
    net.grant_program("FTPCrack.exe");

    let mut scheduler = Scheduler::new(config.clone());
    let mut violations = Vec::new();
    let mut aborted = 0;
    let mut dispatched = 0u64;
    let mut shared = 0u64;
    let mut escalated = 0usize;

    for tick in 0..options.ticks {
        match scheduler.tick(&mut net) {
            Ok(report) => {
                dispatched += report.dispatched;
                shared += report.share_threads;
                escalated += report.escalated;
            }
            Err(e) => {
                log::error!("tick {} aborted: {}", tick, e);
                aborted += 1;
            }
        }
        for target in scheduler.targets() {
            if target.action == Action::None && target.threads_needed > 0 {
                violations.push(format!("tick {}: {}", tick, target.target));
            }
        }
        net.sleep(config.poll_interval_ms);
    }

    results.push(check(
        "scheduler_no_aborted_ticks",
        aborted == 0,
        format!("{} of {} ticks aborted", aborted, options.ticks),
    ));
    results.push(check(
        "scheduler_idle_means_no_threads",
        violations.is_empty(),
        if violations.is_empty() {
            "action None implies zero threads after every tick".into()
        } else {
            format!("violations: {:?}", violations)
        },
    ));

    let names: HashSet<&str> = scheduler.targets().iter().map(|t| t.target.as_str()).collect();
    let ignored: Vec<&&str> = names.iter().filter(|n| config.is_ignored(n)).collect();
    results.push(check(
        "scheduler_targets_unique_not_ignored",
        names.len() == scheduler.targets().len() && ignored.is_empty(),
        format!("{} targets, escalated {} servers", names.len(), escalated),
    ));

    let discovered = discover_targets(&mut net, config).map(|t| t.len()).unwrap_or(0);
    results.push(check(
        "scheduler_tracks_discoverable",
        scheduler.targets().len() >= discovered,
        format!("{} tracked, {} discoverable now", scheduler.targets().len(), discovered),
    ));

    let running = scheduler
        .targets()
        .iter()
        .filter(|t| t.phase == Phase::Running)
        .count();
    results.push(check(
        "scheduler_earns",
        net.earnings() > 0.0,
        format!(
            "${:.0} earned, {} threads dispatched, {} shared, {} running, level {}",
            net.earnings(),
            dispatched,
            shared,
            running,
            net.hacking_level()
        ),
    ));

    let persisted = net
        .read(&config.state_file)
        .map(|text| decode(&text).map(|table| table == scheduler.targets()));
    results.push(check(
        "scheduler_state_roundtrip",
        matches!(persisted, Some(Ok(true))),
        format!("state file {}", config.state_file),
    ));

    results
}

// ── 5. Recovery ─────────────────────────────────────────────────────────

fn validate_recovery(options: &Options, config: &PilotConfig) -> Vec<TestResult> {
    println!("--- Recovery ---");
    let mut results = Vec::new();
    let mut net = SimNetwork::generate(options.seed, options.size);

    net.write(&config.state_file, "[[\"n00dles\", {\"target\": 12");
    let table = load_state(&net, &config.state_file);
    results.push(check(
        "recovery_corrupt_file_empty",
        table.is_empty(),
        format!("{} entries from corrupt file", table.len()),
    ));

    let mut scheduler = Scheduler::restore(&net, config.clone());
    let first = scheduler.tick(&mut net);
    results.push(check(
        "recovery_rediscovers",
        matches!(&first, Ok(report) if report.tracked > 0),
        format!("{} targets after first tick", scheduler.targets().len()),
    ));

    let mut resumed = Scheduler::restore(&net, config.clone());
    let same = resumed.targets() == scheduler.targets();
    let second = resumed.tick(&mut net);
    results.push(check(
        "recovery_resume_no_duplicates",
        same && matches!(&second, Ok(report) if report.tracked == scheduler.targets().len()),
        format!("{} targets resumed", resumed.targets().len()),
    ));

    results
}

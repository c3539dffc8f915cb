//! Scriptable in-crate host for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::host::{Host, Node, Pid, PortOpener};

pub const WEAKEN_PER_THREAD: f64 = 0.05;

static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        if let Ok(mut lines) = CAPTURED.lock() {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Keep warnings and errors from the whole test binary in memory.
/// Tests share the buffer, so look for names only your test uses.
pub fn capture_logs() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Warn);
}

pub fn logged(needle: &str) -> bool {
    CAPTURED
        .lock()
        .map(|lines| lines.iter().any(|line| line.contains(needle)))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct ExecCall {
    pub script: String,
    pub node: String,
    pub threads: u64,
    pub args: Vec<String>,
}

pub struct MockHost {
    pub home: String,
    pub nodes: HashMap<String, Node>,
    pub adjacency: HashMap<String, Vec<String>>,
    pub script_rams: HashMap<String, f64>,
    pub files: HashSet<(String, String)>,
    pub running: HashMap<Pid, (String, f64)>,
    pub next_pid: Pid,
    /// Nodes on which `exec` always fails.
    pub failing: HashSet<String>,
    pub store: HashMap<String, String>,
    pub programs: HashSet<String>,
    pub hacking_level: u32,
    pub clock: u64,
    pub execs: Vec<ExecCall>,
    pub scps: Vec<(String, String)>,
    pub opened: Vec<(String, PortOpener)>,
}

pub fn node(name: &str, max_ram: f64) -> Node {
    Node {
        hostname: name.to_string(),
        has_root: true,
        max_ram,
        used_ram: 0.0,
        security: 10.0,
        min_security: 10.0,
        money: 1_000_000.0,
        max_money: 1_000_000.0,
        ports_required: 0,
        required_hacking_level: 1,
        purchased: false,
        backdoor_installed: false,
    }
}

impl MockHost {
    pub fn new(home: &str, home_ram: f64) -> Self {
        let mut home_node = node(home, home_ram);
        home_node.max_money = 0.0;
        home_node.money = 0.0;
        let mut nodes = HashMap::new();
        nodes.insert(home.to_string(), home_node);
        let mut adjacency = HashMap::new();
        adjacency.insert(home.to_string(), Vec::new());
        let mut script_rams = HashMap::new();
        for script in ["/lib/weaken.js", "/lib/grow.js", "/lib/hack.js"] {
            script_rams.insert(script.to_string(), 1.75);
        }
        script_rams.insert("/lib/share.js".to_string(), 4.0);
        Self {
            home: home.to_string(),
            nodes,
            adjacency,
            script_rams,
            files: HashSet::new(),
            running: HashMap::new(),
            next_pid: 1,
            failing: HashSet::new(),
            store: HashMap::new(),
            programs: HashSet::new(),
            hacking_level: 1,
            clock: 0,
            execs: Vec::new(),
            scps: Vec::new(),
            opened: Vec::new(),
        }
    }

    pub fn add(&mut self, node: Node) -> &mut Self {
        self.adjacency.entry(node.hostname.clone()).or_default();
        self.nodes.insert(node.hostname.clone(), node);
        self
    }

    pub fn link(&mut self, a: &str, b: &str) -> &mut Self {
        self.adjacency.entry(a.to_string()).or_default().push(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().push(a.to_string());
        self
    }

    pub fn node_mut(&mut self, name: &str) -> &mut Node {
        self.nodes.get_mut(name).expect("unknown mock node")
    }

    /// Ends a process and releases its RAM.
    pub fn finish(&mut self, pid: Pid) {
        if let Some((node, ram)) = self.running.remove(&pid) {
            if let Some(n) = self.nodes.get_mut(&node) {
                n.used_ram = (n.used_ram - ram).max(0.0);
            }
        }
    }

    pub fn finish_all(&mut self) {
        let pids: Vec<Pid> = self.running.keys().copied().collect();
        for pid in pids {
            self.finish(pid);
        }
    }
}

impl Host for MockHost {
    fn home(&self) -> &str {
        &self.home
    }

    fn scan(&self, node: &str) -> Vec<String> {
        self.adjacency.get(node).cloned().unwrap_or_default()
    }

    fn node(&self, name: &str) -> Option<Node> {
        self.nodes.get(name).cloned()
    }

    fn hacking_level(&self) -> u32 {
        self.hacking_level
    }

    fn has_program(&self, program: &str) -> bool {
        self.programs.contains(program)
    }

    fn weaken_analyze(&self, threads: u64, _cores: u32) -> f64 {
        threads as f64 * WEAKEN_PER_THREAD
    }

    fn growth_analyze(&self, _node: &str, multiplier: f64) -> f64 {
        (multiplier - 1.0).max(0.0) * 10.0
    }

    fn hack_analyze_threads(&self, node: &str, amount: f64) -> f64 {
        match self.nodes.get(node) {
            Some(n) if n.money > 0.0 => amount / (n.money * 0.01),
            _ => -1.0,
        }
    }

    fn script_ram(&self, script: &str) -> f64 {
        self.script_rams.get(script).copied().unwrap_or(0.0)
    }

    fn open_port(&mut self, node: &str, opener: PortOpener) -> bool {
        self.opened.push((node.to_string(), opener));
        true
    }

    fn nuke(&mut self, node: &str) -> bool {
        match self.nodes.get_mut(node) {
            Some(n) => {
                n.has_root = true;
                true
            }
            None => false,
        }
    }

    fn file_exists(&self, file: &str, node: &str) -> bool {
        node == self.home || self.files.contains(&(file.to_string(), node.to_string()))
    }

    fn scp(&mut self, file: &str, node: &str) -> bool {
        self.scps.push((file.to_string(), node.to_string()));
        self.files.insert((file.to_string(), node.to_string()));
        true
    }

    fn exec(&mut self, script: &str, node: &str, threads: u64, args: &[String]) -> Option<Pid> {
        self.execs.push(ExecCall {
            script: script.to_string(),
            node: node.to_string(),
            threads,
            args: args.to_vec(),
        });
        if self.failing.contains(node) || threads == 0 {
            return None;
        }
        let ram = self.script_ram(script) * threads as f64;
        let n = self.nodes.get_mut(node)?;
        if n.max_ram - n.used_ram < ram {
            return None;
        }
        n.used_ram += ram;
        let pid = self.next_pid;
        self.next_pid += 1;
        self.running.insert(pid, (node.to_string(), ram));
        Some(pid)
    }

    fn is_running(&self, pid: Pid) -> bool {
        self.running.contains_key(&pid)
    }

    fn read(&self, path: &str) -> Option<String> {
        self.store.get(path).cloned()
    }

    fn write(&mut self, path: &str, data: &str) {
        self.store.insert(path.to_string(), data.to_string());
    }

    fn now_ms(&self) -> u64 {
        self.clock
    }

    fn sleep(&mut self, ms: u64) {
        self.clock += ms;
    }
}

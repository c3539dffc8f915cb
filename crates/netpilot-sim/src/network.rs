//! The simulated network and its `Host` implementation.

use std::collections::{BTreeMap, HashMap, HashSet};

use netpilot_logic::host::{Host, Node, Pid, PortOpener};

use crate::formulas;

/// What a script does when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Weaken,
    Grow,
    Hack,
    Share,
}

/// One server in the simulation.
#[derive(Debug, Clone)]
pub struct Server {
    pub node: Node,
    /// Growth parameter; higher grows faster.
    pub growth: f64,
    pub open_ports: u32,
    pub files: HashSet<String>,
}

impl Server {
    /// A rooted server with no money and no security.
    pub fn new(hostname: &str, max_ram: f64) -> Self {
        Self {
            node: Node {
                hostname: hostname.to_string(),
                has_root: true,
                max_ram,
                used_ram: 0.0,
                security: 1.0,
                min_security: 1.0,
                money: 0.0,
                max_money: 0.0,
                ports_required: 0,
                required_hacking_level: 1,
                purchased: false,
                backdoor_installed: false,
            },
            growth: 0.0,
            open_ports: 0,
            files: HashSet::new(),
        }
    }

    /// A server worth hacking, locked behind `level` and `ports`.
    pub fn target(hostname: &str, max_ram: f64, max_money: f64, min_security: f64, level: u32, ports: u32) -> Self {
        let mut server = Self::new(hostname, max_ram);
        server.node.has_root = false;
        server.node.max_money = max_money;
        server.node.money = max_money;
        server.node.min_security = min_security;
        server.node.security = min_security;
        server.node.required_hacking_level = level;
        server.node.ports_required = ports;
        server.growth = 40.0;
        server
    }

    pub fn with_money(mut self, money: f64) -> Self {
        self.node.money = money.min(self.node.max_money);
        self
    }

    pub fn with_security(mut self, security: f64) -> Self {
        self.node.security = security.max(self.node.min_security);
        self
    }

    pub fn rooted(mut self) -> Self {
        self.node.has_root = true;
        self
    }
}

/// A started script.
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub script: String,
    pub kind: ScriptKind,
    pub node: String,
    pub threads: u64,
    pub ram: f64,
    pub target: String,
    pub finishes_at: u64,
}

/// In-memory network: servers, processes, a file store and a clock.
pub struct SimNetwork {
    home: String,
    servers: HashMap<String, Server>,
    adjacency: HashMap<String, Vec<String>>,
    scripts: HashMap<String, (ScriptKind, f64)>,
    processes: BTreeMap<Pid, Process>,
    next_pid: Pid,
    store: HashMap<String, String>,
    programs: HashSet<String>,
    base_level: u32,
    exp: f64,
    earnings: f64,
    clock: u64,
}

impl SimNetwork {
    /// Network holding only `home`, with the default worker scripts on it.
    pub fn new(home: &str, home_ram: f64) -> Self {
        let mut servers = HashMap::new();
        servers.insert(home.to_string(), Server::new(home, home_ram));
        let mut adjacency = HashMap::new();
        adjacency.insert(home.to_string(), Vec::new());

        let mut network = Self {
            home: home.to_string(),
            servers,
            adjacency,
            scripts: HashMap::new(),
            processes: BTreeMap::new(),
            next_pid: 1,
            store: HashMap::new(),
            programs: HashSet::new(),
            base_level: 1,
            exp: 0.0,
            earnings: 0.0,
            clock: 0,
        };
        network.install_script("/lib/weaken.js", ScriptKind::Weaken, 1.75);
        network.install_script("/lib/grow.js", ScriptKind::Grow, 1.75);
        network.install_script("/lib/hack.js", ScriptKind::Hack, 1.7);
        network.install_script("/lib/share.js", ScriptKind::Share, 4.0);
        network
    }

    /// Register a script and put it on home.
    pub fn install_script(&mut self, path: &str, kind: ScriptKind, ram: f64) {
        self.scripts.insert(path.to_string(), (kind, ram));
        let home = self.home.clone();
        if let Some(server) = self.servers.get_mut(&home) {
            server.files.insert(path.to_string());
        }
    }

    pub fn add_server(&mut self, server: Server) -> &mut Self {
        self.adjacency.entry(server.node.hostname.clone()).or_default();
        self.servers.insert(server.node.hostname.clone(), server);
        self
    }

    /// Connect two servers both ways. Repeated links are ignored.
    pub fn link(&mut self, a: &str, b: &str) -> &mut Self {
        if a == b || self.linked(a, b) {
            return self;
        }
        self.adjacency.entry(a.to_string()).or_default().push(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().push(a.to_string());
        self
    }

    pub fn linked(&self, a: &str, b: &str) -> bool {
        self.adjacency.get(a).map_or(false, |n| n.iter().any(|x| x == b))
    }

    pub fn server(&self, name: &str) -> Option<&Server> {
        self.servers.get(name)
    }

    pub fn server_mut(&mut self, name: &str) -> Option<&mut Server> {
        self.servers.get_mut(name)
    }

    /// Server names in no particular order.
    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn grant_program(&mut self, program: &str) {
        self.programs.insert(program.to_string());
    }

    pub fn set_hacking_level(&mut self, level: u32) {
        self.base_level = level;
    }

    /// Money stolen by completed hacks so far.
    pub fn earnings(&self) -> f64 {
        self.earnings
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn running_count(&self) -> usize {
        self.processes.len()
    }

    /// Remove a process without applying its effect.
    pub fn kill(&mut self, pid: Pid) -> bool {
        match self.processes.remove(&pid) {
            Some(process) => {
                self.release(&process);
                true
            }
            None => false,
        }
    }

    fn release(&mut self, process: &Process) {
        if let Some(server) = self.servers.get_mut(&process.node) {
            server.node.used_ram = (server.node.used_ram - process.ram).max(0.0);
        }
    }

    fn duration_ms(&self, kind: ScriptKind, target: &str) -> u64 {
        let (security, level) = self
            .servers
            .get(target)
            .map(|s| (s.node.security, s.node.required_hacking_level))
            .unwrap_or((formulas::MAX_SECURITY, 1));
        match kind {
            ScriptKind::Weaken => formulas::weaken_time_ms(security, level),
            ScriptKind::Grow => formulas::grow_time_ms(security, level),
            ScriptKind::Hack => formulas::hack_time_ms(security, level),
            ScriptKind::Share => formulas::share_time_ms(),
        }
    }

    /// Complete every process due by the current clock, earliest first.
    fn complete_due(&mut self) {
        let mut due: Vec<(u64, Pid)> = self
            .processes
            .values()
            .filter(|p| p.finishes_at <= self.clock)
            .map(|p| (p.finishes_at, p.pid))
            .collect();
        due.sort_unstable();

        for (_, pid) in due {
            if let Some(process) = self.processes.remove(&pid) {
                self.release(&process);
                self.apply(&process);
            }
        }
    }

    fn apply(&mut self, process: &Process) {
        let level = formulas::hacking_level(self.base_level, self.exp);
        let server = match self.servers.get_mut(&process.target) {
            Some(server) => server,
            None => return,
        };
        let node = &mut server.node;
        let threads = process.threads;

        match process.kind {
            ScriptKind::Weaken => {
                let effect = formulas::weaken_effect(threads, 1);
                node.security = (node.security - effect).max(node.min_security);
            }
            ScriptKind::Grow => {
                node.money = formulas::grown_money(node.money, node.max_money, server.growth, node.security, threads);
                node.security = (node.security + threads as f64 * formulas::GROW_SECURITY_PER_THREAD)
                    .min(formulas::MAX_SECURITY);
            }
            ScriptKind::Hack => {
                let fraction = formulas::hack_fraction(node.security, level, node.required_hacking_level);
                let stolen = node.money * (fraction * threads as f64).min(1.0);
                node.money -= stolen;
                node.security = (node.security + threads as f64 * formulas::HACK_SECURITY_PER_THREAD)
                    .min(formulas::MAX_SECURITY);
                self.earnings += stolen;
            }
            ScriptKind::Share => return,
        }

        self.exp += threads as f64 * 0.1;
        log::trace!(
            "{:?} x{} on {} finished at {}",
            process.kind,
            threads,
            process.target,
            self.clock
        );
    }
}

impl Host for SimNetwork {
    fn home(&self) -> &str {
        &self.home
    }

    fn scan(&self, node: &str) -> Vec<String> {
        self.adjacency.get(node).cloned().unwrap_or_default()
    }

    fn node(&self, name: &str) -> Option<Node> {
        self.servers.get(name).map(|s| s.node.clone())
    }

    fn hacking_level(&self) -> u32 {
        formulas::hacking_level(self.base_level, self.exp)
    }

    fn has_program(&self, program: &str) -> bool {
        self.programs.contains(program)
    }

    fn weaken_analyze(&self, threads: u64, cores: u32) -> f64 {
        formulas::weaken_effect(threads, cores)
    }

    fn growth_analyze(&self, node: &str, multiplier: f64) -> f64 {
        match self.servers.get(node) {
            Some(server) => formulas::grow_threads(server.growth, server.node.security, multiplier),
            None => 0.0,
        }
    }

    fn hack_analyze_threads(&self, node: &str, amount: f64) -> f64 {
        let server = match self.servers.get(node) {
            Some(server) => server,
            None => return -1.0,
        };
        let fraction = formulas::hack_fraction(
            server.node.security,
            self.hacking_level(),
            server.node.required_hacking_level,
        );
        if fraction <= 0.0 || server.node.money <= 0.0 {
            return -1.0;
        }
        amount / (server.node.money * fraction)
    }

    fn script_ram(&self, script: &str) -> f64 {
        self.scripts.get(script).map_or(0.0, |(_, ram)| *ram)
    }

    fn open_port(&mut self, node: &str, opener: PortOpener) -> bool {
        if !self.programs.contains(opener.program()) {
            return false;
        }
        match self.servers.get_mut(node) {
            Some(server) => {
                server.open_ports += 1;
                true
            }
            None => false,
        }
    }

    fn nuke(&mut self, node: &str) -> bool {
        match self.servers.get_mut(node) {
            Some(server) if server.open_ports >= server.node.ports_required => {
                server.node.has_root = true;
                true
            }
            _ => false,
        }
    }

    fn file_exists(&self, file: &str, node: &str) -> bool {
        self.servers.get(node).map_or(false, |s| s.files.contains(file))
    }

    fn scp(&mut self, file: &str, node: &str) -> bool {
        if !self.file_exists(file, &self.home) {
            return false;
        }
        match self.servers.get_mut(node) {
            Some(server) => {
                server.files.insert(file.to_string());
                true
            }
            None => false,
        }
    }

    fn exec(&mut self, script: &str, node: &str, threads: u64, args: &[String]) -> Option<Pid> {
        if threads == 0 {
            return None;
        }
        let (kind, unit_ram) = *self.scripts.get(script)?;
        let ram = unit_ram * threads as f64;
        let server = self.servers.get_mut(node)?;
        if !server.node.has_root || !server.files.contains(script) || server.node.free_ram() < ram {
            return None;
        }
        server.node.used_ram += ram;

        let target = args.first().cloned().unwrap_or_default();
        let finishes_at = self.clock + self.duration_ms(kind, &target);
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.insert(
            pid,
            Process {
                pid,
                script: script.to_string(),
                kind,
                node: node.to_string(),
                threads,
                ram,
                target,
                finishes_at,
            },
        );
        Some(pid)
    }

    fn is_running(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
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
        self.complete_due();
    }
}

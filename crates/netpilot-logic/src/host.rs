//! Host API surface consumed by the scheduler.
//!
//! The host owns the world: servers, their RAM, running processes, the
//! file store and the clock. NetPilot only queries it and issues commands.

use serde::{Deserialize, Serialize};

/// Opaque process handle returned by [`Host::exec`].
pub type Pid = u32;

/// Snapshot of one server's attributes at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    /// Root access has been granted.
    pub has_root: bool,
    pub max_ram: f64,
    pub used_ram: f64,
    pub security: f64,
    pub min_security: f64,
    pub money: f64,
    pub max_money: f64,
    /// Ports that must be opened before `nuke` succeeds.
    pub ports_required: u32,
    pub required_hacking_level: u32,
    pub purchased: bool,
    pub backdoor_installed: bool,
}

impl Node {
    /// RAM not currently held by running processes.
    pub fn free_ram(&self) -> f64 {
        (self.max_ram - self.used_ram).max(0.0)
    }
}

/// Port-opening programs, in the order the game unlocks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortOpener {
    BruteSsh,
    FtpCrack,
    RelaySmtp,
    HttpWorm,
    SqlInject,
}

impl PortOpener {
    pub fn all() -> &'static [PortOpener] {
        &[
            PortOpener::BruteSsh,
            PortOpener::FtpCrack,
            PortOpener::RelaySmtp,
            PortOpener::HttpWorm,
            PortOpener::SqlInject,
        ]
    }

    /// Program file that must exist on the home server.
    pub fn program(self) -> &'static str {
        match self {
            PortOpener::BruteSsh => "BruteSSH.exe",
            PortOpener::FtpCrack => "FTPCrack.exe",
            PortOpener::RelaySmtp => "relaySMTP.exe",
            PortOpener::HttpWorm => "HTTPWorm.exe",
            PortOpener::SqlInject => "SQLInject.exe",
        }
    }
}

/// The game API as seen by NetPilot.
///
/// Queries take `&self`; anything that changes the world takes `&mut self`.
/// [`Host::sleep`] is the only point where simulated or real time passes.
pub trait Host {
    /// Name of the server the controlling process runs on.
    fn home(&self) -> &str;

    /// Servers directly connected to `node`, in host order.
    fn scan(&self, node: &str) -> Vec<String>;

    /// Attribute snapshot, `None` for unknown names.
    fn node(&self, name: &str) -> Option<Node>;

    fn hacking_level(&self) -> u32;

    /// Whether a program (e.g. a port opener) is available on home.
    fn has_program(&self, program: &str) -> bool;

    /// Security decrease achieved by `threads` weaken threads on `cores` cores.
    /// Thread estimates always ask for one core, the weakest case.
    fn weaken_analyze(&self, threads: u64, cores: u32) -> f64;

    /// Grow threads needed to multiply the money on `node` by `multiplier`.
    fn growth_analyze(&self, node: &str, multiplier: f64) -> f64;

    /// Hack threads needed to steal `amount` from `node`. Negative when impossible.
    fn hack_analyze_threads(&self, node: &str, amount: f64) -> f64;

    /// RAM cost of one thread of `script`.
    fn script_ram(&self, script: &str) -> f64;

    fn open_port(&mut self, node: &str, opener: PortOpener) -> bool;

    fn nuke(&mut self, node: &str) -> bool;

    fn file_exists(&self, file: &str, node: &str) -> bool;

    /// Copy `file` from home to `node`.
    fn scp(&mut self, file: &str, node: &str) -> bool;

    /// Start `script` on `node` with `threads` threads. `None` on failure.
    fn exec(&mut self, script: &str, node: &str, threads: u64, args: &[String]) -> Option<Pid>;

    fn is_running(&self, pid: Pid) -> bool;

    /// Durable text store.
    fn read(&self, path: &str) -> Option<String>;

    /// Overwrites the whole file.
    fn write(&mut self, path: &str, data: &str);

    /// Milliseconds on the host clock.
    fn now_ms(&self) -> u64;

    fn sleep(&mut self, ms: u64);
}

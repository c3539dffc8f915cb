//! Effect and timing formulas for the simulated network.
//!
//! Deliberately simple closed forms: monotone in threads, and the analyze
//! functions agree with what the completion effects actually do.

/// Security removed per weaken thread on one core.
pub const WEAKEN_PER_THREAD: f64 = 0.05;
/// Security added per grow thread.
pub const GROW_SECURITY_PER_THREAD: f64 = 0.004;
/// Security added per hack thread.
pub const HACK_SECURITY_PER_THREAD: f64 = 0.002;
/// Money added per grow thread before multiplying, so empty servers recover.
pub const GROW_FLAT_PER_THREAD: f64 = 1.0;
/// Highest possible security level.
pub const MAX_SECURITY: f64 = 100.0;

const HACK_BASE_FRACTION: f64 = 0.002;
const HACK_TIME_BASE_MS: f64 = 1_000.0;
const SHARE_TIME_MS: u64 = 10_000;

/// Security decrease of `threads` weaken threads on a server with `cores`.
pub fn weaken_effect(threads: u64, cores: u32) -> f64 {
    let core_bonus = 1.0 + (cores.max(1) - 1) as f64 / 16.0;
    threads as f64 * WEAKEN_PER_THREAD * core_bonus
}

/// Per-thread growth factor of a server with growth parameter `growth`
/// at `security`.
pub fn grow_rate(growth: f64, security: f64) -> f64 {
    let penalty = (1.0 + security / 25.0).max(1.0);
    1.0 + (growth / 2_000.0) / penalty
}

/// Grow threads needed to multiply money by `multiplier`.
pub fn grow_threads(growth: f64, security: f64, multiplier: f64) -> f64 {
    if multiplier <= 1.0 {
        return 0.0;
    }
    let rate = grow_rate(growth, security);
    if rate <= 1.0 {
        return f64::INFINITY;
    }
    multiplier.ln() / rate.ln()
}

/// Money after `threads` grow threads complete, capped at `max_money`.
pub fn grown_money(money: f64, max_money: f64, growth: f64, security: f64, threads: u64) -> f64 {
    let rate = grow_rate(growth, security);
    let seeded = money.max(0.0) + threads as f64 * GROW_FLAT_PER_THREAD;
    (seeded * rate.powf(threads as f64)).min(max_money)
}

/// Fraction of current money one hack thread steals.
pub fn hack_fraction(security: f64, hacking_level: u32, required_level: u32) -> f64 {
    if hacking_level < required_level || hacking_level == 0 {
        return 0.0;
    }
    let difficulty = ((MAX_SECURITY - security) / MAX_SECURITY).max(0.0);
    let skill = (hacking_level - required_level + 1) as f64 / hacking_level as f64;
    HACK_BASE_FRACTION * difficulty * skill.clamp(0.0, 1.0)
}

/// Duration of a hack against a server.
pub fn hack_time_ms(security: f64, required_level: u32) -> u64 {
    (HACK_TIME_BASE_MS + required_level as f64 * 5.0 + security * 40.0) as u64
}

pub fn grow_time_ms(security: f64, required_level: u32) -> u64 {
    hack_time_ms(security, required_level) * 16 / 5
}

pub fn weaken_time_ms(security: f64, required_level: u32) -> u64 {
    hack_time_ms(security, required_level) * 4
}

pub fn share_time_ms() -> u64 {
    SHARE_TIME_MS
}

/// Hacking level reached with `exp` experience; never below `base`.
pub fn hacking_level(base: u32, exp: f64) -> u32 {
    let earned = 1.0 + (exp.max(0.0) / 4.0).sqrt();
    base.max(earned.floor() as u32)
}

//! Seeded random network generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::network::{Server, SimNetwork};

/// Server names handed out in order before falling back to numbered ones.
const SERVER_NAMES: &[&str] = &[
    "n00dles",
    "foodnstuff",
    "sigma-cosmetics",
    "joesguns",
    "hong-fang-tea",
    "harakiri-sushi",
    "iron-gym",
    "nectar-net",
    "zer0",
    "max-hardware",
    "CSEC",
    "neo-net",
    "silver-helix",
    "phantasy",
    "omega-net",
    "crush-fitness",
    "johnson-ortho",
    "the-hub",
    "comptek",
    "netlink",
    "rothman-uni",
    "catalyst",
    "summit-uni",
    "rho-construction",
    "millenium-fitness",
    "aevum-police",
    "alpha-ent",
    "syscore",
    "lexo-corp",
    "snap-fitness",
    "global-pharm",
    "zb-institute",
    "omnia",
    "unitalife",
    "univ-energy",
    "solaris",
    "defcomm",
    "galactic-cyber",
    "zeus-med",
    "deltaone",
];

const RAM_SIZES: &[f64] = &[0.0, 0.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0];

/// Shape of a generated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Servers besides home and purchased ones.
    pub size: usize,
    pub home_ram: f64,
    pub purchased_servers: usize,
    pub purchased_ram: f64,
    /// Extra random links on top of the spanning tree, as a share of `size`.
    pub extra_link_ratio: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            size: 30,
            home_ram: 64.0,
            purchased_servers: 2,
            purchased_ram: 64.0,
            extra_link_ratio: 0.25,
        }
    }
}

fn server_name(index: usize) -> String {
    SERVER_NAMES
        .get(index)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("node-{}", index))
}

/// Build a connected network with cycles. Servers further from home are
/// harder to take and hold more money.
pub fn generate_network(config: &NetworkConfig, rng: &mut impl Rng) -> SimNetwork {
    let mut network = SimNetwork::new("home", config.home_ram);
    let mut names = vec!["home".to_string()];

    for i in 0..config.size {
        let name = server_name(i);
        let tier = (i * 10 / config.size.max(1)) as u32;

        let min_security = rng.gen_range(1.0..5.0) + tier as f64 * 3.0;
        let max_money = 50_000.0 * (1.0 + tier as f64).powi(3) * rng.gen_range(0.5..2.0);
        // The first tier is always open at level 1 so a fresh player can start.
        let level = if tier == 0 { 1 } else { 1 + tier * tier * 8 + rng.gen_range(0..5) };
        let ports = (tier / 2).min(5);
        let ram = RAM_SIZES[rng.gen_range(0..RAM_SIZES.len())];

        let mut server = Server::target(&name, ram, max_money, min_security, level, ports)
            .with_money(max_money * rng.gen_range(0.05..0.6))
            .with_security(min_security * rng.gen_range(1.5..3.0));
        server.growth = rng.gen_range(10.0..80.0);
        network.add_server(server);

        // Attach to a recent server so depth tracks tier.
        let window = names.len().min(6);
        let parent = names[names.len() - 1 - rng.gen_range(0..window)].clone();
        network.link(&parent, &name);
        names.push(name);
    }

    let extra = (config.size as f64 * config.extra_link_ratio) as usize;
    for _ in 0..extra {
        if names.len() < 3 {
            break;
        }
        let a = names[rng.gen_range(1..names.len())].clone();
        let b = names[rng.gen_range(1..names.len())].clone();
        network.link(&a, &b);
    }

    for i in 0..config.purchased_servers {
        let mut server = Server::new(&format!("pserv-{}", i), config.purchased_ram);
        server.node.purchased = true;
        let name = server.node.hostname.clone();
        network.add_server(server);
        network.link("home", &name);
    }

    network
}

impl SimNetwork {
    /// Seeded network of `size` servers with default proportions.
    pub fn generate(seed: u64, size: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = NetworkConfig {
            size,
            ..NetworkConfig::default()
        };
        generate_network(&config, &mut rng)
    }
}

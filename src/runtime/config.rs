use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ids::{Endpoint, NodeId};
use crate::model::state::NeighborInfo;

pub const DEFAULT_LSA_PERIOD_S: f64 = 30.0;
pub const DEFAULT_AGE_SWEEP_PERIOD_S: f64 = 10.0;
pub const NEIGHBOR_DEAD_FACTOR: f64 = 3.0;
pub const LSA_MAX_AGE_FACTOR: f64 = 3.0;
pub const DEFAULT_TTL: u8 = 16;
pub const DEFAULT_RETRY_INTERVAL_S: f64 = 5.0;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BURST: usize = 100;
pub const DEFAULT_RNG_SEED: u64 = 0x5EED_1234_u64;

/// Resolved configuration for a router process, built from `RawRouterConfig`
/// with every optional field defaulted. Mirrors the field set `RouterDaemon`
/// actually consumes.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub router_id: NodeId,
    pub bind_address: String,
    pub bind_port: u16,
    pub ttl: u8,
    pub neighbors: Vec<NeighborInfo>,
    pub hosts: Vec<AttachedHostConfig>,
    pub lsa_period: Duration,
    pub age_sweep_period: Duration,
    pub neighbor_dead_interval: Duration,
    pub lsa_max_age: Duration,
    pub rng_seed: u64,
}

#[derive(Debug, Clone)]
pub struct AttachedHostConfig {
    pub id: NodeId,
    pub endpoint: Endpoint,
}

/// Resolved configuration for a host process.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub host_id: NodeId,
    pub bind_address: String,
    pub bind_port: u16,
    pub router_endpoint: Endpoint,
    pub known_peers: Vec<NodeId>,
    pub ttl: u8,
    pub retry_interval: Duration,
    pub max_attempts: u32,
    pub initial_burst: usize,
    pub rng_seed: u64,
}

#[derive(Debug, Deserialize, Default)]
struct RawBind {
    address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum RawNeighborKind {
    Router,
    Host,
}

#[derive(Debug, Deserialize)]
struct RawNeighbor {
    id: String,
    address: String,
    port: u16,
    cost: Option<u32>,
    #[serde(default)]
    kind: Option<RawNeighborKind>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRouterTimers {
    lsa_period_s: Option<f64>,
    age_sweep_period_s: Option<f64>,
    neighbor_dead_interval_s: Option<f64>,
    lsa_max_age_s: Option<f64>,
    ttl: Option<u8>,
    rng_seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRouterConfig {
    router_id: String,
    bind: RawBind,
    #[serde(default)]
    neighbors: Vec<RawNeighbor>,
    timers: Option<RawRouterTimers>,
}

pub fn load_router_config(path: &Path) -> Result<RouterConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read router config file {}", path.display()))?;
    let raw: RawRouterConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse router config yaml {}", path.display()))?;
    resolve_router_config(raw, path)
}

fn resolve_router_config(raw: RawRouterConfig, path: &Path) -> Result<RouterConfig> {
    let timers = raw.timers.unwrap_or_default();
    let lsa_period_s = timers.lsa_period_s.unwrap_or(DEFAULT_LSA_PERIOD_S);
    let neighbor_dead_interval_s = timers
        .neighbor_dead_interval_s
        .unwrap_or(lsa_period_s * NEIGHBOR_DEAD_FACTOR);
    let lsa_max_age_s = timers
        .lsa_max_age_s
        .unwrap_or(lsa_period_s * LSA_MAX_AGE_FACTOR);

    let mut neighbors = Vec::new();
    let mut hosts = Vec::new();
    for item in raw.neighbors {
        let endpoint = Endpoint::new(item.address, item.port);
        match item.kind.unwrap_or(RawNeighborKind::Router) {
            RawNeighborKind::Router => neighbors.push(NeighborInfo {
                id: NodeId::from(item.id),
                endpoint,
                link_cost: item.cost.unwrap_or(1),
                last_seen: None,
                is_up: false,
            }),
            RawNeighborKind::Host => hosts.push(AttachedHostConfig {
                id: NodeId::from(item.id),
                endpoint,
            }),
        }
    }

    let bind_port = raw
        .bind
        .port
        .with_context(|| format!("router config {} missing bind.port", path.display()))?;

    Ok(RouterConfig {
        router_id: NodeId::from(raw.router_id),
        bind_address: raw.bind.address.unwrap_or_else(|| "0.0.0.0".to_string()),
        bind_port,
        ttl: timers.ttl.unwrap_or(DEFAULT_TTL),
        neighbors,
        hosts,
        lsa_period: Duration::from_secs_f64(lsa_period_s),
        age_sweep_period: Duration::from_secs_f64(
            timers.age_sweep_period_s.unwrap_or(DEFAULT_AGE_SWEEP_PERIOD_S),
        ),
        neighbor_dead_interval: Duration::from_secs_f64(neighbor_dead_interval_s),
        lsa_max_age: Duration::from_secs_f64(lsa_max_age_s),
        rng_seed: timers.rng_seed.unwrap_or(DEFAULT_RNG_SEED),
    })
}

#[derive(Debug, Deserialize)]
struct RawRouterEndpoint {
    address: String,
    port: u16,
}

#[derive(Debug, Deserialize, Default)]
struct RawHostTimers {
    retry_interval_s: Option<f64>,
    max_attempts: Option<u32>,
    initial_burst: Option<usize>,
    ttl: Option<u8>,
    rng_seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawHostConfig {
    host_id: String,
    bind: RawBind,
    router: RawRouterEndpoint,
    #[serde(default)]
    known_peers: Vec<String>,
    timers: Option<RawHostTimers>,
}

pub fn load_host_config(path: &Path) -> Result<HostConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read host config file {}", path.display()))?;
    let raw: RawHostConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse host config yaml {}", path.display()))?;
    resolve_host_config(raw, path)
}

fn resolve_host_config(raw: RawHostConfig, path: &Path) -> Result<HostConfig> {
    let timers = raw.timers.unwrap_or_default();
    let bind_port = raw
        .bind
        .port
        .with_context(|| format!("host config {} missing bind.port", path.display()))?;

    Ok(HostConfig {
        host_id: NodeId::from(raw.host_id),
        bind_address: raw.bind.address.unwrap_or_else(|| "0.0.0.0".to_string()),
        bind_port,
        router_endpoint: Endpoint::new(raw.router.address, raw.router.port),
        known_peers: raw.known_peers.into_iter().map(NodeId::from).collect(),
        ttl: timers.ttl.unwrap_or(DEFAULT_TTL),
        retry_interval: Duration::from_secs_f64(
            timers.retry_interval_s.unwrap_or(DEFAULT_RETRY_INTERVAL_S),
        ),
        max_attempts: timers.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        initial_burst: timers.initial_burst.unwrap_or(DEFAULT_INITIAL_BURST),
        rng_seed: timers.rng_seed.unwrap_or(DEFAULT_RNG_SEED),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, contents).expect("write temp config");
        path
    }

    #[test]
    fn router_config_resolves_defaults_and_splits_hosts_from_neighbors() {
        let path = write_temp(
            "meshrouted_test_router_a.yaml",
            r#"
router_id: A
bind:
  address: 127.0.0.1
  port: 6000
neighbors:
  - id: B
    address: 127.0.0.1
    port: 6001
    cost: 2
  - id: H1
    address: 127.0.0.1
    port: 7001
    kind: host
"#,
        );
        let cfg = load_router_config(&path).expect("config should load");
        fs::remove_file(&path).ok();

        assert_eq!(cfg.router_id, NodeId::from("A"));
        assert_eq!(cfg.ttl, DEFAULT_TTL);
        assert_eq!(cfg.neighbors.len(), 1);
        assert_eq!(cfg.neighbors[0].link_cost, 2);
        assert_eq!(cfg.hosts.len(), 1);
        assert_eq!(cfg.hosts[0].id, NodeId::from("H1"));
        assert_eq!(cfg.lsa_period, Duration::from_secs_f64(DEFAULT_LSA_PERIOD_S));
        assert_eq!(
            cfg.neighbor_dead_interval,
            Duration::from_secs_f64(DEFAULT_LSA_PERIOD_S * NEIGHBOR_DEAD_FACTOR)
        );
    }

    #[test]
    fn router_config_missing_bind_port_is_a_startup_error() {
        let path = write_temp(
            "meshrouted_test_router_b.yaml",
            r#"
router_id: A
bind:
  address: 127.0.0.1
"#,
        );
        let result = load_router_config(&path);
        fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn host_config_resolves_known_peers_and_router_endpoint() {
        let path = write_temp(
            "meshrouted_test_host_a.yaml",
            r#"
host_id: H1
bind:
  port: 7001
router:
  address: 127.0.0.1
  port: 6000
known_peers: [H2, H3]
timers:
  max_attempts: 5
"#,
        );
        let cfg = load_host_config(&path).expect("config should load");
        fs::remove_file(&path).ok();

        assert_eq!(cfg.host_id, NodeId::from("H1"));
        assert_eq!(cfg.router_endpoint, Endpoint::new("127.0.0.1", 6000));
        assert_eq!(cfg.known_peers, vec![NodeId::from("H2"), NodeId::from("H3")]);
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.initial_burst, DEFAULT_INITIAL_BURST);
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::ids::{Endpoint, NodeId};
use crate::observability::{ObservabilityHook, TracingObservabilityHook};
use crate::rng::Lcg;
use crate::runtime::config::RouterConfig;
use crate::runtime::transport::UdpTransport;
use crate::timers::PeriodicTimer;
use crate::wire;

use super::{AttachedHost, RouterAction, RouterCore};

/// Read-only snapshot of a router's forwarding table, published for any
/// out-of-process consumer without blocking the event loop on recomputation.
pub type ForwardingSnapshot = Arc<RwLock<BTreeMap<NodeId, Endpoint>>>;

pub struct RouterDaemon {
    core: RouterCore,
    transport: UdpTransport,
    lsa_timer: PeriodicTimer,
    age_sweep_timer: PeriodicTimer,
    neighbor_dead_interval: Duration,
    lsa_max_age: Duration,
    rng: Lcg,
    snapshot: ForwardingSnapshot,
    recv_timeout: Duration,
    running: Arc<AtomicBool>,
}

impl RouterDaemon {
    pub fn new(cfg: RouterConfig) -> Result<Self> {
        let transport = UdpTransport::bind(&cfg.bind_address, cfg.bind_port, 4096)
            .with_context(|| format!("failed to bind router socket on {}:{}", cfg.bind_address, cfg.bind_port))?;

        let hook: Arc<dyn ObservabilityHook> = Arc::new(TracingObservabilityHook);
        let hosts: Vec<AttachedHost> = cfg
            .hosts
            .iter()
            .map(|h| AttachedHost {
                id: h.id.clone(),
                endpoint: h.endpoint.clone(),
            })
            .collect();
        let now = Instant::now();
        let core = RouterCore::new(cfg.router_id.clone(), cfg.ttl, cfg.neighbors.clone(), hosts, hook, now);

        Ok(Self {
            core,
            transport,
            lsa_timer: PeriodicTimer::new(cfg.lsa_period, 0.1, now),
            age_sweep_timer: PeriodicTimer::new(cfg.age_sweep_period, 0.0, now),
            neighbor_dead_interval: cfg.neighbor_dead_interval,
            lsa_max_age: cfg.lsa_max_age,
            rng: Lcg::new(cfg.rng_seed),
            snapshot: Arc::new(RwLock::new(BTreeMap::new())),
            recv_timeout: Duration::from_millis(200),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn forwarding_snapshot(&self) -> ForwardingSnapshot {
        self.snapshot.clone()
    }

    pub fn run_forever(&mut self) -> Result<()> {
        self.install_signal_handler()?;
        info!(router_id = %self.core.self_id, "router daemon starting");
        while self.running.load(AtomicOrdering::Relaxed) {
            self.tick_once()?;
        }
        info!("router daemon shutting down");
        Ok(())
    }

    fn install_signal_handler(&self) -> Result<()> {
        let running = Arc::clone(&self.running);
        ctrlc::set_handler(move || {
            running.store(false, AtomicOrdering::Relaxed);
        })
        .context("failed to install signal handler")
    }

    fn tick_once(&mut self) -> Result<()> {
        match self.transport.recv(self.recv_timeout) {
            Ok(Some((bytes, from))) => self.handle_packet(&bytes, from.to_string()),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "socket recv error"),
        }

        let now = Instant::now();
        if self.lsa_timer.due(now, &mut self.rng) {
            let actions = self.core.originate_lsa(now);
            self.apply_actions(actions);
        }
        if self.age_sweep_timer.due(now, &mut self.rng) {
            if self.core.age_sweep(now, self.neighbor_dead_interval, self.lsa_max_age) {
                debug!("age sweep changed topology state");
            }
        }
        self.publish_snapshot();
        Ok(())
    }

    fn handle_packet(&mut self, bytes: &[u8], from_addr: String) {
        let message = match wire::decode(bytes) {
            Ok(m) => m,
            Err(err) => {
                debug!(error = %err, "dropping malformed datagram");
                return;
            }
        };

        let Some((address, port)) = from_addr.rsplit_once(':') else {
            return;
        };
        let Ok(port) = port.parse::<u16>() else {
            return;
        };
        let arrival_endpoint = Endpoint::new(address, port);

        let actions = self.core.receive(message, &arrival_endpoint, Instant::now());
        self.apply_actions(actions);
    }

    fn apply_actions(&mut self, actions: Vec<RouterAction>) {
        for action in actions {
            let RouterAction::SendTo { endpoint, message } = action;
            match wire::encode(&message) {
                Ok(bytes) => {
                    if let Err(err) = self.transport.send(&bytes, &endpoint.address, endpoint.port) {
                        warn!(error = %err, %endpoint, "failed to send datagram");
                    }
                }
                Err(err) => warn!(error = %err, "failed to encode outbound datagram"),
            }
        }
    }

    fn publish_snapshot(&self) {
        let mut guard = self.snapshot.write().expect("forwarding snapshot lock poisoned");
        *guard = self.core.forwarding_table().clone();
    }
}

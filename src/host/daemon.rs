use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::ids::Endpoint;
use crate::observability::{ObservabilityHook, TracingObservabilityHook};
use crate::rng::Lcg;
use crate::runtime::config::HostConfig;
use crate::runtime::transport::UdpTransport;
use crate::timers::PeriodicTimer;
use crate::wire;

use super::{HostAction, HostCore};

const RETRY_SCAN_PERIOD: Duration = Duration::from_millis(500);

pub struct HostDaemon {
    core: HostCore,
    transport: UdpTransport,
    router_endpoint: Endpoint,
    retry_timer: PeriodicTimer,
    retry_rng: Lcg,
    recv_timeout: Duration,
    initial_burst: usize,
    running: Arc<AtomicBool>,
}

impl HostDaemon {
    pub fn new(cfg: HostConfig) -> Result<Self> {
        let transport = UdpTransport::bind(&cfg.bind_address, cfg.bind_port, 4096)
            .with_context(|| format!("failed to bind host socket on {}:{}", cfg.bind_address, cfg.bind_port))?;

        let hook: Arc<dyn ObservabilityHook> = Arc::new(TracingObservabilityHook);
        let core = HostCore::new(
            cfg.host_id.clone(),
            cfg.ttl,
            cfg.known_peers.clone(),
            cfg.retry_interval,
            cfg.max_attempts,
            cfg.rng_seed,
            hook,
        );

        let now = Instant::now();
        Ok(Self {
            core,
            transport,
            router_endpoint: cfg.router_endpoint,
            retry_timer: PeriodicTimer::new(RETRY_SCAN_PERIOD, 0.0, now),
            retry_rng: Lcg::new(cfg.rng_seed ^ 0x1),
            recv_timeout: Duration::from_millis(200),
            initial_burst: cfg.initial_burst,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn run_forever(&mut self) -> Result<()> {
        self.install_signal_handler()?;
        info!(host_id = %self.core.self_id, "host daemon starting");

        let actions = self.core.startup_burst(self.initial_burst, Instant::now());
        self.apply_actions(actions);

        while self.running.load(AtomicOrdering::Relaxed) {
            self.tick_once()?;
        }
        info!("host daemon shutting down");
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
            Ok(Some((bytes, _from))) => self.handle_packet(&bytes),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "socket recv error"),
        }

        let now = Instant::now();
        if self.retry_timer.due(now, &mut self.retry_rng) {
            let actions = self.core.retry_scan(now);
            if !actions.is_empty() {
                debug!(count = actions.len(), "retransmitting due requests");
            }
            self.apply_actions(actions);
        }
        Ok(())
    }

    fn handle_packet(&mut self, bytes: &[u8]) {
        let message = match wire::decode(bytes) {
            Ok(m) => m,
            Err(err) => {
                debug!(error = %err, "dropping malformed datagram");
                return;
            }
        };
        let actions = self.core.on_receive(message, Instant::now());
        self.apply_actions(actions);
    }

    /// All host traffic is sent to the local router; hosts never route.
    fn apply_actions(&mut self, actions: Vec<HostAction>) {
        for action in actions {
            match wire::encode(&action.message) {
                Ok(bytes) => {
                    if let Err(err) = self
                        .transport
                        .send(&bytes, &self.router_endpoint.address, self.router_endpoint.port)
                    {
                        warn!(error = %err, "failed to send datagram to local router");
                    }
                }
                Err(err) => warn!(error = %err, "failed to encode outbound datagram"),
            }
        }
    }
}

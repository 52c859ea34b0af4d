// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use capture::{CaptureHandle, Direction, WinDivertCaptureHandle};
use config::{EngineConfig, Mode};
use flowtrack::{FlowTableWriter, FlowTracker, WindowsSocketEnumerator};
use nat::NatTable;
use portresolve::WindowsPortResolver;
use routeprog::{InstalledRoutes, WindowsRouteTable};

use crate::error::EngineError;
use crate::policy::PolicyWriter;
use crate::{inbound, logging, outbound};

/// How long `stop()` waits for each worker thread to finish before abandoning it (§4.6, "Stop
/// sequence"). Workers are daemon-class: they must never prevent process exit.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

struct RunningState {
    stop: Arc<AtomicBool>,
    tracker_stop: std::sync::mpsc::Sender<()>,
    tracker_handle: std::thread::JoinHandle<()>,
    outbound_handle: std::thread::JoinHandle<()>,
    outbound_capture: Arc<dyn CaptureHandle>,
    inbound_handle: std::thread::JoinHandle<()>,
    inbound_capture: Arc<dyn CaptureHandle>,
    routes: Option<InstalledRoutes>,
    policy_writer: PolicyWriter,
    span: tracing::Span,
}

/// The engine's only public contract (§4.6): start/stop the three long-running workers and
/// push atomic policy updates into the running instance.
///
/// `start`/`stop` are not re-entrant — both take `&mut self` and are meant to be driven from a
/// single external thread, per §2's control-flow note.
pub struct Engine {
    state: Mutex<Option<RunningState>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct an engine with no workers running.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    /// Start the engine: validate the capture subsystem, reset all tables, install routes if a
    /// gateway/interface pair is configured, and spawn the tracker and both diverters.
    ///
    /// If the engine is already running, it is stopped first (§4.6, "Start sequence").
    ///
    /// # Errors
    ///
    /// [`EngineError::NotInstalled`] if the capture driver is not present, or
    /// [`EngineError::CaptureOpen`] if a handle could not be opened. Either failure leaves the
    /// engine in the same not-running state it started in.
    pub fn start(&self, config: &EngineConfig) -> Result<(), EngineError> {
        logging::install();

        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            Self::stop_locked(&mut guard);
        }

        // Validate the capture subsystem before any other side effect: open both handles up
        // front so a missing driver fails fast with nothing left to unwind. If the inbound open
        // fails after the outbound one succeeded, the outbound handle must be closed here —
        // nothing else is holding it yet, so it would otherwise leak for the rest of the
        // process's life.
        let outbound_capture: Arc<dyn CaptureHandle> =
            Arc::new(WinDivertCaptureHandle::open(Direction::Outbound)?);
        let inbound_capture: Arc<dyn CaptureHandle> =
            match WinDivertCaptureHandle::open(Direction::Inbound) {
                Ok(handle) => Arc::new(handle),
                Err(err) => {
                    outbound_capture.close();
                    return Err(err.into());
                }
            };

        let span = tracing::info_span!("engine", mode = ?config.mode());
        let _entered = span.enter();

        let nat = Arc::new(NatTable::new());
        let (flow_writer, flow_reader) = FlowTableWriter::new();
        let toggled = config.toggled_iter().map(Into::into).collect();
        let (policy_writer, policy_reader) = PolicyWriter::new(config.mode(), toggled);

        let routes = match (config.default_gateway(), config.default_if_index()) {
            (Some(gateway), Some(if_index)) => {
                Some(InstalledRoutes::install(Arc::new(WindowsRouteTable::new()), gateway, if_index))
            }
            _ => None,
        };

        let stop = Arc::new(AtomicBool::new(false));

        let tracker = FlowTracker::new(
            Box::new(WindowsSocketEnumerator::new()),
            flow_writer,
            Arc::clone(&nat),
            config.vpn_ip(),
            config.default_ip(),
        );
        let (tracker_handle, tracker_stop) = tracker.spawn();

        let outbound_config = outbound::OutboundConfig {
            vpn_ip: config.vpn_ip(),
            default_ip: config.default_ip(),
            vpn_if_index: config.vpn_if_index(),
            default_if_index: config.default_if_index(),
        };
        let resolver: Arc<dyn portresolve::PortResolver> = Arc::new(WindowsPortResolver::new());
        let outbound_handle = {
            let capture = Arc::clone(&outbound_capture);
            let nat = Arc::clone(&nat);
            let stop = Arc::clone(&stop);
            let flow_reader = flow_reader.clone();
            let policy_reader = policy_reader.clone();
            let span = span.clone();
            std::thread::Builder::new()
                .name("divert-outbound".to_string())
                .spawn(move || {
                    let _entered = span.enter();
                    outbound::run(capture, outbound_config, flow_reader, resolver, nat, policy_reader, stop)
                })
                .expect("failed to spawn outbound diverter thread")
        };

        let inbound_handle = {
            let capture = Arc::clone(&inbound_capture);
            let nat = Arc::clone(&nat);
            let stop = Arc::clone(&stop);
            let span = span.clone();
            std::thread::Builder::new()
                .name("divert-inbound".to_string())
                .spawn(move || {
                    let _entered = span.enter();
                    inbound::run(capture, nat, stop)
                })
                .expect("failed to spawn inbound diverter thread")
        };

        drop(_entered);
        *guard = Some(RunningState {
            stop,
            tracker_stop,
            tracker_handle,
            outbound_handle,
            outbound_capture,
            inbound_handle,
            inbound_capture,
            routes,
            policy_writer,
            span,
        });

        let _ = policy_reader;
        Ok(())
    }

    /// Stop the engine. Idempotent: calling this when not running is a no-op.
    pub fn stop(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Self::stop_locked(&mut guard);
    }

    /// Atomically replace the toggled-application set.
    pub fn update_policy(&self, toggled: impl IntoIterator<Item = std::sync::Arc<str>>) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = guard.as_mut() {
            let _entered = state.span.enter();
            state.policy_writer.set_toggled(toggled.into_iter().collect());
        }
    }

    /// Atomically replace the mode.
    pub fn update_mode(&self, mode: Mode) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = guard.as_mut() {
            let _entered = state.span.enter();
            state.policy_writer.set_mode(mode);
        }
    }

    /// `true` if `start` has completed successfully with no matching `stop` since.
    #[must_use]
    pub fn running(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    fn stop_locked(guard: &mut Option<RunningState>) {
        let Some(state) = guard.take() else { return };
        let _entered = state.span.enter();

        state.stop.store(true, Ordering::Release);
        let _ = state.tracker_stop.send(());

        // Routes are removed before the workers are joined (I5): route lifetime is owned by
        // the supervisor, not the workers, so this must happen even if a worker is hung.
        drop(state.routes);

        state.outbound_capture.close();
        state.inbound_capture.close();

        join_bounded(state.tracker_handle, "divert-flowtrack");
        join_bounded(state.outbound_handle, "divert-outbound");
        join_bounded(state.inbound_handle, "divert-inbound");
    }
}

/// Join `handle`, polling rather than blocking indefinitely, so a worker stuck in an
/// uninterruptible OS call cannot hang `stop()` forever. A survivor is abandoned: its
/// `JoinHandle` is dropped, which does not block and does not prevent process exit.
fn join_bounded(handle: std::thread::JoinHandle<()>, name: &str) {
    let deadline = Instant::now() + WORKER_JOIN_TIMEOUT;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(worker = name, "worker did not stop within timeout, abandoning");
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    if let Err(err) = handle.join() {
        tracing::warn!(worker = name, ?err, "worker thread panicked");
    }
}

//! Heartbeat engine.
//!
//! One [`Heart`] runs per client. While a connection is up, [`Heart::run`]
//! is polled alongside the receive loop and enqueues `{op:1}` payloads on
//! the connection's command channel; the receive side reports interval
//! changes and acknowledgements back through the shared state here. The
//! heart never touches the socket and holds no reference to the client.

use crate::client::Command;
use crate::error::GatewayError;
use crate::payload::heartbeat_payload;
use crate::HELLO_TIMEOUT;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

/// What ended one heartbeat sleep.
enum Wake {
    /// The interval elapsed.
    Timer,
    /// [`Heart::beat_soon`] fired.
    EarlyBeat,
    /// The interval was changed; recompute before beating.
    IntervalChanged,
}

/// Drives the periodic heartbeat for a client's connections.
pub(crate) struct Heart {
    /// Heartbeat interval in milliseconds; 0 until Hello arrives.
    interval_ms: AtomicU64,

    /// Whether the last heartbeat was acknowledged. Set false on every
    /// send; a second send while still false is a protocol violation and
    /// tears the connection down instead.
    acknowledged: AtomicBool,

    /// Last sequence number, shared with the receive side. 0 means no
    /// Dispatch has been seen yet. The heart only ever reads this.
    sequence: Arc<AtomicU64>,

    /// Wakes the heart when the interval is set, changed, or cleared.
    interval_changed: Notify,

    /// Skips the current sleep to beat immediately (server op 1).
    beat_now: Notify,

    /// When the last heartbeat was sent.
    last_beat: RwLock<Option<Instant>>,

    /// Last measured send-to-ack round trip in milliseconds;
    /// `u64::MAX` until the first acknowledgement.
    latency_ms: AtomicU64,

    /// Uniform [0, 1) second jitter added to each sleep.
    jitter: AtomicBool,
}

impl Heart {
    pub fn new(sequence: Arc<AtomicU64>) -> Self {
        Self {
            interval_ms: AtomicU64::new(0),
            acknowledged: AtomicBool::new(true),
            sequence,
            interval_changed: Notify::new(),
            beat_now: Notify::new(),
            last_beat: RwLock::new(None),
            latency_ms: AtomicU64::new(u64::MAX),
            jitter: AtomicBool::new(true),
        }
    }

    /// The heartbeat interval, if Hello has provided one.
    pub fn interval(&self) -> Option<Duration> {
        match self.interval_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Set or clear the heartbeat interval, waking a sleeping heart.
    pub fn set_interval(&self, interval: Option<Duration>) {
        let ms = interval.map_or(0, |i| i.as_millis() as u64);
        self.interval_ms.store(ms, Ordering::Release);
        self.interval_changed.notify_one();
    }

    /// Skip the current sleep so the next heartbeat goes out immediately.
    pub fn beat_soon(&self) {
        self.beat_now.notify_one();
    }

    /// Record a heartbeat acknowledgement (op 11).
    pub fn mark_acked(&self) {
        self.acknowledged.store(true, Ordering::SeqCst);
        if let Some(sent) = *self.last_beat.read() {
            let rtt = sent.elapsed();
            self.latency_ms
                .store(rtt.as_millis() as u64, Ordering::Release);
            trace!(rtt_ms = rtt.as_millis() as u64, "heartbeat acknowledged");
        }
    }

    /// Prepare for a fresh connection: no beat outstanding, no interval.
    pub fn reset(&self) {
        self.acknowledged.store(true, Ordering::SeqCst);
        self.interval_ms.store(0, Ordering::Release);
        *self.last_beat.write() = None;
        // The sequence is deliberately left alone; it must survive into
        // the next Resume payload.
    }

    /// Last measured heartbeat round trip.
    pub fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::Acquire) {
            u64::MAX => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// Run the heartbeat loop until the connection ends.
    ///
    /// # Errors
    /// - [`GatewayError::HelloTimeout`] if no interval is set in time.
    /// - [`GatewayError::HeartbeatLost`] if a beat comes due while the
    ///   previous one is unacknowledged; the connection loop closes the
    ///   socket with 1002 in response.
    pub async fn run(&self, commands: &flume::Sender<Command>) -> Result<(), GatewayError> {
        loop {
            let interval = self.wait_for_interval().await?;

            match self.sleep_one_interval(interval).await {
                Wake::IntervalChanged => continue,
                Wake::Timer | Wake::EarlyBeat => {}
            }

            // Cleared while we slept; park until the next Hello.
            if self.interval().is_none() {
                continue;
            }

            if !self.acknowledged.load(Ordering::SeqCst) {
                debug!("heartbeat not acknowledged, closing connection");
                return Err(GatewayError::HeartbeatLost);
            }

            let seq = self.sequence();
            debug!(seq = ?seq, "sending heartbeat");
            commands
                .send(Command::Send(heartbeat_payload(seq)))
                .map_err(|_| GatewayError::CommandChannelClosed)?;
            self.mark_sent();
        }
    }

    fn mark_sent(&self) {
        self.acknowledged.store(false, Ordering::SeqCst);
        *self.last_beat.write() = Some(Instant::now());
    }

    /// Wait until the interval is set. The server must send Hello
    /// promptly; waiting longer than [`HELLO_TIMEOUT`] is a protocol
    /// error.
    async fn wait_for_interval(&self) -> Result<Duration, GatewayError> {
        timeout(HELLO_TIMEOUT, async {
            loop {
                if let Some(interval) = self.interval() {
                    return interval;
                }
                self.interval_changed.notified().await;
            }
        })
        .await
        .map_err(|_| GatewayError::HelloTimeout)
    }

    /// Sleep for one jittered interval, or less if woken.
    async fn sleep_one_interval(&self, interval: Duration) -> Wake {
        let jitter = if self.jitter.load(Ordering::Relaxed) {
            Duration::from_secs_f64(rand::random::<f64>())
        } else {
            Duration::ZERO
        };

        trace!(timeout_ms = (interval + jitter).as_millis() as u64, "waiting for next heartbeat");
        tokio::select! {
            _ = sleep(interval + jitter) => Wake::Timer,
            _ = self.beat_now.notified() => Wake::EarlyBeat,
            _ = self.interval_changed.notified() => Wake::IntervalChanged,
        }
    }
}

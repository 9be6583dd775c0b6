//! Frame loop.
//!
//! One iteration per display refresh:
//!
//! 1. Advance `frame.index` and persist the clock reading under
//!    `frame.timestamp` (also while paused).
//! 2. If paused, stop here.
//! 3. Build the [`Frame`], with a delta against the previous timestamp.
//! 4. Run every `before` callback and wait for all of them, then `during`,
//!    then `after`. A failing phase aborts the rest of the frame.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use engine_state::channels;
use engine_state::messages::Diagnostic;
use engine_state::{ObservableValue, StateContext, StateError, Subscription};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::error::FrameError;

/// Configuration for the frame loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target frames per second.
    pub refresh_rate: f64,
    /// Maximum number of iterations to run (0 = unlimited).
    pub max_frames: u64,
}

/// Shortest frame period the loop will schedule.
pub const MIN_FRAME_PERIOD: Duration = Duration::from_micros(1);

/// Longest frame period the loop will schedule.
pub const MAX_FRAME_PERIOD: Duration = Duration::from_secs(60);

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 60.0,
            max_frames: 0,
        }
    }
}

impl TickConfig {
    /// Time budget of one frame, clamped to
    /// [`MIN_FRAME_PERIOD`]..=[`MAX_FRAME_PERIOD`]. A non-positive or
    /// non-finite rate falls back to 60 Hz.
    #[must_use]
    pub fn frame_period(&self) -> Duration {
        if !(self.refresh_rate.is_finite() && self.refresh_rate > 0.0) {
            warn!(refresh_rate = self.refresh_rate, "invalid refresh rate, using 60 Hz");
            return Self::default().frame_period();
        }
        // Tiny rates overflow `Duration`; those land on the upper bound.
        let period =
            Duration::try_from_secs_f64(self.refresh_rate.recip()).unwrap_or(MAX_FRAME_PERIOD);
        let clamped = period.clamp(MIN_FRAME_PERIOD, MAX_FRAME_PERIOD);
        if clamped != period {
            warn!(
                refresh_rate = self.refresh_rate,
                period_us = clamped.as_micros() as u64,
                "refresh rate out of range, period clamped"
            );
        }
        clamped
    }
}

/// One unpaused iteration of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame counter, starting at 1.
    pub index: u64,
    /// Clock reading in microseconds.
    pub timestamp: u64,
    /// Time since the previous iteration; `None` on the very first one.
    pub delta: Option<Duration>,
}

impl Frame {
    /// The delta in seconds, if any.
    #[must_use]
    pub fn delta_seconds(&self) -> Option<f64> {
        self.delta.map(|delta| delta.as_secs_f64())
    }
}

/// The three ordered stages of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Input and simulation.
    Before,
    /// Systems.
    During,
    /// Presentation.
    After,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::Before, Phase::During, Phase::After];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::During => "during",
            Phase::After => "after",
        }
    }

    fn slot(self) -> usize {
        match self {
            Phase::Before => 0,
            Phase::During => 1,
            Phase::After => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-frame callback.
pub type FrameCallback = Arc<dyn Fn(Frame) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

type PhaseSet = RwLock<IndexMap<u64, FrameCallback>>;

struct Inner {
    config: TickConfig,
    clock: Arc<dyn Clock>,
    state: StateContext,
    index: ObservableValue<u64>,
    timestamp: ObservableValue<Option<u64>>,
    paused: ObservableValue<bool>,
    phases: [PhaseSet; 3],
    next_callback: AtomicU64,
    stopped: AtomicBool,
}

/// Drives time for everything registered on it.
///
/// Cloning is cheap; clones drive the same loop.
#[derive(Clone)]
pub struct FrameLoop {
    inner: Arc<Inner>,
}

impl FrameLoop {
    /// A loop over `state` reading the system monotonic clock.
    #[must_use]
    pub fn new(state: &StateContext, config: TickConfig) -> Self {
        Self::with_clock(state, config, Arc::new(MonotonicClock::new()))
    }

    /// A loop reading `clock`.
    #[must_use]
    pub fn with_clock(state: &StateContext, config: TickConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                state: state.clone(),
                index: state.observable(channels::FRAME_INDEX, 0),
                timestamp: state.observable(channels::FRAME_TIMESTAMP, None),
                paused: state.observable(channels::FRAME_PAUSED, false),
                phases: Default::default(),
                next_callback: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// The loop configuration.
    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.inner.config
    }

    /// Index of the most recent iteration; 0 before the first one.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.inner.index.get()
    }

    /// Clock reading of the most recent iteration.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        self.inner.timestamp.get()
    }

    /// Register `callback` in the `before` phase.
    pub fn before<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(Frame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(Phase::Before, callback)
    }

    /// Register `callback` in the `during` phase.
    pub fn during<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(Frame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(Phase::During, callback)
    }

    /// Register `callback` in the `after` phase.
    pub fn after<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(Frame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on(Phase::After, callback)
    }

    /// Register `callback` in `phase`. Unsubscribing removes exactly this
    /// callback; an iteration already running still completes it.
    pub fn on<F, Fut>(&self, phase: Phase, callback: F) -> Subscription
    where
        F: Fn(Frame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.inner.next_callback.fetch_add(1, Ordering::Relaxed);
        let callback: FrameCallback = Arc::new(move |frame: Frame| callback(frame).boxed());
        self.inner.phases[phase.slot()].write().insert(id, callback);
        debug!(%phase, id, "frame callback registered");

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.phases[phase.slot()].write().shift_remove(&id);
            }
        })
    }

    /// Number of callbacks registered in `phase`.
    #[must_use]
    pub fn callback_count(&self, phase: Phase) -> usize {
        self.inner.phases[phase.slot()].read().len()
    }

    /// Stop running phase callbacks. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the paused flag cannot be stored.
    pub fn pause(&self) -> Result<(), StateError> {
        self.inner.paused.set(true).map(drop)
    }

    /// Resume running phase callbacks. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the paused flag cannot be stored.
    pub fn resume(&self) -> Result<(), StateError> {
        self.inner.paused.set(false).map(drop)
    }

    /// Whether the loop is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    /// Call `callback` on every running → paused transition.
    pub fn on_paused<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.paused.on_changed(move |change| {
            if change.next_value && !change.previous_value.unwrap_or(false) {
                callback();
            }
        })
    }

    /// Call `callback` on every paused → running transition.
    pub fn on_resumed<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.paused.on_changed(move |change| {
            if !change.next_value && change.previous_value.unwrap_or(false) {
                callback();
            }
        })
    }

    /// Ask [`run`](Self::run) to return after the current iteration.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Run one iteration.
    ///
    /// Returns `Ok(None)` if the loop is paused, `Ok(Some(frame))` once every
    /// phase has completed.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the first failing phase. The counter and
    /// timestamp have been advanced regardless.
    pub async fn tick(&self) -> Result<Option<Frame>, FrameError> {
        let inner = &self.inner;
        let index = inner.index.get() + 1;
        let previous = inner.timestamp.get();
        let timestamp = inner.clock.now_micros();

        inner.index.set(index)?;
        inner.timestamp.set(Some(timestamp))?;

        if self.is_paused() {
            trace!(index, "paused, skipping phases");
            return Ok(None);
        }

        let delta = previous.map(|previous| Duration::from_micros(timestamp.saturating_sub(previous)));
        let frame = Frame {
            index,
            timestamp,
            delta,
        };
        trace!(index, ?delta, "frame start");

        for phase in Phase::ALL {
            self.run_phase(phase, frame).await?;
        }
        Ok(Some(frame))
    }

    async fn run_phase(&self, phase: Phase, frame: Frame) -> Result<(), FrameError> {
        let callbacks: Vec<FrameCallback> =
            self.inner.phases[phase.slot()].read().values().cloned().collect();
        if callbacks.is_empty() {
            return Ok(());
        }

        let results = join_all(callbacks.iter().map(|callback| callback(frame))).await;
        let mut failures = results.into_iter().filter_map(Result::err);
        let Some(first) = failures.next() else {
            return Ok(());
        };
        for other in failures {
            let message = format!("{other:#}");
            warn!(frame = frame.index, %phase, error = %message, "additional phase failure");
        }
        Err(FrameError::Phase {
            frame: frame.index,
            phase,
            cause: first,
        })
    }

    /// Drive [`tick`](Self::tick) at the configured refresh rate until
    /// stopped or `max_frames` iterations have run. Returns the number of
    /// iterations.
    ///
    /// A failed iteration is reported on the diagnostic channel and the loop
    /// carries on.
    pub async fn run(&self) -> u64 {
        let period = self.inner.config.frame_period();
        let max_frames = self.inner.config.max_frames;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            refresh_rate = self.inner.config.refresh_rate,
            max_frames, "starting frame loop"
        );

        let mut count = 0u64;
        while !self.is_stopped() {
            interval.tick().await;
            let start = Instant::now();

            if let Err(err) = self.tick().await {
                self.report(&err);
            }

            count += 1;
            if max_frames > 0 && count >= max_frames {
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > period {
                warn!(
                    frame = self.index(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = period.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }

        info!(frames = count, "frame loop complete");
        count
    }

    fn report(&self, err: &FrameError) {
        let message = format!("{err:#}");
        let (frame, phase) = match err {
            FrameError::Phase { frame, phase, .. } => (*frame, Some(phase.to_string())),
            FrameError::State(_) => (self.index(), None),
        };
        error!(frame, phase = phase.as_deref(), error = %message, "frame step failed");

        let diagnostic = Diagnostic {
            frame,
            phase,
            message,
        };
        if let Err(publish) = self
            .inner
            .state
            .bus()
            .publish_event(channels::DIAGNOSTIC, &diagnostic)
        {
            warn!(%publish, "could not publish diagnostic");
        }
    }
}

impl fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLoop")
            .field("config", &self.inner.config)
            .field("index", &self.index())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::clock::ManualClock;

    use super::*;

    fn manual_loop(state: &StateContext) -> (FrameLoop, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let frames = FrameLoop::with_clock(state, TickConfig::default(), clock.clone());
        (frames, clock)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inc = Arc::clone(&count);
        (count, move || {
            inc.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_tick_advances_counter() {
        let state = StateContext::new();
        let (frames, _clock) = manual_loop(&state);
        assert_eq!(frames.index(), 0);

        let first = frames.tick().await.unwrap().unwrap();
        assert_eq!(first.index, 1);
        frames.tick().await.unwrap();
        assert_eq!(frames.index(), 2);
        assert_eq!(state.store().get(channels::FRAME_INDEX), Some(2.into()));
    }

    #[tokio::test]
    async fn test_first_delta_none_then_measured() {
        let state = StateContext::new();
        let (frames, clock) = manual_loop(&state);

        let first = frames.tick().await.unwrap().unwrap();
        assert_eq!(first.delta, None);
        assert_eq!(first.delta_seconds(), None);

        clock.advance(Duration::from_millis(16));
        let second = frames.tick().await.unwrap().unwrap();
        assert_eq!(second.delta, Some(Duration::from_millis(16)));

        let third = frames.tick().await.unwrap().unwrap();
        assert_eq!(third.delta, Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let state = StateContext::new();
        let (frames, _clock) = manual_loop(&state);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut subs = Vec::new();
        for phase in [Phase::After, Phase::During, Phase::Before] {
            let order = Arc::clone(&order);
            subs.push(frames.on(phase, move |frame| {
                let order = Arc::clone(&order);
                async move {
                    tokio::task::yield_now().await;
                    order.lock().unwrap().push((frame.index, phase));
                    Ok(())
                }
            }));
        }

        frames.tick().await.unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec![(1, Phase::Before), (1, Phase::During), (1, Phase::After)]
        );
    }

    #[tokio::test]
    async fn test_pause_twice_fires_once() {
        let state = StateContext::new();
        let (frames, _clock) = manual_loop(&state);
        let (paused, on_paused) = counter();
        let (resumed, on_resumed) = counter();
        let _p = frames.on_paused(on_paused);
        let _r = frames.on_resumed(on_resumed);

        frames.resume().unwrap();
        assert_eq!(resumed.load(Ordering::SeqCst), 0);

        frames.pause().unwrap();
        frames.pause().unwrap();
        assert_eq!(paused.load(Ordering::SeqCst), 1);
        assert!(frames.is_paused());

        frames.resume().unwrap();
        frames.resume().unwrap();
        assert_eq!(resumed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_paused_skips_phases_but_advances_counter() {
        let state = StateContext::new();
        let (frames, clock) = manual_loop(&state);
        let (calls, on_call) = counter();
        let _sub = frames.during(move |_| {
            on_call();
            async { Ok(()) }
        });

        frames.tick().await.unwrap();
        frames.pause().unwrap();
        clock.advance(Duration::from_millis(10));
        assert_eq!(frames.tick().await.unwrap(), None);
        assert_eq!(frames.tick().await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(frames.index(), 3);

        frames.resume().unwrap();
        clock.advance(Duration::from_millis(5));
        let frame = frames.tick().await.unwrap().unwrap();
        assert_eq!(frame.index, 4);
        assert_eq!(frame.delta, Some(Duration::from_millis(5)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_aborts_later_phases() {
        let state = StateContext::new();
        let (frames, _clock) = manual_loop(&state);
        let (before_calls, on_before) = counter();
        let (after_calls, on_after) = counter();

        let _a = frames.before(move |_| {
            on_before();
            async { Ok(()) }
        });
        let _b = frames.during(|_| async { anyhow::bail!("backend missing") });
        let _c = frames.after(move |_| {
            on_after();
            async { Ok(()) }
        });

        let err = frames.tick().await.unwrap_err();
        match err {
            FrameError::Phase { frame, phase, .. } => {
                assert_eq!(frame, 1);
                assert_eq!(phase, Phase::During);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(before_calls.load(Ordering::SeqCst), 1);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);

        // The next frame still runs.
        assert!(frames.tick().await.is_err());
        assert_eq!(frames.index(), 2);
        assert_eq!(before_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_phase_waits_for_siblings() {
        let state = StateContext::new();
        let (frames, _clock) = manual_loop(&state);
        let done = Arc::new(AtomicUsize::new(0));
        let finished = Arc::clone(&done);

        let _slow = frames.before(move |_| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let _fail = frames.before(|_| async { anyhow::bail!("early failure") });

        assert!(frames.tick().await.is_err());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_callback() {
        let state = StateContext::new();
        let (frames, _clock) = manual_loop(&state);
        let (calls, on_call) = counter();
        let mut sub = frames.after(move |_| {
            on_call();
            async { Ok(()) }
        });
        assert_eq!(frames.callback_count(Phase::After), 1);

        frames.tick().await.unwrap();
        sub.unsubscribe();
        sub.unsubscribe();
        frames.tick().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(frames.callback_count(Phase::After), 0);
    }

    #[tokio::test]
    async fn test_run_limited_frames_reports_failures() {
        let state = StateContext::new();
        let config = TickConfig {
            refresh_rate: 1000.0,
            max_frames: 5,
        };
        let frames = FrameLoop::new(&state, config);
        let diagnostics = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&diagnostics);
        let _diag = state
            .bus()
            .subscribe_event::<Diagnostic, _>(channels::DIAGNOSTIC, move |d| {
                sink.lock().unwrap().push(d);
            });
        let _fail = frames.after(|frame| async move {
            if frame.index == 2 {
                anyhow::bail!("lost the renderer");
            }
            Ok(())
        });

        assert_eq!(frames.run().await, 5);
        assert_eq!(frames.index(), 5);

        let diagnostics = diagnostics.lock().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].frame, 2);
        assert_eq!(diagnostics[0].phase.as_deref(), Some("after"));
        assert!(diagnostics[0].message.contains("lost the renderer"));
    }

    #[test]
    fn test_frame_period_clamps_extreme_rates() {
        let period = |refresh_rate| {
            TickConfig {
                refresh_rate,
                max_frames: 0,
            }
            .frame_period()
        };
        assert_eq!(period(1e-30), MAX_FRAME_PERIOD);
        assert_eq!(period(1e-3), MAX_FRAME_PERIOD);
        assert_eq!(period(1e12), MIN_FRAME_PERIOD);
        assert_eq!(period(f64::INFINITY), period(60.0));
        assert_eq!(period(-5.0), period(60.0));
        assert_eq!(period(4.0), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_run_with_huge_refresh_rate() {
        let state = StateContext::new();
        let config = TickConfig {
            refresh_rate: 1e12,
            max_frames: 1,
        };
        let frames = FrameLoop::new(&state, config);
        assert_eq!(frames.run().await, 1);
        assert_eq!(frames.index(), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_run() {
        let state = StateContext::new();
        let config = TickConfig {
            refresh_rate: 1000.0,
            max_frames: 0,
        };
        let frames = FrameLoop::new(&state, config);
        let stopper = frames.clone();
        let _sub = frames.after(move |frame| {
            if frame.index == 3 {
                stopper.stop();
            }
            async { Ok(()) }
        });

        assert_eq!(frames.run().await, 3);
        assert!(frames.is_stopped());
    }
}

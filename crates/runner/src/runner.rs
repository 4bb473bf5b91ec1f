//! Background playback of a clip at a fixed frame rate.
//!
//! A [`Runner`] owns at most one playback thread. Each frame the thread
//! re-reads the current clip, computes the show time from a monotonic clock
//! plus the smoothed nudge offset, renders, applies the output transform and
//! hands the result to the output sink. Control methods (`pause`, `stop`,
//! `swap`, `nudge`) may be called from any thread.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cuelist_common::clock::{FramePacer, PlaybackClock};
use cuelist_common::config::RunnerConfig;
use cuelist_common::error::{CuelistError, CuelistResult};
use cuelist_core::{Clip, Frame, Render, SharedClip};

use crate::signal::Signal;

/// Converts a composed frame into the sink's output type.
pub type ApplyFn<K, D, O> = Arc<dyn Fn(Frame<K, D>) -> O + Send + Sync>;

/// Receives every output the runner produces.
pub type OutputFn<O> = Arc<dyn Fn(&O) + Send + Sync>;

/// Observable playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Default, Clone, Copy)]
struct Timing {
    elapsed: f64,
    time_offset: f64,
    target_time_offset: f64,
}

/// State shared between the control API and the playback thread.
struct Playback<C, K, D> {
    clip: RwLock<Option<SharedClip<C, K, D>>>,
    timing: Mutex<Timing>,
    paused: AtomicBool,
    /// Stop token of the most recently started loop. Each loop keeps its own.
    stop: Mutex<Arc<Signal>>,
    done: Signal,
}

impl<C, K, D> Playback<C, K, D> {
    fn timing(&self) -> MutexGuard<'_, Timing> {
        self.timing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_clip(&self) -> Option<SharedClip<C, K, D>> {
        self.clip
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_clip(&self, clip: SharedClip<C, K, D>) {
        *self.clip.write().unwrap_or_else(PoisonError::into_inner) = Some(clip);
    }

    fn stop_token(&self) -> Arc<Signal> {
        self.stop.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Install a fresh stop token for a new loop. Older loops keep theirs.
    fn next_stop_token(&self) -> Arc<Signal> {
        let token = Arc::new(Signal::new(false));
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    /// Signal the current loop to exit.
    fn halt(&self) {
        self.stop_token().set();
    }

    fn is_current(&self, token: &Arc<Signal>) -> bool {
        Arc::ptr_eq(&self.stop_token(), token)
    }
}

/// Fixed-rate playback driver.
///
/// `O` is the output type produced by the apply function; use
/// [`Runner::passthrough`] when the sink consumes frames directly.
pub struct Runner<C, K, D, O> {
    ctx: Arc<C>,
    apply_fn: ApplyFn<K, D, O>,
    output_fn: Option<OutputFn<O>>,
    config: RunnerConfig,
    playback: Arc<Playback<C, K, D>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<C, K, D> Runner<C, K, D, Frame<K, D>>
where
    K: 'static,
    D: 'static,
{
    /// Runner whose output is the composed frame itself.
    pub fn passthrough(ctx: C) -> Self {
        Self::new(ctx, Arc::new(|frame: Frame<K, D>| frame))
    }
}

impl<C, K, D, O> Runner<C, K, D, O> {
    pub fn new(ctx: C, apply_fn: ApplyFn<K, D, O>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            apply_fn,
            output_fn: None,
            config: RunnerConfig::default(),
            playback: Arc::new(Playback {
                clip: RwLock::new(None),
                timing: Mutex::new(Timing::default()),
                paused: AtomicBool::new(false),
                stop: Mutex::new(Arc::new(Signal::new(false))),
                done: Signal::new(true),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Send every produced output to `output_fn`.
    pub fn with_output(mut self, output_fn: OutputFn<O>) -> Self {
        self.output_fn = Some(output_fn);
        self
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.config.fps = fps;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    pub fn state(&self) -> RunnerState {
        if self.is_paused() {
            return RunnerState::Paused;
        }
        let running = self
            .thread_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if running {
            RunnerState::Playing
        } else {
            RunnerState::Stopped
        }
    }

    pub fn is_paused(&self) -> bool {
        self.playback.paused.load(Ordering::SeqCst)
    }

    /// Show time of the most recent frame, in seconds.
    pub fn elapsed(&self) -> f64 {
        self.playback.timing().elapsed
    }

    /// Overwrite the playback position. Takes effect on the next `resume`.
    pub fn set_elapsed(&self, t: f64) {
        self.playback.timing().elapsed = t;
    }

    /// The currently loaded clip, if any.
    pub fn clip(&self) -> Option<SharedClip<C, K, D>> {
        self.playback.current_clip()
    }

    /// Offset currently applied to show time.
    pub fn time_offset(&self) -> f64 {
        self.playback.timing().time_offset
    }

    /// Offset the applied offset is converging towards.
    pub fn target_time_offset(&self) -> f64 {
        self.playback.timing().target_time_offset
    }

    /// Shift playback by `delta` seconds, eased in over the next frames.
    /// Successive nudges accumulate.
    pub fn nudge(&self, delta: f64) {
        let mut timing = self.playback.timing();
        timing.target_time_offset += delta;
        tracing::debug!(
            delta,
            target = timing.target_time_offset,
            "Nudged playback offset"
        );
    }

    /// Replace the clip the running loop renders, from the next frame on.
    pub fn swap(&self, clip: SharedClip<C, K, D>) {
        self.playback.set_clip(clip);
        tracing::debug!("Swapped playback clip");
    }

    /// Freeze playback at the current position. No-op unless playing.
    pub fn pause(&self) {
        if self.is_paused() {
            return;
        }
        let Some(handle) = self.thread_slot().take() else {
            return;
        };
        if handle.is_finished() {
            join_loop(handle);
            return;
        }

        // Mark paused before stopping so the loop does not raise `done`.
        self.playback.paused.store(true, Ordering::SeqCst);
        self.playback.halt();
        join_loop(handle);

        // The loop may have reached the end before it saw the stop.
        if self.playback.done.is_set() {
            self.playback.paused.store(false, Ordering::SeqCst);
            tracing::debug!("Playback finished before pausing");
            return;
        }
        tracing::info!(elapsed = self.elapsed(), "Playback paused");
    }

    /// Halt playback and raise `done`. Safe to call when already stopped.
    pub fn stop(&self) {
        self.playback.halt();
        if self.playback.paused.swap(false, Ordering::SeqCst) {
            self.playback.done.set();
        }
        let handle = self.thread_slot().take();
        if let Some(handle) = handle {
            join_loop(handle);
            tracing::info!(elapsed = self.elapsed(), "Playback stopped");
        }
    }

    /// Block until the current playback finishes or is stopped.
    pub fn wait(&self) {
        self.playback.done.wait();
    }

    /// Like [`Runner::wait`] with an upper bound. Returns whether playback is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.playback.done.wait_timeout(timeout)
    }

    fn thread_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, frame: Frame<K, D>) -> O {
        (self.apply_fn)(frame)
    }

    fn emit(&self, output: &O) {
        if let Some(output_fn) = &self.output_fn {
            output_fn(output);
        }
    }
}

impl<C, K, D, O> Runner<C, K, D, O>
where
    C: Send + Sync + 'static,
    K: Eq + Hash + Send + 'static,
    D: Send + 'static,
    O: 'static,
{
    /// Start playing `clip` from `start_at` seconds, replacing any current playback.
    ///
    /// A negative `start_at` plays a pre-roll: show time counts up from below
    /// zero and clips activate once it reaches their positions.
    pub fn play(&self, clip: SharedClip<C, K, D>, start_at: f64) -> CuelistResult<()> {
        self.config.validate()?;
        self.stop();

        self.playback.set_clip(clip);
        self.playback.paused.store(false, Ordering::SeqCst);
        *self.playback.timing() = Timing {
            elapsed: start_at,
            ..Timing::default()
        };
        self.playback.done.clear();
        self.start_loop(start_at)
    }

    /// Play and block until playback completes.
    pub fn play_sync(&self, clip: SharedClip<C, K, D>, start_at: f64) -> CuelistResult<()> {
        self.play(clip, start_at)?;
        self.wait();
        Ok(())
    }

    /// Continue a paused playback from where it froze. No-op unless paused.
    pub fn resume(&self) -> CuelistResult<()> {
        if !self.is_paused() || self.clip().is_none() {
            return Ok(());
        }
        self.playback.paused.store(false, Ordering::SeqCst);

        // The clock restarts without the applied offset; the loop re-adds it.
        let timing = *self.playback.timing();
        tracing::info!(elapsed = timing.elapsed, "Playback resumed");
        self.start_loop(timing.elapsed - timing.time_offset)
    }

    fn start_loop(&self, start_at: f64) -> CuelistResult<()> {
        let worker = PlaybackLoop {
            ctx: self.ctx.clone(),
            apply_fn: self.apply_fn.clone(),
            output_fn: self.output_fn.clone(),
            config: self.config,
            playback: self.playback.clone(),
            stop: self.playback.next_stop_token(),
        };

        // Held across the spawn so a control call from the new loop sees its handle.
        let mut slot = self.thread_slot();
        let spawned = thread::Builder::new()
            .name("cuelist-runner".to_string())
            .spawn(move || worker.run(start_at));

        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                tracing::info!(start_at, fps = self.config.fps, "Playback started");
                Ok(())
            }
            Err(e) => {
                self.playback.done.set();
                Err(e.into())
            }
        }
    }

    /// Render `clip` at `t` and apply the output transform, without emitting.
    ///
    /// Pending renders are driven on a temporary runtime, so this must not be
    /// called from inside an async context; use [`Runner::async_tick`] there.
    pub fn render_frame(&self, clip: &dyn Clip<C, K, D>, t: f64) -> CuelistResult<O> {
        let frame = resolve_blocking(clip.render(t, &self.ctx))?;
        Ok(self.apply(frame))
    }

    /// Render, apply and emit a single frame outside the playback loop.
    pub fn tick(&self, clip: &dyn Clip<C, K, D>, t: f64) -> CuelistResult<O> {
        let output = self.render_frame(clip, t)?;
        self.emit(&output);
        Ok(output)
    }

    /// [`Runner::tick`] for callers already running inside an async runtime.
    pub async fn async_tick(&self, clip: &dyn Clip<C, K, D>, t: f64) -> CuelistResult<O> {
        let frame = clip.render(t, &self.ctx).resolve().await?;
        let output = self.apply(frame);
        self.emit(&output);
        Ok(output)
    }
}

impl<C, K, D, O> Drop for Runner<C, K, D, O> {
    fn drop(&mut self) {
        self.playback.halt();
        let handle = self.thread_slot().take();
        if let Some(handle) = handle {
            join_loop(handle);
        }
    }
}

/// Join the playback thread unless called from it.
fn join_loop(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!("Playback thread panicked");
    }
}

fn resolve_blocking<K, D>(render: Render<'_, K, D>) -> CuelistResult<Frame<K, D>> {
    match render {
        Render::Ready(result) => result,
        Render::Pending(future) => {
            if tokio::runtime::Handle::try_current().is_ok() {
                return Err(CuelistError::render(
                    "cannot block on a pending render inside an async runtime; use async_tick",
                ));
            }
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(future)
        }
    }
}

/// Everything the playback thread needs, detached from the `Runner`.
struct PlaybackLoop<C, K, D, O> {
    ctx: Arc<C>,
    apply_fn: ApplyFn<K, D, O>,
    output_fn: Option<OutputFn<O>>,
    config: RunnerConfig,
    playback: Arc<Playback<C, K, D>>,
    stop: Arc<Signal>,
}

impl<C, K, D, O> PlaybackLoop<C, K, D, O> {
    fn run(self, start_at: f64) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create playback runtime");
                self.finish(false);
                return;
            }
        };

        let clock = PlaybackClock::start(start_at);
        let mut pacer = FramePacer::new(clock.anchor(), self.config.fps);
        tracing::debug!(
            start_at = clock.start_at(),
            started = %clock.started_wall(),
            "Playback loop running"
        );

        let mut finished = false;
        while !self.stop.is_set() {
            let Some(clip) = self.playback.current_clip() else {
                break;
            };
            let duration = clip.duration();
            let show_time = self.show_time(clock.elapsed_secs(), duration);

            let result = match clip.render(show_time, &self.ctx) {
                Render::Ready(result) => result,
                Render::Pending(future) => runtime.block_on(future),
            };

            // A frame that resolved after stop/pause is stale.
            if self.stop.is_set() {
                break;
            }

            match result {
                Ok(frame) => {
                    let output = (self.apply_fn)(frame);
                    if let Some(output_fn) = &self.output_fn {
                        output_fn(&output);
                    }
                }
                Err(e) => {
                    tracing::error!(show_time, error = %e, "Error rendering frame");
                }
            }

            if duration.is_some_and(|d| show_time >= d) {
                finished = true;
                break;
            }

            pacer.advance();
            if self.stop.wait_timeout(pacer.delay_from(Instant::now())) {
                break;
            }
        }

        self.finish(finished);
    }

    /// Advance the nudge interpolation one frame and compute the show time.
    fn show_time(&self, clock_time: f64, duration: Option<f64>) -> f64 {
        let mut timing = self.playback.timing();
        timing.time_offset +=
            (timing.target_time_offset - timing.time_offset) * self.config.nudge_smoothing;

        // Nudging never pulls time below zero; a pre-roll still counts up from its start.
        let floor = clock_time.min(0.0);
        let mut show_time = (clock_time + timing.time_offset).max(floor);
        if let Some(d) = duration {
            show_time = show_time.min(d);
        }
        timing.elapsed = show_time;
        show_time
    }

    fn finish(&self, finished: bool) {
        // Replaced by a newer loop; the shared state belongs to it now.
        if !self.playback.is_current(&self.stop) {
            tracing::debug!(finished, "Superseded playback loop exited");
            return;
        }
        let paused = self.playback.paused.load(Ordering::SeqCst);
        if !paused || finished {
            self.playback.paused.store(false, Ordering::SeqCst);
            self.playback.done.set();
            tracing::debug!(finished, "Playback loop exited");
        }
    }
}

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use cuelist_common::config::RunnerConfig;
use cuelist_common::error::CuelistError;
use cuelist_core::{async_clip, clip, try_clip, Clip, Frame, SharedClip, Timeline};
use cuelist_runner::{Runner, RunnerState};
use futures::FutureExt;

type Out = Frame<&'static str, f64>;
type TestRunner = Runner<(), &'static str, f64, Out>;

fn ramp(duration: Option<f64>) -> SharedClip<(), &'static str, f64> {
    clip(duration, |t, _| Frame::from([("ch", t)]))
}

fn constant(value: f64) -> SharedClip<(), &'static str, f64> {
    clip(None, move |_, _| Frame::from([("ch", value)]))
}

/// A passthrough runner that records every output.
fn recording_runner(config: RunnerConfig) -> (TestRunner, Arc<Mutex<Vec<Out>>>) {
    let outputs = Arc::new(Mutex::new(Vec::new()));
    let sink = outputs.clone();
    let runner = TestRunner::passthrough(())
        .with_config(config)
        .with_output(Arc::new(move |frame: &Out| {
            sink.lock().unwrap().push(frame.clone());
        }));
    (runner, outputs)
}

fn count(outputs: &Arc<Mutex<Vec<Out>>>) -> usize {
    outputs.lock().unwrap().len()
}

fn last(outputs: &Arc<Mutex<Vec<Out>>>) -> Out {
    outputs.lock().unwrap().last().cloned().expect("at least one output")
}

#[test]
fn play_sync_ends_on_exact_duration() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(40.0));
    let clip = ramp(Some(0.05));

    runner.play_sync(clip.clone(), 0.0).unwrap();

    assert!(count(&outputs) >= 1);
    let expected = clip.render(0.05, &()).into_ready().unwrap().unwrap();
    assert_eq!(last(&outputs), expected);
    assert_eq!(runner.elapsed(), 0.05);
    assert!(runner.wait_timeout(Duration::ZERO));
}

#[test]
fn pause_twice_is_same_as_once() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    runner.play(ramp(None), 0.0).unwrap();
    thread::sleep(Duration::from_millis(50));

    runner.pause();
    let elapsed = runner.elapsed();
    let emitted = count(&outputs);
    assert_eq!(runner.state(), RunnerState::Paused);

    runner.pause();
    assert_eq!(runner.state(), RunnerState::Paused);
    assert_eq!(runner.elapsed(), elapsed);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(count(&outputs), emitted);
    assert!(!runner.wait_timeout(Duration::from_millis(10)));

    runner.stop();
}

#[test]
fn resume_continues_from_frozen_position() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    runner.play(ramp(None), 0.0).unwrap();
    thread::sleep(Duration::from_millis(80));
    runner.pause();
    let frozen = runner.elapsed();
    assert!(frozen > 0.0);

    thread::sleep(Duration::from_millis(100));
    let before_resume = count(&outputs);
    runner.resume().unwrap();
    assert_eq!(runner.state(), RunnerState::Playing);
    thread::sleep(Duration::from_millis(80));
    runner.pause();

    let resumed = outputs.lock().unwrap()[before_resume]["ch"];
    assert!(resumed >= frozen);
    assert!(resumed < frozen + 0.05, "resumed at {resumed}, paused at {frozen}");
    assert!(runner.elapsed() > frozen);

    runner.stop();
}

#[test]
fn stop_halts_output_and_signals_done() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    runner.play(ramp(None), 0.0).unwrap();
    thread::sleep(Duration::from_millis(30));
    assert!(!runner.wait_timeout(Duration::ZERO));

    runner.stop();
    assert!(runner.wait_timeout(Duration::ZERO));
    assert_eq!(runner.state(), RunnerState::Stopped);

    let emitted = count(&outputs);
    thread::sleep(Duration::from_millis(40));
    assert_eq!(count(&outputs), emitted);

    runner.stop();
    assert_eq!(runner.state(), RunnerState::Stopped);
}

#[test]
fn stop_while_paused_signals_done() {
    let (runner, _outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    runner.play(ramp(None), 0.0).unwrap();
    thread::sleep(Duration::from_millis(20));
    runner.pause();
    assert!(!runner.wait_timeout(Duration::from_millis(10)));

    runner.stop();
    assert!(runner.wait_timeout(Duration::ZERO));
    assert!(!runner.is_paused());
}

#[test]
fn swap_takes_effect_without_stopping() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    runner.play(constant(1.0), 0.0).unwrap();
    thread::sleep(Duration::from_millis(40));

    let next = constant(2.0);
    runner.swap(next.clone());
    thread::sleep(Duration::from_millis(40));
    assert_eq!(runner.state(), RunnerState::Playing);
    runner.stop();

    let values: Vec<f64> = outputs.lock().unwrap().iter().map(|f| f["ch"]).collect();
    assert_eq!(values.first(), Some(&1.0));
    assert_eq!(values.last(), Some(&2.0));
    assert!(Arc::ptr_eq(&runner.clip().unwrap(), &next));
}

#[test]
fn failed_frames_do_not_end_playback() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    let flaky = try_clip(Some(0.1), |t, _| {
        if t < 0.03 {
            Err(CuelistError::render("warming up"))
        } else {
            Ok(Frame::from([("ch", t)]))
        }
    });

    runner.play_sync(flaky, 0.0).unwrap();

    let frames = outputs.lock().unwrap();
    assert!(frames.iter().all(|f| f["ch"] >= 0.03));
    assert_eq!(frames.last().unwrap()["ch"], 0.1);
}

#[test]
fn play_from_output_fn_replaces_the_running_loop() {
    let runner_slot: Arc<OnceLock<Weak<TestRunner>>> = Arc::new(OnceLock::new());
    let emitted = Arc::new(Mutex::new(Vec::new()));
    let replayed = Arc::new(AtomicBool::new(false));

    let slot = runner_slot.clone();
    let sink = emitted.clone();
    let flag = replayed.clone();
    let runner = Arc::new(
        TestRunner::passthrough(())
            .with_fps(100.0)
            .with_output(Arc::new(move |frame: &Out| {
                sink.lock().unwrap().push((thread::current().id(), frame["ch"]));
                if !flag.swap(true, Ordering::SeqCst) {
                    if let Some(runner) = slot.get().and_then(Weak::upgrade) {
                        runner.play(constant(2.0), 0.0).unwrap();
                    }
                }
            })),
    );
    runner_slot.set(Arc::downgrade(&runner)).unwrap();

    runner.play(constant(1.0), 0.0).unwrap();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(runner.state(), RunnerState::Playing);
    assert!(!runner.wait_timeout(Duration::ZERO));
    runner.stop();
    assert!(runner.wait_timeout(Duration::ZERO));

    let emitted = emitted.lock().unwrap();
    assert_eq!(emitted[0].1, 1.0);
    let after: Vec<_> = emitted[1..].to_vec();
    assert!(after.len() > 1);
    assert!(after.iter().all(|&(_, value)| value == 2.0));
    let threads: HashSet<_> = after.iter().map(|&(id, _)| id).collect();
    assert_eq!(threads.len(), 1);
    assert!(!threads.contains(&emitted[0].0));
}

#[test]
fn stop_discards_frame_still_rendering() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(40.0));
    let slow = async_clip(None, |t, _| {
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(Frame::from([("ch", t)]))
        }
        .boxed()
    });

    runner.play(slow, 0.0).unwrap();
    thread::sleep(Duration::from_millis(30));
    runner.stop();

    assert!(runner.wait_timeout(Duration::ZERO));
    assert_eq!(count(&outputs), 0);
    thread::sleep(Duration::from_millis(150));
    assert_eq!(count(&outputs), 0);
}

#[test]
fn pause_racing_completion_never_leaves_finished_cue_paused() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    for delay_ms in [10u64, 15, 18, 20, 22, 25, 30] {
        runner.play(ramp(Some(0.02)), 0.0).unwrap();
        thread::sleep(Duration::from_millis(delay_ms));
        runner.pause();

        if runner.wait_timeout(Duration::ZERO) {
            assert!(!runner.is_paused());
            assert_eq!(runner.state(), RunnerState::Stopped);

            let emitted = count(&outputs);
            runner.resume().unwrap();
            thread::sleep(Duration::from_millis(20));
            assert_eq!(count(&outputs), emitted);
        } else {
            assert_eq!(runner.state(), RunnerState::Paused);
        }
        runner.stop();
    }
}

#[test]
fn async_clips_resolve_on_playback_thread() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(40.0));
    let slow = async_clip(Some(0.05), |t, _| {
        async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(Frame::from([("ch", t)]))
        }
        .boxed()
    });

    runner.play_sync(slow, 0.0).unwrap();
    assert_eq!(last(&outputs)["ch"], 0.05);
}

#[test]
fn negative_start_plays_pre_roll() {
    let (runner, outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    let mut show: Timeline<(), &'static str, f64> = Timeline::new();
    show.add(0.0, ramp(Some(0.05)));

    runner.play_sync(Arc::new(show), -0.05).unwrap();

    let frames = outputs.lock().unwrap();
    assert!(frames.first().unwrap().is_empty());
    assert_eq!(frames.last().unwrap()["ch"], 0.05);
}

#[test]
fn nudge_shifts_show_time() {
    let (runner, outputs) = recording_runner(RunnerConfig {
        fps: 100.0,
        nudge_smoothing: 1.0,
    });
    runner.play(ramp(None), 0.0).unwrap();
    thread::sleep(Duration::from_millis(20));
    runner.nudge(10.0);
    thread::sleep(Duration::from_millis(40));
    runner.stop();

    assert_eq!(runner.time_offset(), 10.0);
    assert!(last(&outputs)["ch"] >= 10.0);
}

#[test]
fn play_resets_nudge_offsets() {
    let (runner, _outputs) = recording_runner(RunnerConfig::with_fps(100.0));
    runner.nudge(3.0);
    assert_eq!(runner.target_time_offset(), 3.0);

    runner.play(ramp(Some(0.02)), 0.0).unwrap();
    assert_eq!(runner.target_time_offset(), 0.0);
    runner.wait();
}

#[tokio::test]
async fn async_tick_inside_runtime() {
    let seen = Arc::new(Mutex::new(0usize));
    let counter = seen.clone();
    let runner = Runner::new((), Arc::new(|frame: Out| frame["ch"]))
        .with_output(Arc::new(move |_: &f64| *counter.lock().unwrap() += 1));

    let pending = async_clip(Some(1.0), |t, _| {
        async move { Ok(Frame::from([("ch", t)])) }.boxed()
    });

    assert_eq!(runner.async_tick(&*pending, 0.5).await.unwrap(), 0.5);
    assert_eq!(*seen.lock().unwrap(), 1);

    // blocking inside a runtime is refused rather than deadlocking
    assert!(runner.tick(&*pending, 0.5).is_err());
    assert_eq!(runner.tick(&*ramp(Some(1.0)), 0.25).unwrap(), 0.25);
}

#[test]
fn tick_resolves_pending_renders() {
    let runner = TestRunner::passthrough(());
    let pending = async_clip(Some(1.0), |t, _| {
        async move { Ok(Frame::from([("ch", t)])) }.boxed()
    });
    assert_eq!(runner.tick(&*pending, 0.75).unwrap()["ch"], 0.75);
}

//! Fade and amount scaling around an inner clip.

use std::sync::Arc;

use crate::clip::{Clip, SharedClip, TimelineRef};
use crate::render::{Frame, Render};

/// Domain-specific delta scaling: `(frame, factor) -> scaled frame`.
///
/// Deltas are opaque to the core, so fades and amounts only change values
/// when one of these is supplied.
pub type ScaleFn<K, D> = Arc<dyn Fn(Frame<K, D>, f64) -> Frame<K, D> + Send + Sync>;

/// Linear fade envelope in `[0, 1]`.
///
/// Unbounded or non-positive durations always yield `1.0`. A zero fade
/// length disables that edge. When the fade windows overlap the lower of the
/// two ramps wins.
pub fn fade_envelope(t: f64, duration: Option<f64>, fade_in: f64, fade_out: f64) -> f64 {
    let Some(duration) = duration.filter(|d| *d > 0.0) else {
        return 1.0;
    };

    let mut envelope: f64 = 1.0;
    if fade_in > 0.0 && t < fade_in {
        envelope = envelope.min(t / fade_in);
    }
    if fade_out > 0.0 && t > duration - fade_out {
        envelope = envelope.min((duration - t) / fade_out);
    }
    envelope.clamp(0.0, 1.0)
}

/// Wraps a clip with fade-in/out, an amount multiplier and an optional
/// duration clamp.
pub struct ScaledClip<C, K, D> {
    inner: SharedClip<C, K, D>,
    fade_in: f64,
    fade_out: f64,
    amount: f64,
    scale_fn: Option<ScaleFn<K, D>>,
    duration_override: Option<f64>,
}

impl<C, K, D> ScaledClip<C, K, D> {
    /// Pass-through wrapper: no fades, amount 1.
    pub fn new(inner: SharedClip<C, K, D>) -> Self {
        Self {
            inner,
            fade_in: 0.0,
            fade_out: 0.0,
            amount: 1.0,
            scale_fn: None,
            duration_override: None,
        }
    }

    pub fn with_fades(mut self, fade_in: f64, fade_out: f64) -> Self {
        self.fade_in = fade_in.max(0.0);
        self.fade_out = fade_out.max(0.0);
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_scale_fn(mut self, scale_fn: Option<ScaleFn<K, D>>) -> Self {
        self.scale_fn = scale_fn;
        self
    }

    /// Clamp the reported duration, e.g. to play only part of a nested timeline.
    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration_override = duration;
        self
    }

    pub fn inner(&self) -> &SharedClip<C, K, D> {
        &self.inner
    }

    pub fn fade_in(&self) -> f64 {
        self.fade_in
    }

    pub fn fade_out(&self) -> f64 {
        self.fade_out
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn duration_override(&self) -> Option<f64> {
        self.duration_override
    }
}

impl<C, K, D> Clip<C, K, D> for ScaledClip<C, K, D>
where
    K: Send,
    D: Send,
{
    fn duration(&self) -> Option<f64> {
        self.duration_override.or_else(|| self.inner.duration())
    }

    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        let factor =
            self.amount * fade_envelope(t, self.duration(), self.fade_in, self.fade_out);

        // The inner render always runs so stateful clips observe every frame.
        let render = self.inner.render(t, ctx);
        if factor >= 1.0 {
            return render;
        }
        if factor <= 0.0 {
            return render.map(|_| Frame::new());
        }
        match &self.scale_fn {
            Some(scale_fn) => render.map(move |frame| scale_fn(frame, factor)),
            None => render,
        }
    }

    fn as_timeline(&self) -> Option<TimelineRef<'_, C, K, D>> {
        self.inner.as_timeline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::clip;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn render(c: &ScaledClip<(), &'static str, f64>, t: f64) -> Frame<&'static str, f64> {
        c.render(t, &()).into_ready().unwrap().unwrap()
    }

    fn multiply() -> ScaleFn<&'static str, f64> {
        Arc::new(|frame: Frame<&'static str, f64>, factor: f64| {
            frame.into_iter().map(|(k, v)| (k, v * factor)).collect()
        })
    }

    #[test]
    fn test_envelope_without_fades() {
        assert_eq!(fade_envelope(0.5, Some(2.0), 0.0, 0.0), 1.0);
        assert_eq!(fade_envelope(0.5, None, 0.5, 0.5), 1.0);
        assert_eq!(fade_envelope(0.0, Some(0.0), 0.5, 0.5), 1.0);
    }

    #[test]
    fn test_envelope_fade_in() {
        assert_eq!(fade_envelope(0.0, Some(2.0), 1.0, 0.0), 0.0);
        assert_close(fade_envelope(0.5, Some(2.0), 1.0, 0.0), 0.5);
        assert_close(fade_envelope(1.0, Some(2.0), 1.0, 0.0), 1.0);
    }

    #[test]
    fn test_envelope_fade_out() {
        assert_close(fade_envelope(2.0, Some(2.0), 0.0, 1.0), 0.0);
        assert_close(fade_envelope(1.5, Some(2.0), 0.0, 1.0), 0.5);
        assert_close(fade_envelope(1.0, Some(2.0), 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_envelope_both_and_overlapping() {
        assert_close(fade_envelope(1.0, Some(4.0), 2.0, 2.0), 0.5);
        assert_close(fade_envelope(2.0, Some(4.0), 2.0, 2.0), 1.0);
        assert_close(fade_envelope(3.0, Some(4.0), 2.0, 2.0), 0.5);
        assert_close(fade_envelope(0.5, Some(1.0), 1.0, 1.0), 0.5);
        assert_close(fade_envelope(0.25, Some(1.0), 1.0, 1.0), 0.25);
    }

    #[test]
    fn test_passthrough_and_duration() {
        let sc = ScaledClip::new(clip(Some(2.0), |t, _| Frame::from([("ch", t * 10.0)])));
        assert_eq!(render(&sc, 1.0)["ch"], 10.0);
        assert_eq!(sc.duration(), Some(2.0));

        let unbounded = ScaledClip::new(clip::<(), &str, f64, _>(None, |_, _| Frame::new()));
        assert_eq!(unbounded.duration(), None);
    }

    #[test]
    fn test_duration_override_clamps() {
        let sc = ScaledClip::new(clip::<(), &str, f64, _>(Some(8.0), |_, _| Frame::new()))
            .with_duration(Some(3.0));
        assert_eq!(sc.duration(), Some(3.0));
    }

    #[test]
    fn test_zero_factor_discards_but_still_renders() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let inner = clip(Some(2.0), move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Frame::from([("ch", 99.0)])
        });

        let silent = ScaledClip::new(inner.clone()).with_amount(0.0);
        assert!(render(&silent, 1.0).is_empty());

        let faded = ScaledClip::new(inner).with_fades(1.0, 0.0);
        assert!(render(&faded, 0.0).is_empty());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_partial_factor_uses_scale_fn() {
        let sc = ScaledClip::new(clip(Some(2.0), |_, _| Frame::from([("ch", 10.0)])))
            .with_amount(0.5)
            .with_scale_fn(Some(multiply()));
        assert_close(render(&sc, 1.0)["ch"], 5.0);
    }

    #[test]
    fn test_partial_factor_without_scale_fn_is_unscaled() {
        let sc = ScaledClip::new(clip(Some(2.0), |_, _| Frame::from([("ch", 10.0)])))
            .with_amount(0.5);
        assert_eq!(render(&sc, 1.0)["ch"], 10.0);
    }

    #[test]
    fn test_amount_multiplies_envelope() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let scale: ScaleFn<&'static str, f64> =
            Arc::new(move |frame: Frame<&'static str, f64>, factor: f64| {
                record.lock().unwrap().push(factor);
                frame
            });
        let sc = ScaledClip::new(clip(Some(2.0), |_, _| Frame::from([("ch", 1.0)])))
            .with_fades(2.0, 0.0)
            .with_amount(0.5)
            .with_scale_fn(Some(scale));

        render(&sc, 1.0);
        let factors = seen.lock().unwrap();
        assert_eq!(factors.len(), 1);
        assert_close(factors[0], 0.25);
    }
}

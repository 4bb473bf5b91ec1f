//! The clip contract and leaf clip constructors.
//!
//! A clip is anything with a (possibly unbounded) duration that can render
//! per-target deltas at a local time. Timelines are clips too, which is what
//! makes arbitrary nesting work.

use std::marker::PhantomData;
use std::sync::Arc;

use cuelist_common::error::CuelistResult;
use futures::future::BoxFuture;

use crate::bpm::BpmTimeline;
use crate::compose::ComposeFn;
use crate::metadata::ClipMetadata;
use crate::render::{Frame, Render};
use crate::timeline::{Event, Timeline};

/// A renderable, time-bounded unit.
///
/// `C` is the render context, `K` the target key and `D` the delta type.
pub trait Clip<C, K, D>: Send + Sync {
    /// Length in the owner's time unit; `None` means unbounded.
    fn duration(&self) -> Option<f64>;

    /// Render the deltas at local time `t`.
    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D>;

    /// Serialization metadata attached to this clip, if any.
    fn metadata(&self) -> Option<&ClipMetadata> {
        None
    }

    /// The timeline this clip is or wraps, for tree walks.
    fn as_timeline(&self) -> Option<TimelineRef<'_, C, K, D>> {
        None
    }
}

/// A clip shared between timelines and positions.
pub type SharedClip<C, K, D> = Arc<dyn Clip<C, K, D>>;

/// Borrowed view of either timeline kind.
pub enum TimelineRef<'a, C, K, D> {
    /// Positions in seconds.
    Seconds(&'a Timeline<C, K, D>),
    /// Positions in beats.
    Beats(&'a BpmTimeline<C, K, D>),
    /// A beat timeline rendered in its parent's beat space, so its own
    /// tempo map is bypassed while nested.
    NestedBeats(&'a BpmTimeline<C, K, D>),
}

impl<C, K, D> Clone for TimelineRef<'_, C, K, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, K, D> Copy for TimelineRef<'_, C, K, D> {}

impl<'a, C, K, D> TimelineRef<'a, C, K, D> {
    /// Events in storage order.
    pub fn events(&self) -> &'a [Event<C, K, D>] {
        match self {
            Self::Seconds(timeline) => timeline.events(),
            Self::Beats(timeline) | Self::NestedBeats(timeline) => timeline.events(),
        }
    }

    pub fn compose_fn(&self) -> &'a ComposeFn<D> {
        match self {
            Self::Seconds(timeline) => timeline.compose_fn(),
            Self::Beats(timeline) | Self::NestedBeats(timeline) => timeline.compose_fn(),
        }
    }

    /// Convert a position to seconds through this timeline's own tempo map.
    pub fn to_seconds(&self, position: f64) -> f64 {
        match self {
            Self::Seconds(_) => position,
            Self::Beats(timeline) | Self::NestedBeats(timeline) => {
                timeline.tempo_map().time(position)
            }
        }
    }

    /// Whether positions are beats.
    pub fn is_beats(&self) -> bool {
        !matches!(self, Self::Seconds(_))
    }
}

type RenderFn<C, K, D> = dyn Fn(f64, &C) -> CuelistResult<Frame<K, D>> + Send + Sync;

/// Leaf clip wrapping a plain function. Created by [`clip`] and [`try_clip`].
pub struct FnClip<C, K, D> {
    duration: Option<f64>,
    render_fn: Box<RenderFn<C, K, D>>,
}

impl<C, K, D> Clip<C, K, D> for FnClip<C, K, D>
where
    K: Send,
    D: Send,
{
    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        Render::Ready((self.render_fn)(t, ctx))
    }
}

/// Create a clip from a duration and a render function.
///
/// ```
/// use cuelist_core::{clip, Clip, Frame};
///
/// let c = clip::<(), _, _, _>(Some(2.0), |t, _| Frame::from([("ch", t)]));
/// assert_eq!(c.duration(), Some(2.0));
/// ```
pub fn clip<C, K, D, F>(duration: Option<f64>, render_fn: F) -> SharedClip<C, K, D>
where
    C: 'static,
    K: Send + 'static,
    D: Send + 'static,
    F: Fn(f64, &C) -> Frame<K, D> + Send + Sync + 'static,
{
    Arc::new(FnClip {
        duration,
        render_fn: Box::new(move |t, ctx| Ok(render_fn(t, ctx))),
    })
}

/// Like [`clip`], for render functions that can fail.
pub fn try_clip<C, K, D, F>(duration: Option<f64>, render_fn: F) -> SharedClip<C, K, D>
where
    C: 'static,
    K: Send + 'static,
    D: Send + 'static,
    F: Fn(f64, &C) -> CuelistResult<Frame<K, D>> + Send + Sync + 'static,
{
    Arc::new(FnClip {
        duration,
        render_fn: Box::new(render_fn),
    })
}

/// Leaf clip whose render function is asynchronous. Created by [`async_clip`].
pub struct AsyncFnClip<C, K, D, F> {
    duration: Option<f64>,
    render_fn: F,
    _marker: PhantomData<fn(&C) -> (K, D)>,
}

impl<C, K, D, F> Clip<C, K, D> for AsyncFnClip<C, K, D, F>
where
    K: Send,
    D: Send,
    F: for<'a> Fn(f64, &'a C) -> BoxFuture<'a, CuelistResult<Frame<K, D>>> + Send + Sync,
{
    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        Render::Pending((self.render_fn)(t, ctx))
    }
}

/// Create a clip whose render function returns a future.
pub fn async_clip<C, K, D, F>(duration: Option<f64>, render_fn: F) -> SharedClip<C, K, D>
where
    C: 'static,
    K: Send + 'static,
    D: Send + 'static,
    F: for<'a> Fn(f64, &'a C) -> BoxFuture<'a, CuelistResult<Frame<K, D>>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(AsyncFnClip {
        duration,
        render_fn,
        _marker: PhantomData,
    })
}

/// Whether local time `t` falls inside a clip of the given duration.
pub fn is_active(local_t: f64, duration: Option<f64>) -> bool {
    local_t >= 0.0 && duration.map_or(true, |d| local_t <= d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuelist_common::error::CuelistError;
    use futures::FutureExt;

    #[test]
    fn test_fn_clip_renders_and_reports_duration() {
        let c = clip::<(), _, _, _>(Some(2.0), |t, _| Frame::from([("ch", t * 10.0)]));
        assert_eq!(c.duration(), Some(2.0));
        let frame = c.render(1.0, &()).into_ready().unwrap().unwrap();
        assert_eq!(frame, Frame::from([("ch", 10.0)]));
    }

    #[test]
    fn test_fn_clip_receives_context() {
        let c = clip::<f64, _, _, _>(None, |t, gain| Frame::from([("ch", t * gain)]));
        assert_eq!(c.duration(), None);
        let frame = c.render(2.0, &3.0).into_ready().unwrap().unwrap();
        assert_eq!(frame["ch"], 6.0);
    }

    #[test]
    fn test_try_clip_surfaces_errors() {
        let c = try_clip::<(), &str, f64, _>(Some(1.0), |_, _| {
            Err(CuelistError::render("fixture offline"))
        });
        assert!(c.render(0.5, &()).into_ready().unwrap().is_err());
    }

    #[tokio::test]
    async fn test_async_clip_is_pending() {
        let c = async_clip::<(), _, _, _>(Some(1.0), |t, _| {
            async move { Ok(Frame::from([("ch", t * 3.0)])) }.boxed()
        });
        let render = c.render(2.0, &());
        assert!(render.is_pending());
        assert_eq!(render.resolve().await.unwrap()["ch"], 6.0);
    }

    #[test]
    fn test_activation_window() {
        assert!(is_active(0.0, Some(2.0)));
        assert!(is_active(2.0, Some(2.0)));
        assert!(!is_active(2.0001, Some(2.0)));
        assert!(!is_active(-0.0001, Some(2.0)));
        assert!(is_active(1e9, None));
        assert!(!is_active(-1.0, None));
    }
}

//! Render results.
//!
//! A clip's render either produces its frame immediately or hands back a
//! future that resolves to it. Composite clips keep the immediate path
//! allocation-free and only suspend when at least one child suspended.

use std::collections::HashMap;
use std::future::Future;

use cuelist_common::error::CuelistResult;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Per-target deltas produced by one clip at one instant.
pub type Frame<K, D> = HashMap<K, D>;

/// Outcome of a single `render` call.
pub enum Render<'a, K, D> {
    /// The frame (or the failure) is available now.
    Ready(CuelistResult<Frame<K, D>>),
    /// The frame is still being computed.
    Pending(BoxFuture<'a, CuelistResult<Frame<K, D>>>),
}

impl<'a, K, D> Render<'a, K, D>
where
    K: Send + 'a,
    D: Send + 'a,
{
    /// An immediately available frame.
    pub fn ready(frame: Frame<K, D>) -> Self {
        Self::Ready(Ok(frame))
    }

    /// An immediately available empty frame.
    pub fn empty() -> Self {
        Self::Ready(Ok(Frame::new()))
    }

    /// An immediate failure.
    pub fn failed(err: cuelist_common::error::CuelistError) -> Self {
        Self::Ready(Err(err))
    }

    /// A frame that becomes available when `future` completes.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = CuelistResult<Frame<K, D>>> + Send + 'a,
    {
        Self::Pending(future.boxed())
    }

    /// Whether resolving this result requires awaiting.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The immediate result, or `None` when pending.
    pub fn into_ready(self) -> Option<CuelistResult<Frame<K, D>>> {
        match self {
            Self::Ready(result) => Some(result),
            Self::Pending(_) => None,
        }
    }

    /// Transform a successful frame, keeping the ready/pending shape.
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(Frame<K, D>) -> Frame<K, D> + Send + 'a,
    {
        match self {
            Self::Ready(result) => Self::Ready(result.map(f)),
            Self::Pending(future) => Self::pending(async move { future.await.map(f) }),
        }
    }

    /// Await the frame regardless of which case this is.
    pub async fn resolve(self) -> CuelistResult<Frame<K, D>> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl<K, D> std::fmt::Debug for Render<'_, K, D>
where
    K: std::fmt::Debug,
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

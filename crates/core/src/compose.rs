//! Compose functions for merging overlapping clip outputs.
//!
//! A compose function receives every delta contributed to one target in a
//! single render call, in the timeline's event storage order, and reduces
//! them to the value sent downstream. Returning `None` drops the target
//! from the composed frame.

use std::ops::{Add, Div};
use std::sync::Arc;

/// Reducer over simultaneous deltas for one target.
pub type ComposeFn<D> = Arc<dyn Fn(Vec<D>) -> Option<D> + Send + Sync>;

/// Wrap a plain function as a shareable [`ComposeFn`].
pub fn compose_fn<D, F>(f: F) -> ComposeFn<D>
where
    F: Fn(Vec<D>) -> Option<D> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Return the last (most recently added) delta. Safe generic default.
pub fn compose_last<D>(mut deltas: Vec<D>) -> Option<D> {
    deltas.pop()
}

/// Return the first (earliest added) delta.
pub fn compose_first<D>(deltas: Vec<D>) -> Option<D> {
    deltas.into_iter().next()
}

/// Sum all deltas.
pub fn compose_sum<D: Add<Output = D>>(deltas: Vec<D>) -> Option<D> {
    deltas.into_iter().reduce(|acc, d| acc + d)
}

/// Average all deltas.
pub fn compose_mean<D>(deltas: Vec<D>) -> Option<D>
where
    D: Add<Output = D> + Div<f64, Output = D>,
{
    let count = deltas.len() as f64;
    compose_sum(deltas).map(|total| total / count)
}

/// Highest-takes-precedence (HTP), the usual lighting merge.
pub fn compose_max<D: PartialOrd>(deltas: Vec<D>) -> Option<D> {
    deltas
        .into_iter()
        .reduce(|best, d| if d > best { d } else { best })
}

/// Lowest value wins.
pub fn compose_min<D: PartialOrd>(deltas: Vec<D>) -> Option<D> {
    deltas
        .into_iter()
        .reduce(|best, d| if d < best { d } else { best })
}

/// The default reducer for new timelines.
pub fn default_compose<D: 'static>() -> ComposeFn<D> {
    Arc::new(compose_last::<D>)
}

//! Verification points: the instants worth rendering to check a show.
//!
//! Every event contributes a start point, plus an end point nudged 1 ms
//! inside its window so the final frame still has the clip active. Nested
//! timelines are walked through any decorators, with their points placed on
//! the outer time axis.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::clip::{Clip, SharedClip, TimelineRef};

/// How far end points are pulled inward, in seconds.
const END_NUDGE: f64 = 0.001;

/// Which edge of an event a point marks. Starts order before ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Start,
    End,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// A single instant to render for verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyPoint {
    /// Absolute show time in seconds.
    pub time_seconds: f64,
    /// Display label, e.g. `"pulse (start)"`.
    pub label: String,
    /// Index of the event within its own (possibly nested) timeline.
    pub event_index: usize,
    pub edge: Edge,
}

/// Collect verify points for a timeline and everything nested in it.
///
/// Points are ordered by time, starts before ends at equal times, and
/// otherwise keep collection order.
pub fn collect_verify_points<C, K, D>(timeline: TimelineRef<'_, C, K, D>) -> Vec<VerifyPoint> {
    let mut points = Vec::new();
    let to_seconds = |position: f64| timeline.to_seconds(position);
    collect_into(timeline, &to_seconds, &mut points);

    points.sort_by(|a, b| {
        a.time_seconds
            .partial_cmp(&b.time_seconds)
            .unwrap_or(Ordering::Equal)
            .then(a.edge.cmp(&b.edge))
    });
    points
}

fn label_for<C, K, D>(index: usize, clip: &SharedClip<C, K, D>) -> String {
    clip.metadata()
        .and_then(|meta| meta.label())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("clip[{index}]"))
}

/// `to_seconds` maps a position in `timeline` to absolute show time.
fn collect_into<C, K, D>(
    timeline: TimelineRef<'_, C, K, D>,
    to_seconds: &dyn Fn(f64) -> f64,
    points: &mut Vec<VerifyPoint>,
) {
    for (index, event) in timeline.events().iter().enumerate() {
        let label = label_for(index, &event.clip);
        let start = to_seconds(event.position);

        points.push(VerifyPoint {
            time_seconds: start,
            label: format!("{label} (start)"),
            event_index: index,
            edge: Edge::Start,
        });

        if let Some(duration) = event.clip.duration().filter(|d| d.is_finite() && *d > 0.0) {
            let end = to_seconds(event.position + duration);
            points.push(VerifyPoint {
                time_seconds: start.max(end - END_NUDGE),
                label: format!("{label} (end)"),
                event_index: index,
                edge: Edge::End,
            });
        }

        let Some(child) = event.clip.as_timeline() else {
            continue;
        };
        match child {
            TimelineRef::Seconds(_) => {
                let offset = start;
                collect_into(child, &|p| offset + p, points);
            }
            TimelineRef::Beats(inner) => {
                let offset = start;
                collect_into(child, &|p| offset + inner.tempo_map().time(p), points);
            }
            // Plays in this timeline's beat space, not its own.
            TimelineRef::NestedBeats(_) => {
                let position = event.position;
                collect_into(child, &|p| to_seconds(position + p), points);
            }
        }
    }
}

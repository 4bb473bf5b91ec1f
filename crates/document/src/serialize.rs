//! Timelines back to documents.
//!
//! Only what the clips' metadata records can be written: clips added without
//! a [`MetadataClip`](cuelist_core::MetadataClip) keep their position but
//! lose their content.

use cuelist_common::error::CuelistResult;
use cuelist_core::TimelineRef;

use crate::model::{ClipRefDoc, EventDoc, TempoDoc, TimelineDoc, TimelineKind};
use crate::registry::ClipRegistry;

/// Build the document for a timeline.
///
/// The compose function is named only when it is registered. Editor fields
/// (`variables`, `templates`) are not produced; instance params are written
/// as they were read, so `$var` references survive a round trip.
pub fn serialize_timeline<C, K, D>(
    timeline: TimelineRef<'_, C, K, D>,
    registry: &ClipRegistry<C, K, D>,
) -> CuelistResult<TimelineDoc> {
    let kind = if timeline.is_beats() {
        TimelineKind::Beats
    } else {
        TimelineKind::Seconds
    };
    let mut doc = TimelineDoc::new(kind);

    doc.compose_fn = registry
        .find_compose_name(timeline.compose_fn())
        .map(str::to_owned);

    if let TimelineRef::Beats(bpm) | TimelineRef::NestedBeats(bpm) = timeline {
        let tempo_map = bpm.tempo_map();
        doc.tempo = Some(TempoDoc {
            bpm: tempo_map.bpm(),
            changes: tempo_map.changes()[1..].to_vec(),
        });
    }

    for event in timeline.events() {
        let mut out = EventDoc::at(event.position);
        if let Some(metadata) = event.clip.metadata() {
            if let Some(link) = &metadata.timeline {
                out.timeline = Some(link.clone());
            } else if let Some(clip_type) = &metadata.clip_type {
                out.clip = Some(ClipRefDoc {
                    clip_type: clip_type.clone(),
                    params: metadata.params.clone(),
                    template_id: metadata.template_id.clone().filter(|id| !id.is_empty()),
                });
            }
            out.meta = metadata.meta.clone();
        }
        doc.push_event(&out)?;
    }

    Ok(doc)
}

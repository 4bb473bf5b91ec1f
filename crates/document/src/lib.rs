//! Cuelist Document
//!
//! The JSON document format for timelines (`cuelist-timeline-v1`) and the
//! machinery that turns documents into clip trees and back:
//! - **Model:** serde types for timeline documents and their events
//! - **Registry:** named clip factories, resources, compose functions and sets
//! - **Params:** variable substitution, set evaluation and resource lookup
//! - **Deserialize / serialize:** documents to timelines, timelines to documents
//!
//! Deserialization is lenient: a bad event is logged, recorded and skipped
//! while the rest of the document still loads.

pub mod deserialize;
pub mod model;
pub mod params;
pub mod registry;
pub mod serialize;
pub mod seteval;

pub use deserialize::{deserialize_timeline, AnyTimeline, Deserializer, LoadFn, SkippedEvent};
pub use model::*;
pub use params::{resolve_variables, ClipParams};
pub use registry::{ClipFactory, ClipRegistry, NamedSets, Resource};
pub use serialize::serialize_timeline;
pub use seteval::{evaluate_set, parse_set_ops, SetAlgebra, SetOp};

//! Tempo mapping between beats and seconds.
//!
//! Tempo is piecewise constant: each breakpoint sets the BPM from its beat
//! until the next breakpoint. There is always a breakpoint at beat 0, and
//! positions before beat 0 extrapolate linearly at that initial tempo, so
//! both conversions are defined (and mutually inverse) on the whole real line.

use serde::{Deserialize, Serialize};

/// One tempo breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    /// Beat the tempo takes effect at.
    pub beat: f64,
    /// Beats per minute from `beat` onwards.
    pub bpm: f64,
}

/// Beat-sorted tempo breakpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl TempoMap {
    /// A constant-tempo map.
    pub fn new(bpm: f64) -> Self {
        Self {
            changes: vec![TempoChange { beat: 0.0, bpm }],
        }
    }

    /// Initial tempo (the beat-0 breakpoint).
    pub fn bpm(&self) -> f64 {
        self.changes[0].bpm
    }

    /// All breakpoints, beat-sorted, starting with beat 0.
    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Insert or replace a breakpoint.
    ///
    /// Any `beat <= 0` replaces the beat-0 tempo. Non-finite beats and
    /// non-positive tempos are ignored.
    pub fn set_tempo(&mut self, beat: f64, bpm: f64) -> &mut Self {
        if !beat.is_finite() || !(bpm.is_finite() && bpm > 0.0) {
            tracing::warn!(beat, bpm, "Ignoring invalid tempo change");
            return self;
        }
        if beat <= 0.0 {
            self.changes[0].bpm = bpm;
        } else {
            self.changes.retain(|c| c.beat != beat);
            self.changes.push(TempoChange { beat, bpm });
            self.changes.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        }
        self
    }

    /// Convert a beat position to seconds.
    pub fn time(&self, beats: f64) -> f64 {
        let initial = self.bpm();
        if beats <= 0.0 {
            return beats * 60.0 / initial;
        }

        let mut seconds = 0.0;
        let mut prev_beat = 0.0;
        let mut prev_bpm = initial;

        for change in &self.changes[1..] {
            if beats <= change.beat {
                break;
            }
            seconds += (change.beat - prev_beat) * 60.0 / prev_bpm;
            prev_beat = change.beat;
            prev_bpm = change.bpm;
        }

        seconds + (beats - prev_beat) * 60.0 / prev_bpm
    }

    /// Convert seconds to a beat position.
    pub fn beat(&self, seconds: f64) -> f64 {
        let initial = self.bpm();
        if seconds <= 0.0 {
            return seconds * initial / 60.0;
        }

        let mut elapsed = 0.0;
        let mut prev_beat = 0.0;
        let mut prev_bpm = initial;

        for change in &self.changes[1..] {
            let segment = (change.beat - prev_beat) * 60.0 / prev_bpm;
            if elapsed + segment >= seconds {
                break;
            }
            elapsed += segment;
            prev_beat = change.beat;
            prev_bpm = change.bpm;
        }

        prev_beat + (seconds - elapsed) * prev_bpm / 60.0
    }
}

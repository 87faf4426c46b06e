//! Step-function resource profiles.

use std::collections::BTreeMap;

/// A maximal interval of constant usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First instant (inclusive).
    pub start: i64,
    /// Last instant (exclusive).
    pub end: i64,
    /// Usage over the segment.
    pub usage: i64,
}

/// Usage of one resource of one node over `[0, horizon)`.
///
/// Built from an initial usage at 0 and signed deltas; deltas at or past
/// the horizon are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageProfile {
    segments: Vec<Segment>,
}

impl UsageProfile {
    /// Builds the profile.
    pub fn new(initial: i64, deltas: &BTreeMap<i64, i64>, horizon: i64) -> Self {
        let horizon = horizon.max(1);
        let mut segments = Vec::new();
        let mut start = 0;
        let mut usage = initial;
        for (&at, &delta) in deltas.range(0..horizon) {
            if at > start {
                segments.push(Segment {
                    start,
                    end: at,
                    usage,
                });
                start = at;
            }
            usage += delta;
        }
        segments.push(Segment {
            start,
            end: horizon,
            usage,
        });

        // merge neighbours with equal usage
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        for segment in segments {
            match merged.last_mut() {
                Some(last) if last.usage == segment.usage => last.end = segment.end,
                _ => merged.push(segment),
            }
        }
        Self { segments: merged }
    }

    /// Segments in time order, covering `[0, horizon)`.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First segment ending after `from` whose usage exceeds `limit`.
    pub fn first_above(&self, limit: i64, from: i64) -> Option<Segment> {
        self.segments
            .iter()
            .find(|s| s.end > from && s.usage > limit)
            .copied()
    }

    /// Last segment starting before `before` whose usage exceeds `limit`.
    pub fn last_above_before(&self, limit: i64, before: i64) -> Option<Segment> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.start < before && s.usage > limit)
            .copied()
    }

    /// Earliest instant from which usage never exceeds `limit` again.
    pub fn settled_from(&self, limit: i64) -> i64 {
        self.segments
            .iter()
            .rev()
            .find(|s| s.usage > limit)
            .map_or(0, |s| s.end)
    }
}

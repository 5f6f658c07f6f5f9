//! Per-channel import report and the sink that mirrors it to a logger.

use serde::{Deserialize, Serialize};

use crate::data::Attribute;
use crate::path_hash::PathHash;

const LOG_TARGET: &str = "unity_retarget";

/// Final result for one clip curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOutcome {
    Ok,
    Unresolved,
    DroppedCollision,
    /// Structurally unusable (skipped), or emitted with zero-substituted components.
    Malformed,
    Unsupported,
}

/// Non-fatal condition attached to a report entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelIssue {
    UnresolvedChannel,
    HashCollision,
    MalformedKeyframe,
    UnsupportedAttribute,
}

/// Channel life cycle. `Emitted` and `Skipped` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Unresolved,
    Resolved,
    Retargeted,
    Emitted,
    Skipped,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Emitted | ChannelState::Skipped)
    }

    /// Whether the pipeline may move from `self` to `next`.
    pub fn can_advance_to(self, next: ChannelState) -> bool {
        matches!(
            (self, next),
            (ChannelState::Unresolved, ChannelState::Resolved)
                | (ChannelState::Unresolved, ChannelState::Skipped)
                | (ChannelState::Resolved, ChannelState::Retargeted)
                | (ChannelState::Resolved, ChannelState::Skipped)
                | (ChannelState::Retargeted, ChannelState::Emitted)
                | (ChannelState::Retargeted, ChannelState::Skipped)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Position of the curve in the clip.
    pub curve_index: usize,
    pub path_hash: PathHash,
    pub attribute: Attribute,
    /// Host data path when the channel was bound.
    pub data_path: Option<String>,
    pub outcome: ChannelOutcome,
    pub state: ChannelState,
    pub issue: Option<ChannelIssue>,
    pub message: String,
}

impl ReportEntry {
    /// Move the entry to `next`. Debug builds reject out-of-order transitions.
    pub fn advance(&mut self, next: ChannelState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "channel {} cannot go from {:?} to {next:?}",
            self.curve_index,
            self.state
        );
        self.state = next;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub clip: String,
    /// Curves in the clip, processed or not.
    pub total: usize,
    pub ok: usize,
    pub unresolved: usize,
    pub dropped_collision: usize,
    pub malformed: usize,
    pub unsupported: usize,
    pub cancelled: bool,
    /// One entry per processed curve, in clip order.
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new(clip: impl Into<String>, total: usize) -> Self {
        Self {
            clip: clip.into(),
            total,
            ..Default::default()
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        match entry.outcome {
            ChannelOutcome::Ok => self.ok += 1,
            ChannelOutcome::Unresolved => self.unresolved += 1,
            ChannelOutcome::DroppedCollision => self.dropped_collision += 1,
            ChannelOutcome::Malformed => self.malformed += 1,
            ChannelOutcome::Unsupported => self.unsupported += 1,
        }
        self.entries.push(entry);
    }

    /// Channels that reached the action.
    pub fn imported(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == ChannelState::Emitted)
            .count()
    }

    pub fn summary(&self) -> String {
        format!("{} of {} channels imported", self.imported(), self.total)
    }
}

/// Receives every report entry as it is produced.
pub trait ReportSink {
    fn record(&mut self, entry: &ReportEntry);
}

/// Forwards entries to the `log` facade: `debug` for ok, `warn` otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn record(&mut self, entry: &ReportEntry) {
        let path = entry.data_path.as_deref().unwrap_or("-");
        if entry.outcome == ChannelOutcome::Ok {
            log::debug!(
                target: LOG_TARGET,
                "curve {} ({:#010x}, {}) -> {}",
                entry.curve_index,
                entry.path_hash,
                entry.attribute.label(),
                path
            );
        } else {
            log::warn!(
                target: LOG_TARGET,
                "curve {} ({:#010x}, {}) {:?}: {}",
                entry.curve_index,
                entry.path_hash,
                entry.attribute.label(),
                entry.outcome,
                entry.message
            );
        }
    }
}

/// Sink that keeps a copy of every entry.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    pub entries: Vec<ReportEntry>,
}

impl ReportSink for CollectingSink {
    fn record(&mut self, entry: &ReportEntry) {
        self.entries.push(entry.clone());
    }
}

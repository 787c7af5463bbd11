//! Structured progress events.
//!
//! The search algorithms never print. They emit [`ProgressEvent`]s to a
//! [`ProgressSink`], and the caller decides whether those become log lines,
//! channel messages, counters, or nothing at all.

pub mod stats;

pub use stats::{RunStats, RunStatsSnapshot};

use crate::classify::ClassifierKind;
use crate::core::FeatureSet;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Capacity of the channel created by [`ChannelSink::channel`].
const CHANNEL_CAPACITY: usize = 10_000;

/// Something that happened during a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A dataset was extracted from the recordings
    FeaturesExtracted {
        window_ms: u32,
        feature_set: FeatureSet,
        rows: usize,
    },
    /// A dataset was served from the feature cache
    FeatureCacheHit {
        window_ms: u32,
        feature_set: FeatureSet,
    },
    WindowEvaluated {
        classifier: ClassifierKind,
        window_ms: u32,
        accuracy: f64,
    },
    WindowCandidateFailed {
        classifier: ClassifierKind,
        window_ms: u32,
        error: String,
    },
    /// The window produced no feature rows and scored 0.0 unevaluated
    WindowEmpty {
        classifier: ClassifierKind,
        window_ms: u32,
    },
    WindowSelected {
        classifier: ClassifierKind,
        window_ms: u32,
        accuracy: f64,
    },
    SfsCandidateEvaluated {
        classifier: ClassifierKind,
        round: usize,
        column: usize,
        accuracy: f64,
    },
    SfsCandidateFailed {
        classifier: ClassifierKind,
        round: usize,
        column: usize,
        error: String,
    },
    /// Best candidate of a round, and whether it was kept
    SfsRoundCompleted {
        classifier: ClassifierKind,
        round: usize,
        column: usize,
        name: String,
        accuracy: f64,
        improvement: f64,
        committed: bool,
    },
    SfsFinished {
        classifier: ClassifierKind,
        selected: usize,
        accuracy: f64,
    },
}

/// Receives progress events.
pub trait ProgressSink {
    fn emit(&self, event: &ProgressEvent);
}

impl<S: ProgressSink + ?Sized> ProgressSink for &S {
    fn emit(&self, event: &ProgressEvent) {
        (**self).emit(event)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn emit(&self, event: &ProgressEvent) {
        (**self).emit(event)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Box<S> {
    fn emit(&self, event: &ProgressEvent) {
        (**self).emit(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &ProgressEvent) {}
}

/// Renders events as `tracing` log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::FeaturesExtracted {
                window_ms,
                feature_set,
                rows,
            } => info!(window_ms, %feature_set, rows, "extracted features"),
            ProgressEvent::FeatureCacheHit {
                window_ms,
                feature_set,
            } => debug!(window_ms, %feature_set, "feature cache hit"),
            ProgressEvent::WindowEvaluated {
                classifier,
                window_ms,
                accuracy,
            } => info!(
                %classifier,
                window_ms,
                accuracy = %format!("{:.2}%", accuracy * 100.0),
                "window evaluated"
            ),
            ProgressEvent::WindowCandidateFailed {
                classifier,
                window_ms,
                error,
            } => warn!(%classifier, window_ms, %error, "window candidate failed"),
            ProgressEvent::WindowEmpty {
                classifier,
                window_ms,
            } => warn!(%classifier, window_ms, "window produced no feature rows, scoring 0"),
            ProgressEvent::WindowSelected {
                classifier,
                window_ms,
                accuracy,
            } => info!(
                %classifier,
                window_ms,
                accuracy = %format!("{:.2}%", accuracy * 100.0),
                "optimal window selected"
            ),
            ProgressEvent::SfsCandidateEvaluated {
                classifier,
                round,
                column,
                accuracy,
            } => debug!(%classifier, round, column, accuracy, "candidate evaluated"),
            ProgressEvent::SfsCandidateFailed {
                classifier,
                round,
                column,
                error,
            } => warn!(%classifier, round, column, %error, "feature candidate failed"),
            ProgressEvent::SfsRoundCompleted {
                classifier,
                round,
                name,
                accuracy,
                improvement,
                committed,
                ..
            } => {
                if *committed {
                    info!(
                        %classifier,
                        round,
                        feature = %name,
                        accuracy = %format!("{:.2}%", accuracy * 100.0),
                        improvement = %format!("{:+.2}%", improvement * 100.0),
                        "feature added"
                    );
                } else {
                    info!(
                        %classifier,
                        round,
                        best = %name,
                        improvement = %format!("{:+.2}%", improvement * 100.0),
                        "no sufficient improvement, stopping"
                    );
                }
            }
            ProgressEvent::SfsFinished {
                classifier,
                selected,
                accuracy,
            } => info!(
                %classifier,
                selected,
                accuracy = %format!("{:.2}%", accuracy * 100.0),
                "feature selection finished"
            ),
        }
    }
}

/// Forwards events over a crossbeam channel.
///
/// Sending never blocks; events are dropped when the channel is full or the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<ProgressEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: &ProgressEvent) {
        let _ = self.sender.try_send(event.clone());
    }
}

/// Sends every event to several sinks in order.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ProgressSink for Fanout {
    fn emit(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

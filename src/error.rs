//! Error type shared by the whole engine.

use itertools::Itertools;

use crate::biquad::Coefficients;
use crate::node::NodeId;

/// Everything that can go wrong while building or running a graph.
///
/// Configuration errors (`UnknownBlock`, `UnknownNode`, `InputPort`, `OutputPort`,
/// `NotInjector`, `QueueFull`, `EngineStopped`) leave the engine untouched. `Stall`, `Diverged` and
/// `OverDelivered` abort the current tick.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown block type '{0}'")]
    UnknownBlock(String),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("input port {port} out of range ({count} inputs)")]
    InputPort { port: usize, count: usize },

    #[error("output port {port} out of range ({count} outputs)")]
    OutputPort { port: usize, count: usize },

    #[error("node {0} is not a value injector")]
    NotInjector(NodeId),

    #[error("command queue is full")]
    QueueFull,

    #[error("input port {port} received more values than its {expected} edge(s)")]
    OverDelivered { port: usize, expected: i32 },

    #[error(transparent)]
    Stall(#[from] Box<Stall>),

    #[error(
        "biquad diverged on input {input}: coefficients {coefficients:?}, history \
         [x1 {:e}, x2 {:e}, y1 {:e}, y2 {:e}]",
        .history[0], .history[1], .history[2], .history[3]
    )]
    Diverged {
        input: f32,
        coefficients: Coefficients,
        history: [f64; 4],
    },

    #[error("stream is empty")]
    EmptyStream,

    #[error("timestamp {timestamp:.6}s predates the oldest retained batch at {oldest:.6}s")]
    StaleTimestamp { timestamp: f64, oldest: f64 },

    #[error("timestamp {timestamp:.6}s is past the newest retained batch at {newest:.6}s")]
    FutureTimestamp { timestamp: f64, newest: f64 },

    #[error("synthesis thread panicked")]
    EnginePanicked,

    #[error("engine has stopped, graph edits are no longer applied")]
    EngineStopped,

    #[error("failed to start synthesis thread")]
    Spawn(#[from] std::io::Error),

    #[cfg(feature = "cpal_sink")]
    #[error("no audio output device available")]
    NoDevice,

    #[cfg(feature = "cpal_sink")]
    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[cfg(feature = "cpal_sink")]
    #[error(transparent)]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "cpal_sink")]
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal_sink")]
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Diagnostic for a tick in which no remaining node could become ready.
#[derive(Debug, Clone, PartialEq)]
pub struct Stall {
    /// Every node still waiting when the scheduler gave up.
    pub blocked: Vec<Blocked>,
    /// A node on a dependency cycle, if the edge set contains one.
    pub cycle: Option<NodeId>,
}

/// A node that never reached zero on all of its readiness counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    pub node: NodeId,
    pub name: String,
    /// Remaining arrivals per input port.
    pub remaining: Vec<i32>,
}

impl core::fmt::Display for Stall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "scheduling stalled with {} node(s) never ready: {}",
            self.blocked.len(),
            self.blocked
                .iter()
                .format_with(", ", |b, f| f(&format_args!("{} {} waiting on {:?}", b.name, b.node, b.remaining)))
        )?;
        match self.cycle {
            Some(node) => write!(f, " (dependency cycle through {})", node),
            None => write!(f, " (no cycle found, check for a missing edge)"),
        }
    }
}

impl std::error::Error for Stall {}

//! Output graph capability
//!
//! The scheduler talks to audio output only through [`AudioGraph`], so it
//! can run against the software mixer, a device-backed graph or a recording
//! fake. Times are seconds on the graph's own clock.

use crate::audio::types::PcmAsset;
use crate::error::Result;
use serde::Serialize;
use std::sync::Arc;

/// Handle to a node owned by a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a node's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Destination {
    /// The graph's final output
    Output,
    /// Another node (a gain)
    Node(NodeId),
}

/// Gain automation event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GainRamp {
    /// Jump to the value at the given time
    Step,
    /// Ramp linearly from the previous event to the value at the given time
    Linear,
}

/// Audio output graph capability
pub trait AudioGraph: Send {
    /// Current time on the graph clock, in seconds
    fn current_time(&self) -> f64;

    /// Create a one-shot source node playing `asset`
    fn create_source(&mut self, asset: Arc<PcmAsset>) -> Result<NodeId>;

    /// Create a gain node with an initial gain
    fn create_gain(&mut self, gain: f32) -> Result<NodeId>;

    /// Route `node` into `destination`
    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<()>;

    /// Add a gain automation event to a gain node
    fn schedule_gain(&mut self, node: NodeId, ramp: GainRamp, value: f32, at: f64) -> Result<()>;

    /// Start a source node at time `at` (immediately if `at` has passed)
    fn start(&mut self, node: NodeId, at: f64) -> Result<()>;

    /// Stop, disconnect and release a node; unknown ids are ignored
    fn stop(&mut self, node: NodeId);
}

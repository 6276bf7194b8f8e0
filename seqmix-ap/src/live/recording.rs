//! Recording output graph
//!
//! An [`AudioGraph`] that produces no sound and records every call with the
//! graph time it was made at. Its clock is either set by hand or follows
//! tokio time, which lets tests run whole sessions under a paused runtime.
//! Also backs `play --dry-run`.

use crate::audio::types::PcmAsset;
use crate::error::{Error, Result};
use crate::live::graph::{AudioGraph, Destination, GainRamp, NodeId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::Instant;

/// One recorded graph call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum GraphCall {
    CreateSource {
        node: NodeId,
        duration: f64,
    },
    CreateGain {
        node: NodeId,
        gain: f32,
    },
    Connect {
        node: NodeId,
        destination: Destination,
    },
    ScheduleGain {
        node: NodeId,
        ramp: GainRamp,
        value: f32,
        at: f64,
    },
    Start {
        node: NodeId,
        at: f64,
    },
    Stop {
        node: NodeId,
    },
}

#[derive(Debug)]
enum Clock {
    Manual(f64),
    Tokio(Instant),
}

/// Graph fake that records calls
#[derive(Debug)]
pub struct RecordingGraph {
    clock: Clock,
    next_id: u64,
    live: BTreeSet<NodeId>,
    calls: Vec<(f64, GraphCall)>,
    fail_sources: bool,
}

impl Default for RecordingGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGraph {
    /// Graph with a manual clock starting at 0
    pub fn new() -> Self {
        Self::with_clock(Clock::Manual(0.0))
    }

    /// Graph whose clock is tokio time elapsed since creation
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_tokio_clock() -> Self {
        Self::with_clock(Clock::Tokio(Instant::now()))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            next_id: 1,
            live: BTreeSet::new(),
            calls: Vec::new(),
            fail_sources: false,
        }
    }

    /// Set the manual clock (ignored for a tokio clock)
    pub fn set_time(&mut self, seconds: f64) {
        if let Clock::Manual(t) = &mut self.clock {
            *t = seconds;
        }
    }

    /// Advance the manual clock (ignored for a tokio clock)
    pub fn advance(&mut self, seconds: f64) {
        if let Clock::Manual(t) = &mut self.clock {
            *t += seconds;
        }
    }

    /// Make `create_source` fail, simulating an output error
    pub fn fail_sources(&mut self, fail: bool) {
        self.fail_sources = fail;
    }

    /// Every call with the graph time it was made at
    pub fn calls(&self) -> &[(f64, GraphCall)] {
        &self.calls
    }

    /// Drain the recorded calls
    pub fn take_calls(&mut self) -> Vec<(f64, GraphCall)> {
        std::mem::take(&mut self.calls)
    }

    /// Nodes created and not yet stopped
    pub fn live_nodes(&self) -> usize {
        self.live.len()
    }

    /// `(node, at)` of every source start
    pub fn starts(&self) -> Vec<(NodeId, f64)> {
        self.calls
            .iter()
            .filter_map(|(_, call)| match call {
                GraphCall::Start { node, at } => Some((*node, *at)),
                _ => None,
            })
            .collect()
    }

    /// Automation events scheduled on `gain`, as `(ramp, value, at)`
    pub fn automation(&self, gain: NodeId) -> Vec<(GainRamp, f32, f64)> {
        self.calls
            .iter()
            .filter_map(|(_, call)| match call {
                GraphCall::ScheduleGain {
                    node,
                    ramp,
                    value,
                    at,
                } if *node == gain => Some((*ramp, *value, *at)),
                _ => None,
            })
            .collect()
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        id
    }

    fn record(&mut self, call: GraphCall) {
        let now = self.current_time();
        self.calls.push((now, call));
    }

    fn require_live(&self, node: NodeId) -> Result<()> {
        if self.live.contains(&node) {
            Ok(())
        } else {
            Err(Error::AudioOutput(format!("node {} does not exist", node)))
        }
    }
}

impl AudioGraph for RecordingGraph {
    fn current_time(&self) -> f64 {
        match &self.clock {
            Clock::Manual(t) => *t,
            Clock::Tokio(origin) => origin.elapsed().as_secs_f64(),
        }
    }

    fn create_source(&mut self, asset: Arc<PcmAsset>) -> Result<NodeId> {
        if self.fail_sources {
            return Err(Error::AudioOutput("source creation disabled".to_string()));
        }
        let node = self.allocate();
        self.record(GraphCall::CreateSource {
            node,
            duration: asset.duration_secs(),
        });
        Ok(node)
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId> {
        let node = self.allocate();
        self.record(GraphCall::CreateGain { node, gain });
        Ok(node)
    }

    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<()> {
        self.require_live(node)?;
        if let Destination::Node(target) = destination {
            self.require_live(target)?;
        }
        self.record(GraphCall::Connect { node, destination });
        Ok(())
    }

    fn schedule_gain(&mut self, node: NodeId, ramp: GainRamp, value: f32, at: f64) -> Result<()> {
        self.require_live(node)?;
        self.record(GraphCall::ScheduleGain {
            node,
            ramp,
            value,
            at,
        });
        Ok(())
    }

    fn start(&mut self, node: NodeId, at: f64) -> Result<()> {
        self.require_live(node)?;
        self.record(GraphCall::Start { node, at });
        Ok(())
    }

    fn stop(&mut self, node: NodeId) {
        if self.live.remove(&node) {
            self.record(GraphCall::Stop { node });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_at_clock_time() {
        let mut graph = RecordingGraph::new();
        let gain = graph.create_gain(0.0).unwrap();
        graph.set_time(1.5);
        graph.connect(gain, Destination::Output).unwrap();
        graph
            .schedule_gain(gain, GainRamp::Linear, 1.0, 2.5)
            .unwrap();

        assert_eq!(graph.calls().len(), 3);
        assert_eq!(graph.calls()[0].0, 0.0);
        assert_eq!(graph.calls()[1].0, 1.5);
        assert_eq!(graph.automation(gain), vec![(GainRamp::Linear, 1.0, 2.5)]);
    }

    #[test]
    fn test_stop_releases_once() {
        let mut graph = RecordingGraph::new();
        let asset = Arc::new(PcmAsset::new(10, vec![vec![0.0; 10]]).unwrap());
        let source = graph.create_source(asset).unwrap();
        assert_eq!(graph.live_nodes(), 1);

        graph.stop(source);
        graph.stop(source);
        assert_eq!(graph.live_nodes(), 0);
        let stops = graph
            .calls()
            .iter()
            .filter(|(_, c)| matches!(c, GraphCall::Stop { .. }))
            .count();
        assert_eq!(stops, 1);
        assert!(graph.start(source, 0.0).is_err());
    }

    #[test]
    fn test_failing_sources() {
        let mut graph = RecordingGraph::new();
        graph.fail_sources(true);
        let asset = Arc::new(PcmAsset::new(10, vec![vec![0.0; 1]]).unwrap());
        assert!(matches!(graph.create_source(asset), Err(Error::AudioOutput(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let graph = RecordingGraph::with_tokio_clock();
        tokio::time::advance(std::time::Duration::from_millis(2500)).await;
        assert!((graph.current_time() - 2.5).abs() < 1e-9);
    }
}

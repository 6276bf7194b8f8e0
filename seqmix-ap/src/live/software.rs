//! Software output graph
//!
//! A small mixing graph with Web-Audio-style gain automation. Sources play a
//! decoded asset once from their start time; gain nodes multiply whatever is
//! routed into them by a value that follows scheduled step and linear-ramp
//! events. The clock is the number of frames rendered divided by the rate, so
//! time only moves when someone pulls audio (a device callback or the
//! headless pump).

use crate::audio::types::PcmAsset;
use crate::error::{Error, Result};
use crate::live::graph::{AudioGraph, Destination, GainRamp, NodeId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Longest gain chain followed before a route is treated as a cycle
const MAX_ROUTE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy)]
struct GainEvent {
    ramp: GainRamp,
    value: f32,
    at: f64,
}

/// Automated gain value
#[derive(Debug, Clone)]
pub struct GainParam {
    initial: f32,
    events: Vec<GainEvent>,
}

impl GainParam {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    /// Insert an event, after any existing events at the same time
    pub fn schedule(&mut self, ramp: GainRamp, value: f32, at: f64) {
        let pos = self.events.partition_point(|e| e.at <= at);
        self.events.insert(pos, GainEvent { ramp, value, at });
    }

    /// Value at time `t`
    ///
    /// A linear event ramps from the previous event's value and time (or the
    /// initial value at time 0) to its own value at its own time.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut value = self.initial;
        let mut from = 0.0_f64;
        for event in &self.events {
            if event.at <= t {
                value = event.value;
                from = event.at;
                continue;
            }
            if event.ramp == GainRamp::Linear {
                let span = event.at - from;
                if span > 0.0 {
                    let frac = ((t - from) / span).clamp(0.0, 1.0) as f32;
                    return value + (event.value - value) * frac;
                }
            }
            break;
        }
        value
    }
}

#[derive(Debug)]
enum NodeKind {
    Source {
        asset: Arc<PcmAsset>,
        start_frame: Option<u64>,
    },
    Gain(GainParam),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    destination: Option<Destination>,
}

/// In-process mixing graph rendering interleaved stereo
#[derive(Debug)]
pub struct SoftwareGraph {
    sample_rate: u32,
    frames_rendered: u64,
    next_id: u64,
    /// Ordered by id so sources are summed in creation order on every run
    nodes: BTreeMap<NodeId, Node>,
}

impl SoftwareGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames_rendered: 0,
            next_id: 1,
            nodes: BTreeMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Render `frames` frames of interleaved stereo
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        self.render_into(&mut out);
        out
    }

    /// Render into an interleaved stereo slice, advancing the clock
    pub fn render_into(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / 2;
        let rate = self.sample_rate as f64;
        let first = self.frames_rendered;

        for node in self.nodes.values() {
            let NodeKind::Source {
                asset,
                start_frame: Some(start),
            } = &node.kind
            else {
                continue;
            };
            let Some(chain) = self.route(node.destination) else {
                continue;
            };

            let step = asset.sample_rate() as f64 / rate;
            let from = first.max(*start);
            let to = first + frames as u64;
            for abs in from..to {
                let src = ((abs - start) as f64 * step) as usize;
                if src >= asset.frame_count() {
                    break;
                }
                let t = abs as f64 / rate;
                let gain: f32 = chain.iter().map(|p| p.value_at(t)).product();
                if gain == 0.0 {
                    continue;
                }
                let (left, right) = asset.stereo_frame(src);
                let i = (abs - first) as usize * 2;
                out[i] += left * gain;
                out[i + 1] += right * gain;
            }
        }

        self.frames_rendered += frames as u64;
    }

    /// Gain params between a node and the output, or `None` if it is not routed there
    fn route(&self, mut destination: Option<Destination>) -> Option<Vec<&GainParam>> {
        let mut chain = Vec::new();
        for _ in 0..MAX_ROUTE_DEPTH {
            match destination? {
                Destination::Output => return Some(chain),
                Destination::Node(id) => {
                    let node = self.nodes.get(&id)?;
                    let NodeKind::Gain(param) = &node.kind else {
                        return None;
                    };
                    chain.push(param);
                    destination = node.destination;
                }
            }
        }
        None
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                destination: None,
            },
        );
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::AudioOutput(format!("node {} does not exist", id)))
    }
}

impl AudioGraph for SoftwareGraph {
    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn create_source(&mut self, asset: Arc<PcmAsset>) -> Result<NodeId> {
        Ok(self.allocate(NodeKind::Source {
            asset,
            start_frame: None,
        }))
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId> {
        Ok(self.allocate(NodeKind::Gain(GainParam::new(gain))))
    }

    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<()> {
        if let Destination::Node(target) = destination {
            if target == node {
                return Err(Error::AudioOutput(format!("cannot connect {} to itself", node)));
            }
            match self.nodes.get(&target).map(|n| &n.kind) {
                Some(NodeKind::Gain(_)) => {}
                Some(NodeKind::Source { .. }) => {
                    return Err(Error::AudioOutput(format!("{} is not a gain node", target)));
                }
                None => {
                    return Err(Error::AudioOutput(format!("node {} does not exist", target)));
                }
            }
        }
        self.node_mut(node)?.destination = Some(destination);
        Ok(())
    }

    fn schedule_gain(&mut self, node: NodeId, ramp: GainRamp, value: f32, at: f64) -> Result<()> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Gain(param) => {
                param.schedule(ramp, value, at);
                Ok(())
            }
            NodeKind::Source { .. } => {
                Err(Error::AudioOutput(format!("{} is not a gain node", node)))
            }
        }
    }

    fn start(&mut self, node: NodeId, at: f64) -> Result<()> {
        let now_frame = self.frames_rendered;
        let requested = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        match &mut self.node_mut(node)?.kind {
            NodeKind::Source { start_frame, .. } => {
                *start_frame = Some(requested.max(now_frame));
                trace!("Source {} starts at frame {}", node, requested.max(now_frame));
                Ok(())
            }
            NodeKind::Gain(_) => Err(Error::AudioOutput(format!("{} is not a source node", node))),
        }
    }

    fn stop(&mut self, node: NodeId) {
        self.nodes.remove(&node);
    }
}

/// Software graph shared between the scheduler and an audio consumer
#[derive(Debug, Clone)]
pub struct SharedGraph {
    inner: Arc<Mutex<SoftwareGraph>>,
}

impl SharedGraph {
    pub fn new(graph: SoftwareGraph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    /// Lock the graph
    ///
    /// A panic while holding the lock leaves the graph structurally intact,
    /// so a poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, SoftwareGraph> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn render_into(&self, out: &mut [f32]) {
        self.lock().render_into(out);
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate()
    }
}

impl AudioGraph for SharedGraph {
    fn current_time(&self) -> f64 {
        self.lock().current_time()
    }

    fn create_source(&mut self, asset: Arc<PcmAsset>) -> Result<NodeId> {
        self.lock().create_source(asset)
    }

    fn create_gain(&mut self, gain: f32) -> Result<NodeId> {
        self.lock().create_gain(gain)
    }

    fn connect(&mut self, node: NodeId, destination: Destination) -> Result<()> {
        self.lock().connect(node, destination)
    }

    fn schedule_gain(&mut self, node: NodeId, ramp: GainRamp, value: f32, at: f64) -> Result<()> {
        self.lock().schedule_gain(node, ramp, value, at)
    }

    fn start(&mut self, node: NodeId, at: f64) -> Result<()> {
        self.lock().start(node, at)
    }

    fn stop(&mut self, node: NodeId) {
        self.lock().stop(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(rate: u32, frames: usize) -> Arc<PcmAsset> {
        Arc::new(PcmAsset::new(rate, vec![vec![1.0; frames]]).unwrap())
    }

    #[test]
    fn test_gain_param_web_audio_semantics() {
        let mut param = GainParam::new(0.0);
        param.schedule(GainRamp::Step, 0.0, 1.0);
        param.schedule(GainRamp::Linear, 1.0, 2.0);
        param.schedule(GainRamp::Step, 1.0, 4.0);
        param.schedule(GainRamp::Linear, 0.0, 6.0);

        assert_eq!(param.value_at(0.5), 0.0);
        assert_eq!(param.value_at(1.0), 0.0);
        assert!((param.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(param.value_at(3.0), 1.0);
        assert!((param.value_at(5.0) - 0.5).abs() < 1e-6);
        assert_eq!(param.value_at(7.0), 0.0);
    }

    #[test]
    fn test_source_through_gain_to_output() {
        let mut graph = SoftwareGraph::new(10);
        let gain = graph.create_gain(0.5).unwrap();
        graph.connect(gain, Destination::Output).unwrap();
        let source = graph.create_source(ones(10, 5)).unwrap();
        graph.connect(source, Destination::Node(gain)).unwrap();
        graph.start(source, 0.2).unwrap();

        let out = graph.render(10);
        let left: Vec<f32> = out.chunks(2).map(|f| f[0]).collect();
        assert_eq!(left, vec![0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0]);
        assert!((graph.current_time() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unrouted_source_is_silent() {
        let mut graph = SoftwareGraph::new(10);
        let source = graph.create_source(ones(10, 5)).unwrap();
        graph.start(source, 0.0).unwrap();
        assert!(graph.render(5).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stop_silences_and_releases() {
        let mut graph = SoftwareGraph::new(10);
        let source = graph.create_source(ones(10, 100)).unwrap();
        graph.connect(source, Destination::Output).unwrap();
        graph.start(source, 0.0).unwrap();
        assert!(graph.render(2).iter().all(|&s| s == 1.0));

        graph.stop(source);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.render(2).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_late_start_begins_now() {
        let mut graph = SoftwareGraph::new(10);
        graph.render(10);
        let source = graph.create_source(ones(10, 3)).unwrap();
        graph.connect(source, Destination::Output).unwrap();
        graph.start(source, 0.0).unwrap();
        let out = graph.render(4);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sources_summed_in_creation_order() {
        let mut graph = SoftwareGraph::new(10);
        for level in [1.0, 1e-8, -1.0, 1e-8] {
            let asset = Arc::new(PcmAsset::new(10, vec![vec![level; 4]]).unwrap());
            let source = graph.create_source(asset).unwrap();
            graph.connect(source, Destination::Output).unwrap();
            graph.start(source, 0.0).unwrap();
        }

        // Creation order: ((1 + 1e-8) - 1) + 1e-8, which loses the first 1e-8
        let expected = ((1.0f32 + 1e-8) - 1.0) + 1e-8;
        let out = graph.render(4);
        assert!(out.iter().all(|&s| s.to_bits() == expected.to_bits()));
    }

    #[test]
    fn test_connect_rejects_source_target() {
        let mut graph = SoftwareGraph::new(10);
        let a = graph.create_source(ones(10, 1)).unwrap();
        let b = graph.create_source(ones(10, 1)).unwrap();
        assert!(graph.connect(a, Destination::Node(b)).is_err());
        assert!(graph.connect(a, Destination::Node(NodeId(99))).is_err());
    }

    #[test]
    fn test_shared_graph_delegates() {
        let mut shared = SharedGraph::new(SoftwareGraph::new(10));
        let gain = shared.create_gain(1.0).unwrap();
        shared.connect(gain, Destination::Output).unwrap();
        let mut out = vec![0.0; 4];
        shared.render_into(&mut out);
        assert!((shared.current_time() - 0.2).abs() < 1e-12);
    }
}

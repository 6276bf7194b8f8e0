//! Headless real-time pump
//!
//! Without an output device nothing pulls audio from the software graph, so
//! its clock would never move. The pump renders the graph at wall-clock pace
//! on a tokio task and can keep what it rendered for capture to a file.

use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use crate::live::software::SharedGraph;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Render tick
const TICK: Duration = Duration::from_millis(10);

/// Handle to a running pump
pub struct PumpHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Option<Vec<f32>>>,
    sample_rate: u32,
}

/// Start pumping `graph` in real time
///
/// # Arguments
/// - `graph`: Graph to render
/// - `capture`: Keep every rendered frame for [`PumpHandle::finish`]
pub fn spawn_pump(graph: SharedGraph, capture: bool) -> PumpHandle {
    let sample_rate = graph.sample_rate();
    let (shutdown, mut shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let origin = Instant::now();
        let mut rendered: u64 = 0;
        let mut captured = capture.then(Vec::new);
        let mut block = Vec::new();
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Headless output running at {}Hz", sample_rate);
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let due = (origin.elapsed().as_secs_f64() * sample_rate as f64) as u64;
                    let frames = due.saturating_sub(rendered) as usize;
                    if frames == 0 {
                        continue;
                    }
                    block.resize(frames * 2, 0.0);
                    graph.render_into(&mut block);
                    rendered += frames as u64;
                    if let Some(samples) = captured.as_mut() {
                        samples.extend_from_slice(&block);
                    }
                }
            }
        }
        debug!("Headless output stopped after {} frames", rendered);
        captured
    });

    PumpHandle {
        shutdown,
        task,
        sample_rate,
    }
}

impl PumpHandle {
    /// Stop the pump and return the captured program, if capturing
    pub async fn finish(self) -> Result<Option<PcmBuffer>> {
        // The task may already have ended; a closed channel is fine
        let _ = self.shutdown.send(());
        let captured = self
            .task
            .await
            .map_err(|e| Error::AudioOutput(format!("output task failed: {}", e)))?;
        Ok(captured.map(|samples| PcmBuffer::from_interleaved(self.sample_rate, samples)))
    }
}

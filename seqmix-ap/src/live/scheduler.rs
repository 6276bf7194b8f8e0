//! Live crossfade scheduler
//!
//! Session-versioned state machine that plays a template against an
//! [`AudioGraph`]:
//!
//! ```text
//! Idle → Loading → Ready → Playing ⇄ CrossfadePending → SurveyWait → Stopped
//! ```
//!
//! Each started segment gets a gain bus connected to the output with the
//! fade envelope scheduled as gain ramps, its foreground source, and its tiled
//! background loops behind a fixed-gain bus. Two continuations are armed per
//! segment: `SegmentEnd` at its natural end and, unless the segment is the
//! last or gated by the survey, `Crossfade` at `end - fade_out`.
//!
//! **Session invalidation:** every continuation records the session id it
//! was armed in. `play()`, `stop()`, `skip()` and the natural end of the
//! program bump the session, so anything armed earlier is dropped when it
//! fires. Crossfade and end continuations additionally re-check the segment
//! index they were armed for.
//!
//! The scheduler never sleeps. A driver calls [`LiveScheduler::run_due`] once
//! the graph clock reaches [`LiveScheduler::next_deadline`].

use crate::audio::types::PcmAsset;
use crate::error::{Error, Result};
use crate::live::diagnostics::DiagnosticLog;
use crate::live::graph::{AudioGraph, Destination, GainRamp, NodeId};
use crate::live::timers::{Deferred, DeferredKind, DeferredQueue};
use crate::mix::assets::{AssetFetcher, AssetStore};
use crate::mix::compositor::loop_count;
use crate::mix::envelope::Envelope;
use crate::mix::resolver::{resolve_sources, ResolvedSources};
use seqmix_common::events::{
    EventBus, PendingSurvey, SchedulerState, SchedulerStatus, SeqmixEvent, SurveyResponse,
};
use seqmix_common::time::now;
use seqmix_common::{SeqmixConfig, Template, UploadBinding, UploadSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output nodes of one started segment
#[derive(Debug)]
struct SegmentVoice {
    session: u64,
    index: usize,
    nodes: Vec<NodeId>,
}

/// Live playback controller for one template
pub struct LiveScheduler<G: AudioGraph> {
    template: Arc<Template>,
    uploads: UploadSet,
    sources: Option<ResolvedSources>,
    /// Set when a binding arrives while the resolved sources are in use
    sources_stale: bool,
    store: AssetStore,
    graph: G,
    background_gain: f32,
    missing_asset_delay: f64,
    state: SchedulerState,
    session: u64,
    current: Option<usize>,
    voices: Vec<SegmentVoice>,
    timers: DeferredQueue,
    pending_survey: Option<PendingSurvey>,
    log: DiagnosticLog,
    events: Arc<EventBus>,
}

impl<G: AudioGraph> LiveScheduler<G> {
    /// Create a scheduler in `Idle`
    pub fn new(
        template: Arc<Template>,
        graph: G,
        config: &SeqmixConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            template,
            uploads: UploadSet::new(),
            sources: None,
            sources_stale: false,
            store: AssetStore::new(),
            graph,
            background_gain: config.mix.background_gain,
            missing_asset_delay: config.missing_asset_delay_secs(),
            state: SchedulerState::Idle,
            session: 0,
            current: None,
            voices: Vec::new(),
            timers: DeferredQueue::new(),
            pending_survey: None,
            log: DiagnosticLog::new(config.live.log_capacity),
            events,
        }
    }

    /// Scheduler with default settings and its own event bus
    pub fn with_defaults(template: Arc<Template>, graph: G) -> Self {
        let config = SeqmixConfig::default();
        let events = Arc::new(EventBus::new(config.live.event_capacity));
        Self::new(template, graph, &config, events)
    }

    // ---- observation -------------------------------------------------------

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn pending_survey(&self) -> Option<&PendingSurvey> {
        self.pending_survey.as_ref()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn uploads(&self) -> &UploadSet {
        &self.uploads
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Diagnostic log lines, oldest first
    pub fn diagnostics(&self) -> Vec<String> {
        self.log.entries()
    }

    /// Snapshot for observers
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state,
            current_index: self.current,
            playing: self.state.is_active(),
            survey: self.pending_survey.clone(),
            session: self.session,
        }
    }

    /// Graph time of the earliest armed continuation
    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.next_due()
    }

    // ---- loading -----------------------------------------------------------

    /// Bind an upload for a placeholder key (last write wins)
    ///
    /// Any binding invalidates the resolved sources, so `play()` refuses
    /// until the next `load()` picks the new source up:
    /// - in `Idle`, `Ready` and `Stopped` the sources are dropped and the
    ///   scheduler returns to `Idle`
    /// - during `Loading` or an active session the running work keeps its
    ///   sources; the load in flight ends in `Idle`, and a session plays out
    ///   with what it started with
    pub fn bind_upload(&mut self, binding: UploadBinding) {
        self.log(&format!(
            "upload bound: {} -> {}",
            binding.placeholder_key, binding.file_url
        ));
        self.uploads.bind(binding);
        match self.state {
            SchedulerState::Idle | SchedulerState::Ready | SchedulerState::Stopped => {
                if self.sources.take().is_some() {
                    self.log("resolved sources dropped, load() again");
                }
                self.sources_stale = false;
                self.set_state(SchedulerState::Idle);
            }
            _ => {
                if self.sources.is_some() {
                    self.sources_stale = true;
                    self.log(&format!(
                        "binding takes effect at the next load() (state {})",
                        self.state
                    ));
                }
            }
        }
    }

    /// Insert an already decoded asset under its source URL
    pub fn insert_asset(&mut self, url: impl Into<String>, asset: impl Into<Arc<PcmAsset>>) {
        self.store.insert(url, asset);
    }

    /// Resolve sources and enter `Loading`
    ///
    /// # Returns
    /// Source URLs that still need decoding
    ///
    /// # Errors
    /// - `InvalidState` while a session is active
    /// - `MissingUpload` when a placeholder has no binding; the scheduler
    ///   returns to `Idle` and nothing is fetched
    pub fn begin_load(&mut self) -> Result<Vec<String>> {
        if self.state.is_active() || self.state == SchedulerState::Loading {
            return Err(Error::InvalidState(format!(
                "load() is not allowed while {}",
                self.state
            )));
        }

        self.log("load: resolving sources");
        let sources = match resolve_sources(&self.template, &self.uploads) {
            Ok(sources) => sources,
            Err(e) => {
                self.log(&format!("load failed: {}", e));
                self.sources = None;
                self.set_state(SchedulerState::Idle);
                return Err(e);
            }
        };

        let urls = sources.distinct_urls();
        let pending: Vec<String> = self
            .store
            .missing(&urls)
            .into_iter()
            .map(str::to_string)
            .collect();
        self.sources = Some(sources);
        self.sources_stale = false;
        self.set_state(SchedulerState::Loading);
        self.log(&format!(
            "load: {} sources, {} to decode",
            urls.len(),
            pending.len()
        ));
        Ok(pending)
    }

    /// Record load results and enter `Ready`
    ///
    /// Failed sources are logged; their segments are skipped at play time.
    pub fn finish_load(&mut self, results: Vec<(String, Result<PcmAsset>)>) {
        for (url, result) in results {
            match result {
                Ok(asset) => {
                    self.log(&format!(
                        "decoded {} ({:.3}s)",
                        url,
                        asset.duration_secs()
                    ));
                    self.store.insert(url, asset);
                }
                Err(e) => {
                    warn!("Live load of {} failed: {}", url, e);
                    self.log(&format!("failed to load {}: {}", url, e));
                }
            }
        }
        if self.sources_stale {
            self.sources = None;
            self.sources_stale = false;
            self.log("load: uploads changed while loading, load() again");
            self.set_state(SchedulerState::Idle);
            return;
        }
        self.set_state(SchedulerState::Ready);
    }

    /// Resolve, fetch and decode every source of the template
    ///
    /// Idempotent: already decoded sources are reused. Individual fetch or
    /// decode failures do not fail the load.
    pub async fn load(&mut self, fetcher: &AssetFetcher) -> Result<()> {
        let pending = self.begin_load()?;
        let refs: Vec<&str> = pending.iter().map(String::as_str).collect();
        let results = fetcher.fetch_all(&refs).await;
        self.finish_load(results);
        Ok(())
    }

    // ---- transport ---------------------------------------------------------

    /// Start a new session from segment 0
    ///
    /// Any previous session is fully torn down first.
    pub fn play(&mut self) -> Result<()> {
        if self.sources.is_none() || self.state == SchedulerState::Loading {
            return Err(Error::InvalidState(format!(
                "play() requires a completed load (state {})",
                self.state
            )));
        }
        if self.sources_stale {
            self.log("play refused: uploads changed since the last load");
            return Err(Error::InvalidState(
                "uploads changed since the last load; load() again".to_string(),
            ));
        }

        self.teardown();
        self.session += 1;
        self.pending_survey = None;
        self.log(&format!("play: session {}", self.session));
        self.set_state(SchedulerState::Playing);
        self.start_segment(0, false);
        Ok(())
    }

    /// Halt every sounding node and end the session
    ///
    /// A no-op in `Idle` and `Stopped`, so calling it twice equals calling it
    /// once.
    pub fn stop(&mut self) -> Result<()> {
        if matches!(self.state, SchedulerState::Idle | SchedulerState::Stopped) {
            self.log("stop: no active session");
            return Ok(());
        }
        self.teardown();
        self.session += 1;
        self.current = None;
        self.pending_survey = None;
        self.log(&format!("stop: session invalidated (now {})", self.session));
        self.set_state(SchedulerState::Stopped);
        Ok(())
    }

    /// Cut to the next segment immediately, without a crossfade
    ///
    /// Skipping the survey-gated segment lands on the survey instead of
    /// bypassing it.
    ///
    /// # Errors
    /// `InvalidState` outside `Playing` / `CrossfadePending`, or on the last
    /// segment when no survey follows it.
    pub fn skip(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            SchedulerState::Playing | SchedulerState::CrossfadePending
        ) {
            return Err(Error::InvalidState(format!(
                "skip() is not allowed while {}",
                self.state
            )));
        }
        let index = self
            .current
            .ok_or_else(|| Error::InvalidState("no current segment".to_string()))?;
        let gated = self.template.survey_after(index).is_some();
        if !gated && index + 1 >= self.template.segments.len() {
            return Err(Error::InvalidState(
                "skip() on the last segment".to_string(),
            ));
        }

        self.teardown();
        self.session += 1;
        self.log(&format!("skip: leaving segment {} (session {})", index, self.session));

        if gated {
            self.enter_survey_wait(index);
        } else {
            self.start_segment(index + 1, false);
        }
        Ok(())
    }

    /// Answer the pending survey and continue after it
    ///
    /// The response is published as a `SurveyAnswered` event and returned;
    /// the scheduler keeps no copy.
    pub fn answer_survey(&mut self, answer: &str) -> Result<SurveyResponse> {
        if self.state != SchedulerState::SurveyWait {
            return Err(Error::InvalidState(format!(
                "answer_survey() is not allowed while {}",
                self.state
            )));
        }
        let survey = self
            .pending_survey
            .take()
            .ok_or_else(|| Error::InvalidState("no survey is pending".to_string()))?;

        if !survey.options.iter().any(|o| o == answer) {
            warn!("Survey answer '{}' is not one of {:?}", answer, survey.options);
            self.log(&format!("survey answer '{}' is not a listed option", answer));
        }

        let response = SurveyResponse {
            question: survey.question,
            answer: answer.to_string(),
            timestamp: now(),
        };
        self.log(&format!("survey answered: {}", response.answer));
        self.events.emit_lossy(SeqmixEvent::SurveyAnswered {
            response: response.clone(),
        });

        let next = survey.after_index + 1;
        if next < self.template.segments.len() {
            self.set_state(SchedulerState::Playing);
            self.start_segment(next, false);
        } else {
            self.finish_program();
        }
        Ok(response)
    }

    /// Fire every continuation due on the graph clock
    ///
    /// # Returns
    /// Number of continuations popped (including discarded stale ones)
    pub fn run_due(&mut self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.graph.current_time();
            let Some(deferred) = self.timers.pop_due(now) else {
                break;
            };
            fired += 1;
            self.fire(deferred);
        }
        fired
    }

    /// Tear down all output and release the graph
    pub fn into_graph(mut self) -> G {
        self.teardown();
        self.graph
    }

    // ---- internals ---------------------------------------------------------

    fn fire(&mut self, deferred: Deferred) {
        if deferred.session != self.session {
            debug!(
                "Dropping {:?} for segment {} from stale session {} (current {})",
                deferred.kind, deferred.index, deferred.session, self.session
            );
            return;
        }

        match deferred.kind {
            DeferredKind::Crossfade => {
                if self.current != Some(deferred.index) {
                    return;
                }
                self.log(&format!(
                    "crossfade: segment {} -> {}",
                    deferred.index,
                    deferred.index + 1
                ));
                self.start_segment(deferred.index + 1, true);
            }
            DeferredKind::SegmentEnd => {
                self.release_voice(deferred.session, deferred.index);
                self.events.emit_lossy(SeqmixEvent::SegmentFinished {
                    index: deferred.index,
                    session: deferred.session,
                    timestamp: now(),
                });
                if self.current == Some(deferred.index) {
                    self.log(&format!("segment {} ended", deferred.index));
                    self.advance_after(deferred.index);
                }
            }
            DeferredKind::SkipMissing => {
                if self.current == Some(deferred.index) {
                    self.log(&format!("skipping unplayable segment {}", deferred.index));
                    self.advance_after(deferred.index);
                }
            }
        }
    }

    /// Move on once segment `index` is over
    fn advance_after(&mut self, index: usize) {
        if self.template.survey_after(index).is_some() {
            self.enter_survey_wait(index);
        } else if index + 1 < self.template.segments.len() {
            self.start_segment(index + 1, false);
        } else {
            self.finish_program();
        }
    }

    fn enter_survey_wait(&mut self, index: usize) {
        let Some(survey) = self.template.survey_after(index) else {
            return;
        };
        let pending = PendingSurvey {
            after_index: index,
            question: survey.question.clone(),
            options: survey.options.clone(),
        };
        self.log(&format!("survey pending after segment {}: {}", index, pending.question));
        self.events.emit_lossy(SeqmixEvent::SurveyPending {
            after_index: index,
            question: pending.question.clone(),
            options: pending.options.clone(),
            timestamp: now(),
        });
        self.pending_survey = Some(pending);
        self.set_state(SchedulerState::SurveyWait);
    }

    fn finish_program(&mut self) {
        self.teardown();
        self.session += 1;
        self.current = None;
        self.log("program finished");
        self.set_state(SchedulerState::Stopped);
    }

    /// Start segment `index` now
    ///
    /// Failures (missing asset, graph error) arm a `SkipMissing` after the
    /// configured delay instead of ending the session.
    fn start_segment(&mut self, index: usize, crossfade: bool) {
        let started_at = self.graph.current_time();
        let template = Arc::clone(&self.template);
        let segment = &template.segments[index];
        self.current = Some(index);

        let mut nodes = Vec::new();
        let built = self.build_voice(index, started_at, &mut nodes);
        let envelope = match built {
            Ok(envelope) => envelope,
            Err(e) => {
                for node in nodes {
                    self.graph.stop(node);
                }
                warn!("Segment {} ('{}') cannot play: {}", index, segment.label, e);
                self.log(&format!(
                    "segment {} ('{}') cannot play: {}; advancing in {:.3}s",
                    index, segment.label, e, self.missing_asset_delay
                ));
                self.timers.arm(
                    started_at + self.missing_asset_delay,
                    self.session,
                    index,
                    DeferredKind::SkipMissing,
                );
                self.set_state(SchedulerState::Playing);
                return;
            }
        };

        self.voices.push(SegmentVoice {
            session: self.session,
            index,
            nodes,
        });

        let end = envelope.end();
        self.timers
            .arm(end, self.session, index, DeferredKind::SegmentEnd);

        let gated = template.survey_after(index).is_some();
        let last = index + 1 >= template.segments.len();
        let crossfade_at = envelope.fade_out_start();
        if !gated && !last && envelope.fade_out > 0.0 && crossfade_at > started_at {
            self.timers
                .arm(crossfade_at, self.session, index, DeferredKind::Crossfade);
            self.set_state(SchedulerState::CrossfadePending);
        } else {
            self.set_state(SchedulerState::Playing);
        }

        info!(
            "Segment {} ('{}') started at {:.3}s, ends {:.3}s{}",
            index,
            segment.label,
            started_at,
            end,
            if crossfade { " (crossfade)" } else { "" }
        );
        self.log(&format!(
            "segment {} '{}' started{}",
            index,
            segment.label,
            if crossfade { " with crossfade" } else { "" }
        ));
        self.events.emit_lossy(SeqmixEvent::SegmentStarted {
            index,
            label: segment.label.clone(),
            crossfade,
            session: self.session,
            timestamp: now(),
        });
    }

    /// Create the output path of segment `index`, pushing every created node
    /// into `nodes` so a failure part way through can be undone
    fn build_voice(
        &mut self,
        index: usize,
        start: f64,
        nodes: &mut Vec<NodeId>,
    ) -> Result<Envelope> {
        let sources = self
            .sources
            .as_ref()
            .and_then(|s| s.segment(index))
            .ok_or_else(|| Error::AssetResolution(format!("segment {} is not resolved", index)))?;
        let foreground_url = sources.foreground.url.clone();
        let background_url = sources.background.as_ref().map(|b| b.url.clone());

        let asset = self.store.get(&foreground_url).cloned().ok_or_else(|| {
            Error::AssetResolution(format!("no decoded audio for {}", foreground_url))
        })?;

        let envelope = Envelope::new(
            start,
            asset.duration_secs(),
            self.template.fade_in,
            self.template.fade_out,
        );

        let bus = self.graph.create_gain(0.0)?;
        nodes.push(bus);
        self.graph.connect(bus, Destination::Output)?;
        self.graph.schedule_gain(bus, GainRamp::Step, 0.0, envelope.start)?;
        self.graph
            .schedule_gain(bus, GainRamp::Linear, 1.0, envelope.fade_in_end())?;
        self.graph
            .schedule_gain(bus, GainRamp::Step, 1.0, envelope.fade_out_start())?;
        self.graph
            .schedule_gain(bus, GainRamp::Linear, 0.0, envelope.end())?;

        let source = self.graph.create_source(asset)?;
        nodes.push(source);
        self.graph.connect(source, Destination::Node(bus))?;
        self.graph.start(source, start)?;

        let Some(url) = background_url else {
            return Ok(envelope);
        };
        let Some(background) = self.store.get(&url).cloned() else {
            self.log(&format!(
                "background {} for segment {} is not decoded, playing without it",
                url, index
            ));
            return Ok(envelope);
        };

        let bg_duration = background.duration_secs();
        let loops = loop_count(envelope.duration, bg_duration);
        if loops == 0 {
            return Ok(envelope);
        }

        let bg_bus = self.graph.create_gain(self.background_gain)?;
        nodes.push(bg_bus);
        self.graph.connect(bg_bus, Destination::Node(bus))?;
        for i in 0..loops {
            let looped = self.graph.create_source(Arc::clone(&background))?;
            nodes.push(looped);
            self.graph.connect(looped, Destination::Node(bg_bus))?;
            self.graph.start(looped, start + i as f64 * bg_duration)?;
        }
        debug!("Segment {} background: {} loops of {:.3}s", index, loops, bg_duration);

        Ok(envelope)
    }

    fn release_voice(&mut self, session: u64, index: usize) {
        let mut kept = Vec::with_capacity(self.voices.len());
        for voice in self.voices.drain(..) {
            if voice.session == session && voice.index == index {
                for node in voice.nodes {
                    self.graph.stop(node);
                }
            } else {
                kept.push(voice);
            }
        }
        self.voices = kept;
    }

    /// Stop every node of every voice
    fn teardown(&mut self) {
        for voice in self.voices.drain(..) {
            for node in voice.nodes {
                self.graph.stop(node);
            }
        }
    }

    fn set_state(&mut self, new_state: SchedulerState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        debug!("Scheduler state {} -> {}", old_state, new_state);
        self.events.emit_lossy(SeqmixEvent::StateChanged {
            old_state,
            new_state,
            timestamp: now(),
        });
    }

    fn log(&mut self, message: &str) {
        let line = self.log.push(message);
        debug!("{}", line);
        self.events.emit_lossy(SeqmixEvent::Log { line });
    }
}

//! Live scheduler type definitions
//!
//! Supporting types for scheduler state and survey exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live scheduler state
///
/// `Idle` and `Stopped` are externally equivalent: no session is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SchedulerState {
    /// Nothing loaded yet
    Idle,
    /// Decoding sources
    Loading,
    /// Every referenced source has been attempted
    Ready,
    /// A segment is sounding, no crossfade armed
    Playing,
    /// A segment is sounding and the next one is armed to start early
    CrossfadePending,
    /// Paused at the survey gate, waiting for an answer
    SurveyWait,
    /// Session ended or was stopped
    Stopped,
}

impl SchedulerState {
    /// Whether a session is producing (or about to produce) audio
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SchedulerState::Playing | SchedulerState::CrossfadePending | SchedulerState::SurveyWait
        )
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "Idle"),
            SchedulerState::Loading => write!(f, "Loading"),
            SchedulerState::Ready => write!(f, "Ready"),
            SchedulerState::Playing => write!(f, "Playing"),
            SchedulerState::CrossfadePending => write!(f, "CrossfadePending"),
            SchedulerState::SurveyWait => write!(f, "SurveyWait"),
            SchedulerState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Survey waiting for an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSurvey {
    /// Segment index the survey follows
    pub after_index: usize,
    pub question: String,
    pub options: Vec<String>,
}

/// Listener answer to a survey
///
/// Handed to consumers through events; the scheduler keeps no copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Observable scheduler snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Segment currently sounding (or awaiting its source)
    pub current_index: Option<usize>,
    /// True while a session is active, including the survey pause
    pub playing: bool,
    /// Question and options while paused at the survey gate
    pub survey: Option<PendingSurvey>,
    /// Current session id
    pub session: u64,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            current_index: None,
            playing: false,
            survey: None,
            session: 0,
        }
    }
}

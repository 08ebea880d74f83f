//! Progress reporting for onboarding runs.
//!
//! The orchestrator reports through [`OnboardingProgressReporter`];
//! [`ProgressPublisher`] is the implementation that fans events out to any
//! number of per-job subscribers (the SSE endpoint).

use std::collections::VecDeque;

use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use elly_core::onboarding::OnboardingPhase;
use elly_core::payments::PaymentView;

/// Buffered events per live receiver before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Payload of a `progress` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub phase: OnboardingPhase,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Payload of a `done` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    pub obligations_detected: usize,
    pub payments: Vec<PaymentView>,
}

/// Payload of a `failed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPayload {
    pub error: String,
}

/// Event published for an onboarding job.
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardingEvent {
    Progress(ProgressPayload),
    Done(DonePayload),
    Failed(FailedPayload),
}

impl OnboardingEvent {
    pub fn progress(phase: OnboardingPhase, progress: u8, detail: Option<Value>) -> Self {
        OnboardingEvent::Progress(ProgressPayload {
            phase,
            progress,
            detail,
        })
    }

    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            OnboardingEvent::Progress(_) => "progress",
            OnboardingEvent::Done(_) => "done",
            OnboardingEvent::Failed(_) => "failed",
        }
    }

    /// `done` and `failed` end the job's stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OnboardingEvent::Progress(_))
    }

    /// JSON body on the wire.
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            OnboardingEvent::Progress(p) => serde_json::to_string(p),
            OnboardingEvent::Done(p) => serde_json::to_string(p),
            OnboardingEvent::Failed(p) => serde_json::to_string(p),
        }
    }
}

/// Trait for reporting onboarding progress.
///
/// Implementations can emit events to different backends (SSE, logs, tests).
pub trait OnboardingProgressReporter: Send + Sync {
    /// A job was created and will start publishing.
    fn report_started(&self, job_id: &str);

    /// Publish one event for a job.
    fn report_event(&self, job_id: &str, event: OnboardingEvent);

    /// The job will publish nothing further.
    fn report_finished(&self, job_id: &str);
}

/// A no-op progress reporter for contexts where progress reporting is not needed.
#[derive(Debug, Clone, Default)]
pub struct NoOpProgressReporter;

impl OnboardingProgressReporter for NoOpProgressReporter {
    fn report_started(&self, _job_id: &str) {
        // No-op
    }

    fn report_event(&self, _job_id: &str, _event: OnboardingEvent) {
        // No-op
    }

    fn report_finished(&self, _job_id: &str) {
        // No-op
    }
}

/// What a new subscriber gets: the job's recent history, then live events.
#[derive(Debug)]
pub struct JobSubscription {
    pub replay: Vec<OnboardingEvent>,
    pub receiver: broadcast::Receiver<OnboardingEvent>,
}

struct JobChannel {
    sender: broadcast::Sender<OnboardingEvent>,
    replay: VecDeque<OnboardingEvent>,
}

/// Per-job multicast of onboarding events.
///
/// Publishing and subscribing hold the job's map entry exclusively, so a
/// subscriber sees every event exactly once: either in its replay snapshot
/// or through its receiver.
pub struct ProgressPublisher {
    jobs: DashMap<String, JobChannel>,
    replay_capacity: usize,
}

impl ProgressPublisher {
    pub fn new(replay_capacity: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            replay_capacity,
        }
    }

    /// Opens a stream for `job_id`. Registering twice keeps the existing stream.
    pub fn register(&self, job_id: &str) {
        self.jobs.entry(job_id.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
            JobChannel {
                sender,
                replay: VecDeque::new(),
            }
        });
    }

    /// Publishes to the job's subscribers. Unknown jobs are ignored.
    pub fn publish(&self, job_id: &str, event: OnboardingEvent) {
        let Some(mut channel) = self.jobs.get_mut(job_id) else {
            debug!("Progress[drop]: job={} event={} (no stream)", job_id, event.name());
            return;
        };
        if self.replay_capacity > 0 {
            if channel.replay.len() == self.replay_capacity {
                channel.replay.pop_front();
            }
            channel.replay.push_back(event.clone());
        }
        // Err only means nobody is listening right now.
        let _ = channel.sender.send(event);
    }

    /// Subscribes to a live job. `None` for unknown or completed jobs.
    pub fn subscribe(&self, job_id: &str) -> Option<JobSubscription> {
        let channel = self.jobs.get_mut(job_id)?;
        Some(JobSubscription {
            replay: channel.replay.iter().cloned().collect(),
            receiver: channel.sender.subscribe(),
        })
    }

    /// Closes the job's stream. Receivers drain what was sent, then end.
    pub fn complete(&self, job_id: &str) {
        if self.jobs.remove(job_id).is_some() {
            debug!("Progress[complete]: job={}", job_id);
        }
    }

    pub fn is_live(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }
}

impl OnboardingProgressReporter for ProgressPublisher {
    fn report_started(&self, job_id: &str) {
        self.register(job_id);
    }

    fn report_event(&self, job_id: &str, event: OnboardingEvent) {
        self.publish(job_id, event);
    }

    fn report_finished(&self, job_id: &str) {
        self.complete(job_id);
    }
}

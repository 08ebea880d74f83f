use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
    Json, Router,
};
use elly_connect::{JobSubscription, OnboardingEvent};
use elly_core::banking::BankCode;
use elly_core::onboarding::OnboardingJob;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::time::{interval_at, Instant, Interval};

use super::shared::current_user_id;
use crate::{error::ApiResult, main_lib::AppState};

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    banks: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    job_id: String,
    status: String,
}

async fn start_onboarding(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<StartRequest>>,
) -> ApiResult<(StatusCode, Json<StartResponse>)> {
    let user_id = current_user_id(&headers)?;
    let requested = body.and_then(|Json(req)| req.banks).unwrap_or_default();
    let banks: Vec<BankCode> = if requested.is_empty() {
        state.default_banks.clone()
    } else {
        requested.iter().map(BankCode::new).collect()
    };

    let job = state.onboarding.start(user_id, banks).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            job_id: job.job_id,
            status: job.phase.to_string(),
        }),
    ))
}

async fn get_onboarding_status(
    Path(job_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<OnboardingJob>> {
    let job = state.onboarding.status(&job_id).await?;
    Ok(Json(job))
}

/// Source of an SSE response: history first, then live events with heartbeats.
struct EventFeed {
    replay: std::vec::IntoIter<OnboardingEvent>,
    receiver: Option<Receiver<OnboardingEvent>>,
    heartbeat: Interval,
    finished: bool,
    job_id: String,
}

enum FeedStep {
    Heartbeat,
    Received(Result<OnboardingEvent, RecvError>),
}

/// One frame of the feed before it is encoded for the wire.
#[derive(Debug, PartialEq)]
enum FeedItem {
    Heartbeat,
    Event(OnboardingEvent),
}

impl FeedItem {
    fn into_sse(self) -> SseEvent {
        match self {
            FeedItem::Heartbeat => SseEvent::default().event("heartbeat").data("💓"),
            FeedItem::Event(event) => {
                let data = event.payload_json().unwrap_or_else(|err| {
                    tracing::error!(
                        "Failed to serialize SSE payload for {}: {}",
                        event.name(),
                        err
                    );
                    "null".to_string()
                });
                SseEvent::default().event(event.name()).data(data)
            }
        }
    }
}

impl EventFeed {
    fn new(job_id: String, subscription: Option<JobSubscription>, period: Duration) -> Self {
        let (replay, receiver) = match subscription {
            Some(sub) => (sub.replay, Some(sub.receiver)),
            None => (Vec::new(), None),
        };
        Self {
            replay: replay.into_iter(),
            receiver,
            heartbeat: interval_at(Instant::now() + period, period),
            finished: false,
            job_id,
        }
    }

    async fn next_event(&mut self) -> Option<FeedItem> {
        if self.finished {
            return None;
        }
        if let Some(event) = self.replay.next() {
            return Some(self.emit(event));
        }
        loop {
            let step = {
                let receiver = self.receiver.as_mut()?;
                tokio::select! {
                    _ = self.heartbeat.tick() => FeedStep::Heartbeat,
                    received = receiver.recv() => FeedStep::Received(received),
                }
            };
            match step {
                FeedStep::Heartbeat => return Some(FeedItem::Heartbeat),
                FeedStep::Received(Ok(event)) => return Some(self.emit(event)),
                FeedStep::Received(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(
                        "SSE subscriber for job {} lagged, skipped {} events",
                        self.job_id,
                        skipped
                    );
                }
                FeedStep::Received(Err(RecvError::Closed)) => return None,
            }
        }
    }

    fn emit(&mut self, event: OnboardingEvent) -> FeedItem {
        self.finished = event.is_terminal();
        FeedItem::Event(event)
    }
}

async fn stream_onboarding_events(
    Path(job_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.progress.subscribe(&job_id);
    if subscription.is_none() {
        tracing::debug!("No live stream for job {}", job_id);
    }
    let feed = EventFeed::new(job_id, subscription, state.heartbeat);
    let stream = stream::unfold(feed, |mut feed| async move {
        let item = feed.next_event().await?;
        Some((Ok(item.into_sse()), feed))
    });
    Sse::new(stream)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/onboarding/start", post(start_onboarding))
        .route("/onboarding/{job_id}", get(get_onboarding_status))
        .route("/onboarding/{job_id}/events", get(stream_onboarding_events))
}

//! Onboarding job models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::banking::{BankCode, UserId};
use crate::consents::ConsentState;
use crate::errors::{DomainError, Result};

/// Progress value of a finished job.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Phase of the aggregation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingPhase {
    ConsentsInProgress,
    TransactionsCollecting,
    Done,
    Failed,
}

impl OnboardingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OnboardingPhase::Done | OnboardingPhase::Failed)
    }

    /// Phases only move forward. Staying in a non-terminal phase is allowed.
    pub fn can_transition_to(&self, next: OnboardingPhase) -> bool {
        use OnboardingPhase::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (ConsentsInProgress, ConsentsInProgress | TransactionsCollecting) => true,
            (TransactionsCollecting, TransactionsCollecting | Done) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingPhase::ConsentsInProgress => "CONSENTS_IN_PROGRESS",
            OnboardingPhase::TransactionsCollecting => "TRANSACTIONS_COLLECTING",
            OnboardingPhase::Done => "DONE",
            OnboardingPhase::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OnboardingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one onboarding run. The persisted snapshot is the source of
/// truth for the run's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingJob {
    pub job_id: String,
    pub user_id: UserId,
    pub phase: OnboardingPhase,
    /// 0..=100, never decreasing.
    pub progress: u8,
    pub per_bank_consent: BTreeMap<BankCode, ConsentState>,
    pub obligations_detected: Option<usize>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OnboardingJob {
    /// New job in `CONSENTS_IN_PROGRESS`.
    pub fn new(
        job_id: impl Into<String>,
        user_id: UserId,
        progress: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            user_id,
            phase: OnboardingPhase::ConsentsInProgress,
            progress: progress.min(PROGRESS_COMPLETE),
            per_bank_consent: BTreeMap::new(),
            obligations_detected: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `phase` at `progress`, rejecting backwards moves.
    pub fn advance(
        &mut self,
        phase: OnboardingPhase,
        progress: u8,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.phase.can_transition_to(phase) {
            return Err(DomainError::InvalidTransition(format!(
                "{} -> {} for job {}",
                self.phase, phase, self.job_id
            ))
            .into());
        }
        if progress < self.progress {
            return Err(DomainError::InvalidTransition(format!(
                "progress {} -> {} for job {}",
                self.progress, progress, self.job_id
            ))
            .into());
        }
        self.phase = phase;
        self.progress = progress.min(PROGRESS_COMPLETE);
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, obligations_detected: usize, now: DateTime<Utc>) -> Result<()> {
        self.advance(OnboardingPhase::Done, PROGRESS_COMPLETE, now)?;
        self.obligations_detected = Some(obligations_detected);
        Ok(())
    }

    /// Marks the job failed. Failing an already finished job is a no-op.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = OnboardingPhase::Failed;
        self.progress = PROGRESS_COMPLETE;
        self.error = Some(error.into());
        self.updated_at = now;
    }
}

//! Approve/reject state machine for pending applicants.
//!
//! A pending applicant reaches exactly one terminal state. Both transitions are committed through
//! [`TransitionStore::commit`], which re-checks the applicant inside the commit; whichever caller
//! commits first wins and every later caller sees `NotFound`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::domain::{ApplicantId, AuditEntry, PartnerId, ReviewDecision, ValidatedPartner};
use super::notifications::{approval_notice, rejection_notice, Notifier};
use super::repository::{CommitOutcome, RepositoryError, Transition, TransitionStore};
use crate::config::PipelineConfig;

/// Error raised by the approval pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("applicant {0} not found")]
    NotFound(ApplicantId),
    #[error("transition for {applicant_id} failed after {attempts} attempt(s): {source}")]
    TransactionFailure {
        applicant_id: ApplicantId,
        attempts: u32,
        #[source]
        source: RepositoryError,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Successful promotion of an applicant.
#[derive(Debug, Clone)]
pub struct Approval {
    pub applicant_id: ApplicantId,
    pub partner: ValidatedPartner,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Rejection {
    pub applicant_id: ApplicantId,
    pub attempts: u32,
}

pub struct ApprovalPipeline<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    config: PipelineConfig,
}

impl<S, N> ApprovalPipeline<S, N>
where
    S: TransitionStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: PipelineConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Pending -> Approved: mint a partner from the applicant's fields and drop the applicant,
    /// in one commit.
    pub fn approve(&self, applicant_id: &ApplicantId) -> Result<Approval, PipelineError> {
        let applicant = self
            .store
            .fetch_applicant(applicant_id)?
            .ok_or(PipelineError::NotFound(*applicant_id))?;

        let approved_at = Utc::now();
        let partner = ValidatedPartner::promote(&applicant, approved_at);
        let transition = Transition::Promote {
            applicant_id: applicant.id,
            partner: partner.clone(),
            audit: AuditEntry {
                applicant_id: applicant.id,
                work_email: applicant.details.work_email.clone(),
                decision: ReviewDecision::Approved,
                partner_id: Some(partner.id),
                recorded_at: approved_at,
            },
        };

        let attempts = self.commit_with_retry(&transition)?;
        info!(
            applicant_id = %applicant.id,
            partner_id = %partner.id,
            decision = ReviewDecision::Approved.label(),
            attempts,
            "review committed"
        );
        self.notifier.dispatch(approval_notice(&partner));

        Ok(Approval {
            applicant_id: applicant.id,
            partner,
            attempts,
        })
    }

    /// Pending -> Rejected: drop the applicant. No copy is archived.
    pub fn reject(&self, applicant_id: &ApplicantId) -> Result<Rejection, PipelineError> {
        let applicant = self
            .store
            .fetch_applicant(applicant_id)?
            .ok_or(PipelineError::NotFound(*applicant_id))?;

        let transition = Transition::Discard {
            applicant_id: applicant.id,
            audit: AuditEntry {
                applicant_id: applicant.id,
                work_email: applicant.details.work_email.clone(),
                decision: ReviewDecision::Rejected,
                partner_id: None,
                recorded_at: Utc::now(),
            },
        };

        let attempts = self.commit_with_retry(&transition)?;
        info!(
            applicant_id = %applicant.id,
            decision = ReviewDecision::Rejected.label(),
            attempts,
            "review committed"
        );
        self.notifier.dispatch(rejection_notice(&applicant));

        Ok(Rejection {
            applicant_id: applicant.id,
            attempts,
        })
    }

    /// Committed review decisions in commit order.
    pub fn history(&self) -> Result<Vec<AuditEntry>, PipelineError> {
        Ok(self.store.audit_entries()?)
    }

    /// Validated partners, oldest approval first.
    pub fn partners(&self) -> Result<Vec<ValidatedPartner>, PipelineError> {
        Ok(self.store.partners()?)
    }

    /// Retries transient commit failures up to the configured budget. The same transition
    /// (same partner id) is replayed on every attempt, so a commit that landed but reported a
    /// failure is recognized instead of being reported as `NotFound`.
    fn commit_with_retry(&self, transition: &Transition) -> Result<u32, PipelineError> {
        let applicant_id = *transition.applicant_id();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.store.commit(transition.clone()) {
                Ok(CommitOutcome::Committed) => return Ok(attempt),
                Ok(CommitOutcome::ApplicantMissing) => {
                    if attempt > 1 && self.already_applied(transition)? {
                        return Ok(attempt);
                    }
                    return Err(PipelineError::NotFound(applicant_id));
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        %applicant_id,
                        attempt,
                        error = %err,
                        "transition commit failed, retrying"
                    );
                }
                Err(err) if err.is_transient() => {
                    error!(
                        %applicant_id,
                        attempts = attempt,
                        error = %err,
                        "transition commit abandoned"
                    );
                    return Err(PipelineError::TransactionFailure {
                        applicant_id,
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => return Err(PipelineError::Repository(err)),
            }
        }
    }

    fn already_applied(&self, transition: &Transition) -> Result<bool, PipelineError> {
        match transition {
            Transition::Promote { partner, .. } => Ok(self.partner_exists(&partner.id)?),
            // `recorded_at` is fixed per call, so only our own entry matches.
            Transition::Discard { audit, .. } => Ok(self
                .store
                .audit_entries()?
                .iter()
                .any(|entry| entry == audit)),
        }
    }

    fn partner_exists(&self, partner_id: &PartnerId) -> Result<bool, RepositoryError> {
        Ok(self.store.fetch_partner(partner_id)?.is_some())
    }
}

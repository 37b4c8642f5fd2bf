use std::sync::Arc;

use super::bids::{BidError, BidRegistry};
use super::companies::{CompanyDirectory, CompanyError};
use super::credentials::{CredentialError, CredentialService};
use super::intake::{ApplicantIntake, IntakeError};
use super::notifications::Notifier;
use super::pipeline::{ApprovalPipeline, PipelineError};
use super::repository::{BidStore, CompanyStore, RepositoryError, TransitionStore};
use super::stats::StatsAggregator;
use crate::config::{AppConfig, AuthConfig, PipelineConfig};
use crate::error::{ErrorEnvelope, ErrorKind};

/// Everything the marketplace needs from a storage backend.
pub trait MarketplaceStore: TransitionStore + CompanyStore + BidStore {}

impl<T> MarketplaceStore for T where T: TransitionStore + CompanyStore + BidStore {}

/// Knobs shared by the marketplace services.
#[derive(Debug, Clone)]
pub struct MarketplaceSettings {
    pub pipeline: PipelineConfig,
    pub auth: AuthConfig,
    pub operator_email: String,
    pub expose_error_detail: bool,
}

impl MarketplaceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pipeline: config.pipeline,
            auth: config.auth.clone(),
            operator_email: config.notifications.operator_email.clone(),
            expose_error_detail: config.environment.exposes_error_detail(),
        }
    }
}

/// Facade wiring every marketplace service to one storage handle and one notifier.
pub struct Marketplace<S, N> {
    pub intake: ApplicantIntake<S, N>,
    pub pipeline: ApprovalPipeline<S, N>,
    pub stats: StatsAggregator<S>,
    pub bids: BidRegistry<S>,
    pub companies: CompanyDirectory<S>,
    pub credentials: CredentialService<S>,
    expose_error_detail: bool,
}

impl<S, N> Marketplace<S, N>
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, settings: MarketplaceSettings) -> Self {
        let MarketplaceSettings {
            pipeline,
            auth,
            operator_email,
            expose_error_detail,
        } = settings;

        Self {
            intake: ApplicantIntake::new(store.clone(), notifier.clone(), operator_email),
            pipeline: ApprovalPipeline::new(store.clone(), notifier, pipeline),
            stats: StatsAggregator::new(store.clone()),
            bids: BidRegistry::new(store.clone()),
            companies: CompanyDirectory::new(store.clone()),
            credentials: CredentialService::new(store, auth),
            expose_error_detail,
        }
    }

    /// Map a service failure to the response envelope, honoring the detail policy.
    pub fn envelope(&self, error: impl Into<MarketplaceError>) -> ErrorEnvelope {
        error.into().envelope().redact(self.expose_error_detail)
    }
}

/// Union of the service errors, used to build response envelopes.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Bid(#[from] BidError),
    #[error(transparent)]
    Company(#[from] CompanyError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("blocking task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

fn internal(detail: &dyn std::fmt::Display) -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorKind::Internal, "internal error").with_detail(detail.to_string())
}

fn repository(err: &RepositoryError) -> ErrorEnvelope {
    match err {
        RepositoryError::NotFound => ErrorEnvelope::new(ErrorKind::NotFound, "record not found"),
        RepositoryError::Conflict(detail) => ErrorEnvelope::new(ErrorKind::Conflict, detail),
        RepositoryError::Unavailable(_) => internal(err),
    }
}

impl MarketplaceError {
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            MarketplaceError::Intake(err) => match err {
                IntakeError::Validation(message) => {
                    ErrorEnvelope::new(ErrorKind::Validation, message)
                }
                IntakeError::Conflict(message) => ErrorEnvelope::new(ErrorKind::Conflict, message),
                IntakeError::NotFound => {
                    ErrorEnvelope::new(ErrorKind::NotFound, "applicant not found")
                }
                IntakeError::Credential(inner) => internal(inner),
                IntakeError::Repository(inner) => repository(inner),
            },
            MarketplaceError::Pipeline(err) => match err {
                PipelineError::NotFound(_) => {
                    ErrorEnvelope::new(ErrorKind::NotFound, "applicant not found")
                }
                PipelineError::TransactionFailure { .. } => ErrorEnvelope::new(
                    ErrorKind::TransactionFailure,
                    "review decision could not be committed",
                )
                .with_detail(err.to_string()),
                PipelineError::Repository(inner) => repository(inner),
            },
            MarketplaceError::Bid(err) => match err {
                BidError::Validation(message) => ErrorEnvelope::new(ErrorKind::Validation, message),
                BidError::Repository(inner) => repository(inner),
            },
            MarketplaceError::Company(err) => match err {
                CompanyError::MissingName => {
                    ErrorEnvelope::new(ErrorKind::Validation, err.to_string())
                }
                CompanyError::Conflict(message) => ErrorEnvelope::new(ErrorKind::Conflict, message),
                CompanyError::NotFound => ErrorEnvelope::new(ErrorKind::NotFound, err.to_string()),
                CompanyError::Repository(inner) => repository(inner),
            },
            MarketplaceError::Credential(err) => match err {
                CredentialError::UnknownEmail => {
                    ErrorEnvelope::new(ErrorKind::NotFound, err.to_string())
                }
                CredentialError::InvalidCredentials | CredentialError::TokenRejected(_) => {
                    ErrorEnvelope::new(ErrorKind::Unauthorized, "Invalid Credentials")
                }
                CredentialError::Crypto(_) => internal(err),
                CredentialError::Repository(inner) => repository(inner),
            },
            MarketplaceError::Repository(err) => repository(err),
            MarketplaceError::Validation(message) => {
                ErrorEnvelope::new(ErrorKind::Validation, message)
            }
            MarketplaceError::NotFound(what) => {
                ErrorEnvelope::new(ErrorKind::NotFound, format!("{what} not found"))
            }
            MarketplaceError::Worker(err) => internal(err),
        }
    }
}

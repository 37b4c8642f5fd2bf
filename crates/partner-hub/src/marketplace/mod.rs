//! Partner marketplace: applicant intake, the approval pipeline, and the public directory.
//!
//! Every service is generic over its storage seam so tests can swap in failing or flaky stores.
//! [`storage::Database`] is the production backend for all of them.

pub mod bids;
pub mod companies;
pub mod credentials;
pub mod domain;
pub mod intake;
pub mod notifications;
pub mod pipeline;
pub mod repository;
pub mod router;
pub mod service;
pub mod stats;
pub mod storage;

#[cfg(test)]
mod tests;

pub use bids::{BidError, BidListing, BidRegistry};
pub use companies::{CompanyDirectory, CompanyError};
pub use credentials::{CredentialError, CredentialService, LoginRequest, SessionToken};
pub use domain::{
    Applicant, ApplicantId, ApplicationSubmission, AuditEntry, BidId, BidStatus, BusinessBid,
    Company, CompanyId, NewBid, NewCompany, PartnerId, ReviewDecision, UrgencyLevel,
    ValidatedPartner, WorkEmail,
};
pub use intake::{ApplicantIntake, IntakeError};
pub use notifications::{
    ContactMessage, LogTransport, MailTransport, NotificationDispatcher, Notifier, OutboundEmail,
    TransportError,
};
pub use pipeline::{Approval, ApprovalPipeline, PipelineError, Rejection};
pub use repository::{
    ApplicantStore, AuditLog, BidStore, CommitOutcome, CompanyStore, PartnerStore,
    RepositoryError, Transition, TransitionStore,
};
pub use router::marketplace_router;
pub use service::{Marketplace, MarketplaceError, MarketplaceSettings, MarketplaceStore};
pub use stats::{ReviewStats, StatsAggregator};
pub use storage::{Database, StorageError};

use super::domain::{
    Applicant, ApplicantId, AuditEntry, BidId, BusinessBid, Company, CompanyId, PartnerId,
    ValidatedPartner, WorkEmail,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Only unavailability is worth retrying; the other variants are definite answers.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

/// Definite answer from a delete so callers can tell a winner from a late arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal<T> {
    Removed(T),
    NotFound,
}

impl<T> Removal<T> {
    pub fn is_removed(&self) -> bool {
        matches!(self, Removal::Removed(_))
    }
}

/// Pending registrations.
pub trait ApplicantStore: Send + Sync {
    /// Fails with `Conflict` when the e-mail is already held by an applicant or a partner.
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError>;
    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError>;
    fn find_applicant_by_email(
        &self,
        email: &WorkEmail,
    ) -> Result<Option<Applicant>, RepositoryError>;
    fn remove_applicant(&self, id: &ApplicantId) -> Result<Removal<Applicant>, RepositoryError>;
    fn applicants(&self) -> Result<Vec<Applicant>, RepositoryError>;
    fn applicant_count(&self) -> Result<usize, RepositoryError>;
}

/// Approved partners. Writes only happen through [`TransitionStore::commit`].
pub trait PartnerStore: Send + Sync {
    fn fetch_partner(&self, id: &PartnerId) -> Result<Option<ValidatedPartner>, RepositoryError>;
    fn find_partner_by_email(
        &self,
        email: &WorkEmail,
    ) -> Result<Option<ValidatedPartner>, RepositoryError>;
    fn partners(&self) -> Result<Vec<ValidatedPartner>, RepositoryError>;
    fn partner_count(&self) -> Result<usize, RepositoryError>;
}

/// Review transition applied across both stores as one unit.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Insert `partner` and delete `applicant_id`.
    Promote {
        applicant_id: ApplicantId,
        partner: ValidatedPartner,
        audit: AuditEntry,
    },
    /// Delete `applicant_id` without keeping a copy.
    Discard {
        applicant_id: ApplicantId,
        audit: AuditEntry,
    },
}

impl Transition {
    pub fn applicant_id(&self) -> &ApplicantId {
        match self {
            Transition::Promote { applicant_id, .. } | Transition::Discard { applicant_id, .. } => {
                applicant_id
            }
        }
    }
}

/// Result of a commit that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The applicant was consumed by another commit first; nothing was written.
    ApplicantMissing,
}

/// Atomic multi-store commit. Implementations must leave either the pre- or the
/// post-transition state visible, never a mix, and must re-check applicant presence inside
/// the commit.
pub trait TransitionStore: ApplicantStore + PartnerStore + AuditLog {
    fn commit(&self, transition: Transition) -> Result<CommitOutcome, RepositoryError>;
}

pub trait AuditLog: Send + Sync {
    fn audit_entries(&self) -> Result<Vec<AuditEntry>, RepositoryError>;
}

pub trait CompanyStore: Send + Sync {
    /// Fails with `Conflict` when a company with the same name (case-insensitive) exists.
    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError>;
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    fn companies(&self) -> Result<Vec<Company>, RepositoryError>;
}

pub trait BidStore: Send + Sync {
    fn insert_bid(&self, bid: BusinessBid) -> Result<BusinessBid, RepositoryError>;
    fn fetch_bid(&self, id: &BidId) -> Result<Option<BusinessBid>, RepositoryError>;
    fn bids(&self) -> Result<Vec<BusinessBid>, RepositoryError>;
}

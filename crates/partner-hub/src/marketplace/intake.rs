use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::credentials::{hash_password, CredentialError, MIN_PASSWORD_LENGTH};
use super::domain::{Applicant, ApplicantId, ApplicationSubmission, RegistrationDetails, WorkEmail};
use super::notifications::{contact_relay, submission_received, ContactMessage, Notifier};
use super::repository::{ApplicantStore, PartnerStore, RepositoryError};

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("applicant not found")]
    NotFound,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for IntakeError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(detail) => Self::Conflict(detail),
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Creates pending applicant records and relays contact-form messages.
pub struct ApplicantIntake<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    operator_email: String,
}

impl<S, N> ApplicantIntake<S, N>
where
    S: ApplicantStore + PartnerStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, operator_email: impl Into<String>) -> Self {
        Self {
            store,
            notifier,
            operator_email: operator_email.into(),
        }
    }

    /// Validate, hash the password, and store a new pending applicant.
    pub fn submit(&self, submission: ApplicationSubmission) -> Result<Applicant, IntakeError> {
        let ApplicationSubmission {
            work_email,
            company_name,
            contact,
            message,
            password,
        } = submission;

        let work_email = WorkEmail::parse(&work_email)
            .ok_or_else(|| IntakeError::Validation("work_email must be an address".to_string()))?;
        let company_name = company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(IntakeError::Validation(
                "company_name is required".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IntakeError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.store.find_applicant_by_email(&work_email)?.is_some() {
            return Err(IntakeError::Conflict(format!(
                "an application for {work_email} is already pending"
            )));
        }
        if self.store.find_partner_by_email(&work_email)?.is_some() {
            return Err(IntakeError::Conflict(format!(
                "{work_email} is already a validated partner"
            )));
        }

        let applicant = Applicant {
            id: ApplicantId::generate(),
            details: RegistrationDetails {
                work_email,
                company_name,
                contact: contact.trim().to_string(),
                message: message.trim().to_string(),
                credential_hash: hash_password(&password)?,
            },
            submitted_at: Utc::now(),
        };

        let stored = self.store.insert_applicant(applicant)?;
        info!(
            applicant_id = %stored.id,
            company = %stored.details.company_name,
            "application submitted"
        );
        self.notifier
            .dispatch(submission_received(&self.operator_email, &stored));
        Ok(stored)
    }

    /// Pending applicants, oldest first.
    pub fn pending(&self) -> Result<Vec<Applicant>, IntakeError> {
        Ok(self.store.applicants()?)
    }

    pub fn get(&self, id: &ApplicantId) -> Result<Applicant, IntakeError> {
        self.store
            .fetch_applicant(id)?
            .ok_or(IntakeError::NotFound)
    }

    /// Forward a contact-form message to the operator. Only validation can fail; delivery is
    /// best effort.
    pub fn relay_contact(&self, contact: ContactMessage) -> Result<(), IntakeError> {
        if WorkEmail::parse(&contact.email).is_none() {
            return Err(IntakeError::Validation(
                "email must be an address".to_string(),
            ));
        }
        if contact.message.trim().is_empty() {
            return Err(IntakeError::Validation("message is required".to_string()));
        }
        self.notifier
            .dispatch(contact_relay(&self.operator_email, &contact));
        Ok(())
    }
}

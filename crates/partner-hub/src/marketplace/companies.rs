use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{Company, CompanyId, NewCompany};
use super::repository::{CompanyStore, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum CompanyError {
    #[error("company_name is required")]
    MissingName,
    #[error("{0}")]
    Conflict(String),
    #[error("company not found")]
    NotFound,
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CompanyError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(detail) => Self::Conflict(detail),
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Public partner profiles.
pub struct CompanyDirectory<S> {
    store: Arc<S>,
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl<S> CompanyDirectory<S>
where
    S: CompanyStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(&self, company: NewCompany) -> Result<Company, CompanyError> {
        let company_name = optional(company.company_name).ok_or(CompanyError::MissingName)?;

        let stored = self.store.insert_company(Company {
            id: CompanyId::generate(),
            company_name,
            logo: optional(company.logo),
            overview: optional(company.overview),
            services_offered: optional(company.services_offered),
            expertise_and_certifications: optional(company.expertise_and_certifications),
            case_studies: optional(company.case_studies),
            website: optional(company.website),
            created_at: Utc::now(),
        })?;
        info!(company_id = %stored.id, name = %stored.company_name, "company profile created");
        Ok(stored)
    }

    pub fn get(&self, id: &CompanyId) -> Result<Company, CompanyError> {
        self.store.fetch_company(id)?.ok_or(CompanyError::NotFound)
    }

    /// Flat listing ordered by name.
    pub fn list(&self) -> Result<Vec<Company>, CompanyError> {
        Ok(self.store.companies()?)
    }
}

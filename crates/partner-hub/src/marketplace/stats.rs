use std::sync::Arc;

use serde::Serialize;

use super::repository::{ApplicantStore, PartnerStore, RepositoryError};

/// Review counts. `rejected` is always zero because rejected applicants are discarded rather
/// than archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
}

/// Read-only counts over the applicant and partner stores. The two counts are read separately,
/// so a concurrent approval may be counted on either side but never on both.
pub struct StatsAggregator<S> {
    store: Arc<S>,
}

impl<S> StatsAggregator<S>
where
    S: ApplicantStore + PartnerStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn stats(&self) -> Result<ReviewStats, RepositoryError> {
        let pending = self.store.applicant_count()?;
        let approved = self.store.partner_count()?;
        let rejected = 0;

        Ok(ReviewStats {
            pending,
            approved,
            rejected,
            total: pending + approved + rejected,
        })
    }
}

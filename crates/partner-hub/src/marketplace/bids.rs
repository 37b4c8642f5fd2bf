use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::domain::{BidId, BusinessBid, NewBid};
use super::repository::{BidStore, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum BidError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Listing result. The empty shape is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BidListing {
    Bids {
        bids: Vec<BusinessBid>,
        count: usize,
    },
    Empty {
        message: &'static str,
        data: Vec<BusinessBid>,
    },
}

impl BidListing {
    pub const EMPTY_MESSAGE: &'static str = "No bids found";

    fn from_bids(bids: Vec<BusinessBid>) -> Self {
        if bids.is_empty() {
            return BidListing::Empty {
                message: Self::EMPTY_MESSAGE,
                data: Vec::new(),
            };
        }
        let count = bids.len();
        BidListing::Bids { bids, count }
    }

    pub fn count(&self) -> usize {
        match self {
            BidListing::Bids { count, .. } => *count,
            BidListing::Empty { .. } => 0,
        }
    }

    pub fn bids(&self) -> &[BusinessBid] {
        match self {
            BidListing::Bids { bids, .. } => bids,
            BidListing::Empty { data, .. } => data,
        }
    }
}

/// Customer service requests, independent of the partner lifecycle.
pub struct BidRegistry<S> {
    store: Arc<S>,
}

impl<S> BidRegistry<S>
where
    S: BidStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All bids, newest first.
    pub fn list(&self) -> Result<BidListing, BidError> {
        let mut bids = self.store.bids()?;
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(BidListing::from_bids(bids))
    }

    pub fn get(&self, id: &BidId) -> Result<Option<BusinessBid>, BidError> {
        Ok(self.store.fetch_bid(id)?)
    }

    pub fn submit(&self, bid: NewBid) -> Result<BusinessBid, BidError> {
        let company_name = bid.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(BidError::Validation("company_name is required".to_string()));
        }

        let mut service_types: Vec<String> = Vec::with_capacity(bid.service_types.len());
        for service in bid.service_types {
            let service = service.trim();
            if !service.is_empty() && !service_types.iter().any(|seen| seen == service) {
                service_types.push(service.to_string());
            }
        }
        if service_types.is_empty() {
            return Err(BidError::Validation(
                "at least one service type is required".to_string(),
            ));
        }

        let stored = self.store.insert_bid(BusinessBid {
            id: BidId::generate(),
            company_name,
            industry: bid.industry.trim().to_string(),
            service_types,
            description: bid.description.trim().to_string(),
            urgency: bid.urgency,
            status: bid.status,
            created_at: Utc::now(),
        })?;
        info!(bid_id = %stored.id, urgency = ?stored.urgency, "bid received");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{BidStatus, UrgencyLevel};
    use crate::marketplace::storage::Database;
    use chrono::Duration;

    fn bid(company: &str, minutes_ago: i64) -> BusinessBid {
        BusinessBid {
            id: BidId::generate(),
            company_name: company.to_string(),
            industry: "Logistics".to_string(),
            service_types: vec!["Cloud migration".to_string()],
            description: "Move the WMS".to_string(),
            urgency: UrgencyLevel::Urgent,
            status: BidStatus::Approved,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn empty_registry_lists_explicit_zero() {
        let registry = BidRegistry::new(Arc::new(Database::in_memory()));
        let listing = registry.list().expect("listing");

        assert_eq!(listing.count(), 0);
        assert!(listing.bids().is_empty());
        let body = serde_json::to_value(&listing).expect("serializes");
        assert_eq!(body["message"], "No bids found");
        assert_eq!(body["data"], serde_json::json!([]));
    }

    #[test]
    fn lists_newest_first() {
        let store = Arc::new(Database::in_memory());
        for (company, age) in [("Old", 30), ("Newest", 1), ("Middle", 10)] {
            store.insert_bid(bid(company, age)).expect("insert");
        }

        let listing = BidRegistry::new(store).list().expect("listing");
        let order: Vec<&str> = listing
            .bids()
            .iter()
            .map(|bid| bid.company_name.as_str())
            .collect();
        assert_eq!(order, ["Newest", "Middle", "Old"]);
        assert_eq!(listing.count(), 3);
    }

    #[test]
    fn submit_requires_company_and_service() {
        let registry = BidRegistry::new(Arc::new(Database::in_memory()));

        let missing_company = NewBid {
            service_types: vec!["Audit".to_string()],
            ..NewBid::default()
        };
        assert!(matches!(
            registry.submit(missing_company),
            Err(BidError::Validation(_))
        ));

        let blank_services = NewBid {
            company_name: "Globex".to_string(),
            service_types: vec!["  ".to_string()],
            ..NewBid::default()
        };
        assert!(matches!(
            registry.submit(blank_services),
            Err(BidError::Validation(_))
        ));
    }

    #[test]
    fn submit_dedupes_services_and_applies_defaults() {
        let registry = BidRegistry::new(Arc::new(Database::in_memory()));
        let stored = registry
            .submit(NewBid {
                company_name: " Globex ".to_string(),
                service_types: vec![
                    "Audit".to_string(),
                    "Pentest".to_string(),
                    "Audit".to_string(),
                ],
                ..NewBid::default()
            })
            .expect("bid stored");

        assert_eq!(stored.company_name, "Globex");
        assert_eq!(stored.service_types, ["Audit", "Pentest"]);
        assert_eq!(stored.urgency, UrgencyLevel::Standard);
        assert_eq!(stored.status, BidStatus::PendingReview);
    }
}

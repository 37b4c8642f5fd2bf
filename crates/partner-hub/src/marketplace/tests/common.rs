use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::{AuthConfig, PipelineConfig};
use crate::marketplace::domain::{
    Applicant, ApplicantId, ApplicationSubmission, AuditEntry, BidId, BusinessBid, Company,
    CompanyId, PartnerId, ValidatedPartner, WorkEmail,
};
use crate::marketplace::notifications::{Notifier, OutboundEmail};
use crate::marketplace::repository::{
    ApplicantStore, AuditLog, BidStore, CommitOutcome, CompanyStore, PartnerStore, Removal,
    RepositoryError, Transition, TransitionStore,
};
use crate::marketplace::service::{Marketplace, MarketplaceSettings, MarketplaceStore};
use crate::marketplace::storage::Database;
use crate::marketplace::{marketplace_router, ApplicantIntake, ApprovalPipeline};

pub(super) const OPERATOR: &str = "operator@hub.test";
pub(super) const PASSWORD: &str = "correct-horse";

pub(super) fn submission(email: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        work_email: email.to_string(),
        company_name: "Acme Logistics".to_string(),
        contact: "Ana Ops, +1 555 0100".to_string(),
        message: "Freight forwarding across the EU".to_string(),
        password: PASSWORD.to_string(),
    }
}

pub(super) fn settings(max_attempts: u32) -> MarketplaceSettings {
    MarketplaceSettings {
        pipeline: PipelineConfig { max_attempts },
        auth: AuthConfig::with_secret("test-secret"),
        operator_email: OPERATOR.to_string(),
        expose_error_detail: true,
    }
}

pub(super) fn intake<S>(
    store: Arc<S>,
) -> (ApplicantIntake<S, MemoryNotifier>, Arc<MemoryNotifier>)
where
    S: ApplicantStore + PartnerStore + 'static,
{
    let notifier = Arc::new(MemoryNotifier::default());
    (
        ApplicantIntake::new(store, notifier.clone(), OPERATOR),
        notifier,
    )
}

pub(super) fn pipeline<S>(
    store: Arc<S>,
    max_attempts: u32,
) -> (ApprovalPipeline<S, MemoryNotifier>, Arc<MemoryNotifier>)
where
    S: TransitionStore + 'static,
{
    let notifier = Arc::new(MemoryNotifier::default());
    (
        ApprovalPipeline::new(store, notifier.clone(), PipelineConfig { max_attempts }),
        notifier,
    )
}

/// Submits one applicant through the intake so the stored hash is real.
pub(super) fn seed_applicant<S>(store: &Arc<S>, email: &str) -> Applicant
where
    S: ApplicantStore + PartnerStore + 'static,
{
    let (intake, _) = intake(store.clone());
    intake.submit(submission(email)).expect("seed applicant")
}

pub(super) fn build_marketplace<S>(
    store: Arc<S>,
) -> (Arc<Marketplace<S, MemoryNotifier>>, Arc<MemoryNotifier>)
where
    S: MarketplaceStore + 'static,
{
    let notifier = Arc::new(MemoryNotifier::default());
    let marketplace = Marketplace::new(store, notifier.clone(), settings(3));
    (Arc::new(marketplace), notifier)
}

pub(super) fn router_with_store<S>(store: Arc<S>) -> axum::Router
where
    S: MarketplaceStore + 'static,
{
    let (marketplace, _) = build_marketplace(store);
    marketplace_router(marketplace)
}

pub(super) async fn send(
    router: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };

    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn sent_to(&self, recipient: &str) -> Vec<OutboundEmail> {
        self.sent()
            .into_iter()
            .filter(|email| email.recipient == recipient)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn dispatch(&self, email: OutboundEmail) {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(email);
    }
}

/// What a failing commit leaves behind before it reports `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outage {
    /// Nothing was written.
    Lost,
    /// The transition itself was applied.
    Landed,
    /// A concurrent reviewer rejected the same applicant first.
    RivalRejected,
}

/// Database wrapper whose commits fail with `Unavailable` a fixed number of times.
pub(super) struct FlakyStore {
    pub(super) inner: Arc<Database>,
    failures_left: AtomicU32,
    outage: Outage,
    commit_calls: AtomicU32,
    rival_notifier: Arc<MemoryNotifier>,
}

impl FlakyStore {
    pub(super) fn failing(times: u32) -> Self {
        Self {
            inner: Arc::new(Database::in_memory()),
            failures_left: AtomicU32::new(times),
            outage: Outage::Lost,
            commit_calls: AtomicU32::new(0),
            rival_notifier: Arc::new(MemoryNotifier::default()),
        }
    }

    /// The first `times` commits are applied but still report an outage.
    pub(super) fn landing_then_failing(times: u32) -> Self {
        Self {
            outage: Outage::Landed,
            ..Self::failing(times)
        }
    }

    /// The first `times` commits write nothing, and while each is in flight a second reviewer
    /// rejects the same applicant through its own pipeline.
    pub(super) fn rival_rejects_then_failing(times: u32) -> Self {
        Self {
            outage: Outage::RivalRejected,
            ..Self::failing(times)
        }
    }

    pub(super) fn commit_calls(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }

    /// Mail sent by the competing reviewer's pipeline.
    pub(super) fn rival_notifier(&self) -> Arc<MemoryNotifier> {
        self.rival_notifier.clone()
    }
}

impl ApplicantStore for FlakyStore {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        self.inner.insert_applicant(applicant)
    }

    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.fetch_applicant(id)
    }

    fn find_applicant_by_email(
        &self,
        email: &WorkEmail,
    ) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.find_applicant_by_email(email)
    }

    fn remove_applicant(&self, id: &ApplicantId) -> Result<Removal<Applicant>, RepositoryError> {
        self.inner.remove_applicant(id)
    }

    fn applicants(&self) -> Result<Vec<Applicant>, RepositoryError> {
        self.inner.applicants()
    }

    fn applicant_count(&self) -> Result<usize, RepositoryError> {
        self.inner.applicant_count()
    }
}

impl PartnerStore for FlakyStore {
    fn fetch_partner(&self, id: &PartnerId) -> Result<Option<ValidatedPartner>, RepositoryError> {
        self.inner.fetch_partner(id)
    }

    fn find_partner_by_email(
        &self,
        email: &WorkEmail,
    ) -> Result<Option<ValidatedPartner>, RepositoryError> {
        self.inner.find_partner_by_email(email)
    }

    fn partners(&self) -> Result<Vec<ValidatedPartner>, RepositoryError> {
        self.inner.partners()
    }

    fn partner_count(&self) -> Result<usize, RepositoryError> {
        self.inner.partner_count()
    }
}

impl AuditLog for FlakyStore {
    fn audit_entries(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        self.inner.audit_entries()
    }
}

impl TransitionStore for FlakyStore {
    fn commit(&self, transition: Transition) -> Result<CommitOutcome, RepositoryError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !fail {
            return self.inner.commit(transition);
        }
        match self.outage {
            Outage::Lost => {}
            Outage::Landed => {
                self.inner.commit(transition)?;
            }
            Outage::RivalRejected => {
                let rival = ApprovalPipeline::new(
                    self.inner.clone(),
                    self.rival_notifier.clone(),
                    PipelineConfig { max_attempts: 1 },
                );
                let _ = rival.reject(transition.applicant_id());
            }
        }
        Err(RepositoryError::Unavailable("simulated outage".to_string()))
    }
}

impl CompanyStore for FlakyStore {
    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError> {
        self.inner.insert_company(company)
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        self.inner.fetch_company(id)
    }

    fn companies(&self) -> Result<Vec<Company>, RepositoryError> {
        self.inner.companies()
    }
}

impl BidStore for FlakyStore {
    fn insert_bid(&self, bid: BusinessBid) -> Result<BusinessBid, RepositoryError> {
        self.inner.insert_bid(bid)
    }

    fn fetch_bid(&self, id: &BidId) -> Result<Option<BusinessBid>, RepositoryError> {
        self.inner.fetch_bid(id)
    }

    fn bids(&self) -> Result<Vec<BusinessBid>, RepositoryError> {
        self.inner.bids()
    }
}

/// Store whose every call reports an outage.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ApplicantStore for UnavailableStore {
    fn insert_applicant(&self, _applicant: Applicant) -> Result<Applicant, RepositoryError> {
        offline()
    }

    fn fetch_applicant(&self, _id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        offline()
    }

    fn find_applicant_by_email(
        &self,
        _email: &WorkEmail,
    ) -> Result<Option<Applicant>, RepositoryError> {
        offline()
    }

    fn remove_applicant(&self, _id: &ApplicantId) -> Result<Removal<Applicant>, RepositoryError> {
        offline()
    }

    fn applicants(&self) -> Result<Vec<Applicant>, RepositoryError> {
        offline()
    }

    fn applicant_count(&self) -> Result<usize, RepositoryError> {
        offline()
    }
}

impl PartnerStore for UnavailableStore {
    fn fetch_partner(&self, _id: &PartnerId) -> Result<Option<ValidatedPartner>, RepositoryError> {
        offline()
    }

    fn find_partner_by_email(
        &self,
        _email: &WorkEmail,
    ) -> Result<Option<ValidatedPartner>, RepositoryError> {
        offline()
    }

    fn partners(&self) -> Result<Vec<ValidatedPartner>, RepositoryError> {
        offline()
    }

    fn partner_count(&self) -> Result<usize, RepositoryError> {
        offline()
    }
}

impl AuditLog for UnavailableStore {
    fn audit_entries(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        offline()
    }
}

impl TransitionStore for UnavailableStore {
    fn commit(&self, _transition: Transition) -> Result<CommitOutcome, RepositoryError> {
        offline()
    }
}

impl CompanyStore for UnavailableStore {
    fn insert_company(&self, _company: Company) -> Result<Company, RepositoryError> {
        offline()
    }

    fn fetch_company(&self, _id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        offline()
    }

    fn companies(&self) -> Result<Vec<Company>, RepositoryError> {
        offline()
    }
}

impl BidStore for UnavailableStore {
    fn insert_bid(&self, _bid: BusinessBid) -> Result<BusinessBid, RepositoryError> {
        offline()
    }

    fn fetch_bid(&self, _id: &BidId) -> Result<Option<BusinessBid>, RepositoryError> {
        offline()
    }

    fn bids(&self) -> Result<Vec<BusinessBid>, RepositoryError> {
        offline()
    }
}

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::credentials::LoginRequest;
use super::domain::{
    ApplicantId, ApplicantView, ApplicationSubmission, BidId, CompanyId, NewBid, NewCompany,
    PartnerView,
};
use super::notifications::{ContactMessage, Notifier};
use super::service::{Marketplace, MarketplaceError, MarketplaceStore};

type Shared<S, N> = Arc<Marketplace<S, N>>;

/// Operator review request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub id: String,
}

/// Router builder exposing intake, review, directory, and bid endpoints.
pub fn marketplace_router<S, N>(marketplace: Shared<S, N>) -> Router
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/applicants",
            post(submit_applicant_handler::<S, N>).get(list_applicants_handler::<S, N>),
        )
        .route(
            "/api/v1/applicants/approve",
            post(approve_handler::<S, N>),
        )
        .route("/api/v1/applicants/reject", post(reject_handler::<S, N>))
        .route(
            "/api/v1/applicants/:applicant_id",
            get(applicant_handler::<S, N>),
        )
        .route("/api/v1/stats", get(stats_handler::<S, N>))
        .route("/api/v1/partners", get(partners_handler::<S, N>))
        .route(
            "/api/v1/bids",
            get(list_bids_handler::<S, N>).post(submit_bid_handler::<S, N>),
        )
        .route("/api/v1/bids/:bid_id", get(bid_handler::<S, N>))
        .route(
            "/api/v1/companies",
            post(create_company_handler::<S, N>).get(list_companies_handler::<S, N>),
        )
        .route(
            "/api/v1/companies/:company_id",
            get(company_handler::<S, N>),
        )
        .route("/api/v1/auth/login", post(login_handler::<S, N>))
        .route("/api/v1/contact", post(contact_handler::<S, N>))
        .with_state(marketplace)
}

fn failure<S, N>(marketplace: &Marketplace<S, N>, error: impl Into<MarketplaceError>) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    marketplace.envelope(error).into_response()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, MarketplaceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| MarketplaceError::Validation(rejection.body_text()))
}

/// Runs password hashing and verification on the blocking pool instead of a runtime worker.
async fn off_runtime<S, N, T, F>(
    marketplace: &Shared<S, N>,
    work: F,
) -> Result<T, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
    T: Send + 'static,
    F: FnOnce(&Marketplace<S, N>) -> Result<T, MarketplaceError> + Send + 'static,
{
    let marketplace = marketplace.clone();
    tokio::task::spawn_blocking(move || work(&marketplace)).await?
}

fn parse_uuid(raw: &str, what: &'static str) -> Result<Uuid, MarketplaceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| MarketplaceError::NotFound(what))
}

pub(crate) async fn submit_applicant_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<ApplicationSubmission>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let submission = match body(payload) {
        Ok(submission) => submission,
        Err(err) => return failure(&marketplace, err),
    };

    let submitted = off_runtime(&marketplace, move |marketplace| {
        Ok(marketplace.intake.submit(submission)?)
    })
    .await;
    match submitted {
        Ok(applicant) => (StatusCode::CREATED, Json(applicant.view())).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn list_applicants_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    match marketplace.intake.pending() {
        Ok(applicants) => {
            let views: Vec<ApplicantView> = applicants.iter().map(|a| a.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn applicant_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    Path(applicant_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let id = match parse_uuid(&applicant_id, "applicant") {
        Ok(id) => ApplicantId(id),
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.intake.get(&id) {
        Ok(applicant) => (StatusCode::OK, Json(applicant.view())).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

fn review_target(
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<ApplicantId, MarketplaceError> {
    let request = body(payload)?;
    parse_uuid(&request.id, "applicant").map(ApplicantId)
}

pub(crate) async fn approve_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let id = match review_target(payload) {
        Ok(id) => id,
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.pipeline.approve(&id) {
        Ok(approval) => {
            let payload = json!({
                "status": "approved",
                "applicant_id": approval.applicant_id,
                "partner_id": approval.partner.id,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn reject_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let id = match review_target(payload) {
        Ok(id) => id,
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.pipeline.reject(&id) {
        Ok(rejection) => {
            let payload = json!({
                "status": "rejected",
                "applicant_id": rejection.applicant_id,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn stats_handler<S, N>(State(marketplace): State<Shared<S, N>>) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    match marketplace.stats.stats() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn partners_handler<S, N>(State(marketplace): State<Shared<S, N>>) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    match marketplace.pipeline.partners() {
        Ok(partners) => {
            let views: Vec<PartnerView> = partners.iter().map(|p| p.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn list_bids_handler<S, N>(State(marketplace): State<Shared<S, N>>) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    match marketplace.bids.list() {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn submit_bid_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<NewBid>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let bid = match body(payload) {
        Ok(bid) => bid,
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.bids.submit(bid) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn bid_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    Path(bid_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let id = match parse_uuid(&bid_id, "bid") {
        Ok(id) => BidId(id),
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.bids.get(&id) {
        Ok(Some(bid)) => (StatusCode::OK, Json(bid)).into_response(),
        Ok(None) => failure(&marketplace, MarketplaceError::NotFound("bid")),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn create_company_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<NewCompany>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let company = match body(payload) {
        Ok(company) => company,
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.companies.create(company) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn list_companies_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    match marketplace.companies.list() {
        Ok(companies) => (StatusCode::OK, Json(companies)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn company_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    Path(company_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let id = match parse_uuid(&company_id, "company") {
        Ok(id) => CompanyId(id),
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.companies.get(&id) {
        Ok(company) => (StatusCode::OK, Json(company)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn login_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let request = match body(payload) {
        Ok(request) => request,
        Err(err) => return failure(&marketplace, err),
    };

    let session = off_runtime(&marketplace, move |marketplace| {
        Ok(marketplace.credentials.login(&request)?)
    })
    .await;
    match session {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

pub(crate) async fn contact_handler<S, N>(
    State(marketplace): State<Shared<S, N>>,
    payload: Result<Json<ContactMessage>, JsonRejection>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: Notifier + 'static,
{
    let contact = match body(payload) {
        Ok(contact) => contact,
        Err(err) => return failure(&marketplace, err),
    };

    match marketplace.intake.relay_contact(contact) {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "received" }))).into_response(),
        Err(err) => failure(&marketplace, err),
    }
}

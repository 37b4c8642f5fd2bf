use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a pending registration.
    ApplicantId
);
opaque_id!(
    /// Identifier minted when an applicant is promoted; unrelated to the applicant id.
    PartnerId
);
opaque_id!(CompanyId);
opaque_id!(BidId);

/// Work e-mail normalized to trimmed lowercase so uniqueness checks are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkEmail(String);

impl WorkEmail {
    /// Returns `None` when the value cannot be an address (`local@domain`).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let (local, domain) = normalized.split_once('@')?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        if normalized.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Business fields carried unchanged from applicant to validated partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetails {
    pub work_email: WorkEmail,
    pub company_name: String,
    pub contact: String,
    pub message: String,
    /// Argon2id PHC string.
    pub credential_hash: String,
}

/// Submitted, not-yet-reviewed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub details: RegistrationDetails,
    pub submitted_at: DateTime<Utc>,
}

impl Applicant {
    pub fn view(&self) -> ApplicantView {
        ApplicantView {
            id: self.id,
            work_email: self.details.work_email.clone(),
            company_name: self.details.company_name.clone(),
            contact: self.details.contact.clone(),
            message: self.details.message.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Applicant promoted by the approval pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedPartner {
    pub id: PartnerId,
    pub details: RegistrationDetails,
    pub approved_at: DateTime<Utc>,
}

impl ValidatedPartner {
    /// Copies the applicant's business fields under a freshly minted identity.
    pub fn promote(applicant: &Applicant, approved_at: DateTime<Utc>) -> Self {
        Self {
            id: PartnerId::generate(),
            details: applicant.details.clone(),
            approved_at,
        }
    }

    pub fn view(&self) -> PartnerView {
        PartnerView {
            id: self.id,
            work_email: self.details.work_email.clone(),
            company_name: self.details.company_name.clone(),
            contact: self.details.contact.clone(),
            message: self.details.message.clone(),
            approved_at: self.approved_at,
        }
    }
}

/// Registration form as received from the intake endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSubmission {
    pub work_email: String,
    pub company_name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub message: String,
    pub password: String,
}

/// Operator-facing projection; never includes the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantView {
    pub id: ApplicantId,
    pub work_email: WorkEmail,
    pub company_name: String,
    pub contact: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerView {
    pub id: PartnerId,
    pub work_email: WorkEmail,
    pub company_name: String,
    pub contact: String,
    pub message: String,
    pub approved_at: DateTime<Utc>,
}

/// Position of a registration in the review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }
}

/// Append-only record of a committed review decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub applicant_id: ApplicantId,
    pub work_email: WorkEmail,
    pub decision: ReviewDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<PartnerId>,
    pub recorded_at: DateTime<Utc>,
}

/// Public partner profile, created independently of approvals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_offered: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expertise_and_certifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_studies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Company creation payload. `company_name` is optional here so a missing name surfaces as a
/// validation failure instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCompany {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub services_offered: Option<String>,
    #[serde(default)]
    pub expertise_and_certifications: Option<String>,
    #[serde(default)]
    pub case_studies: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    Standard,
    Urgent,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Approved,
    #[default]
    PendingReview,
    Closed,
}

/// Customer request for service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessBid {
    pub id: BidId,
    pub company_name: String,
    pub industry: String,
    pub service_types: Vec<String>,
    pub description: String,
    pub urgency: UrgencyLevel,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBid {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub service_types: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub urgency: UrgencyLevel,
    #[serde(default)]
    pub status: BidStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_email_normalizes_case_and_whitespace() {
        let email = WorkEmail::parse("  Ops@Acme.COM ").expect("valid email");
        assert_eq!(email.as_str(), "ops@acme.com");
    }

    #[test]
    fn work_email_rejects_malformed_values() {
        for raw in ["", "acme.com", "@acme.com", "ops@", "a@b@c", "o ps@acme.com"] {
            assert!(WorkEmail::parse(raw).is_none(), "{raw} should be rejected");
        }
    }

    #[test]
    fn promotion_mints_new_identity_and_keeps_fields() {
        let applicant = Applicant {
            id: ApplicantId::generate(),
            details: RegistrationDetails {
                work_email: WorkEmail::parse("a@x.com").expect("valid"),
                company_name: "Acme".to_string(),
                contact: "+1 555 0100".to_string(),
                message: "We build pipelines".to_string(),
                credential_hash: "$argon2id$stub".to_string(),
            },
            submitted_at: Utc::now(),
        };

        let partner = ValidatedPartner::promote(&applicant, Utc::now());
        assert_ne!(partner.id.0, applicant.id.0);
        assert_eq!(partner.details, applicant.details);
    }

    #[test]
    fn review_decision_label_matches_wire_name() {
        for decision in [ReviewDecision::Approved, ReviewDecision::Rejected] {
            let wire = serde_json::to_value(decision).expect("serializes");
            assert_eq!(wire, decision.label());
        }
    }

    #[test]
    fn bid_enums_use_snake_case_labels() {
        let status = serde_json::to_value(BidStatus::PendingReview).expect("serializes");
        assert_eq!(status, "pending_review");
        let urgency: UrgencyLevel = serde_json::from_str("\"critical\"").expect("parses");
        assert_eq!(urgency, UrgencyLevel::Critical);
    }
}

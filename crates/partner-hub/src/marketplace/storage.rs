//! Storage handle backing every marketplace store.
//!
//! All tables sit behind one `RwLock`, so a [`Transition`] touching both the applicant and the
//! partner table becomes visible in a single step. When a snapshot path is configured each write
//! is staged on a copy of the tables, written to a temp file, and renamed over the snapshot before
//! the copy replaces the live tables. A failed write leaves the live tables untouched and a crash
//! leaves the previous snapshot on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    Applicant, ApplicantId, AuditEntry, BidId, BusinessBid, Company, CompanyId, PartnerId,
    ValidatedPartner, WorkEmail,
};
use super::repository::{
    ApplicantStore, AuditLog, BidStore, CommitOutcome, CompanyStore, PartnerStore, Removal,
    RepositoryError, Transition, TransitionStore,
};
use crate::config::StorageConfig;

/// Failures while opening or closing the storage handle.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to read snapshot {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Default, Clone)]
struct Tables {
    applicants: BTreeMap<ApplicantId, Applicant>,
    partners: BTreeMap<PartnerId, ValidatedPartner>,
    companies: BTreeMap<CompanyId, Company>,
    bids: BTreeMap<BidId, BusinessBid>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn email_in_use(&self, email: &WorkEmail) -> bool {
        self.applicants
            .values()
            .any(|applicant| &applicant.details.work_email == email)
            || self
                .partners
                .values()
                .any(|partner| &partner.details.work_email == email)
    }

    fn remove_applicant(&mut self, id: &ApplicantId) -> Removal<Applicant> {
        match self.applicants.remove(id) {
            Some(applicant) => Removal::Removed(applicant),
            None => Removal::NotFound,
        }
    }

    fn apply(&mut self, transition: Transition) -> Result<Staged<CommitOutcome>, RepositoryError> {
        if !self.applicants.contains_key(transition.applicant_id()) {
            return Ok(Staged::Unchanged(CommitOutcome::ApplicantMissing));
        }

        match transition {
            Transition::Promote {
                applicant_id,
                partner,
                audit,
            } => {
                if self.partners.contains_key(&partner.id)
                    || self
                        .partners
                        .values()
                        .any(|existing| existing.details.work_email == partner.details.work_email)
                {
                    return Err(RepositoryError::Conflict(format!(
                        "partner {} already registered",
                        partner.details.work_email
                    )));
                }
                if !self.remove_applicant(&applicant_id).is_removed() {
                    return Ok(Staged::Unchanged(CommitOutcome::ApplicantMissing));
                }
                self.partners.insert(partner.id, partner);
                self.audit.push(audit);
            }
            Transition::Discard {
                applicant_id,
                audit,
            } => {
                if !self.remove_applicant(&applicant_id).is_removed() {
                    return Ok(Staged::Unchanged(CommitOutcome::ApplicantMissing));
                }
                self.audit.push(audit);
            }
        }

        Ok(Staged::Changed(CommitOutcome::Committed))
    }
}

/// Marks whether a write touched the tables, so untouched writes skip the snapshot.
enum Staged<T> {
    Changed(T),
    Unchanged(T),
}

/// On-disk layout of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    applicants: Vec<Applicant>,
    #[serde(default)]
    partners: Vec<ValidatedPartner>,
    #[serde(default)]
    companies: Vec<Company>,
    #[serde(default)]
    bids: Vec<BusinessBid>,
    #[serde(default)]
    audit: Vec<AuditEntry>,
}

impl From<&Tables> for Snapshot {
    fn from(tables: &Tables) -> Self {
        Self {
            applicants: tables.applicants.values().cloned().collect(),
            partners: tables.partners.values().cloned().collect(),
            companies: tables.companies.values().cloned().collect(),
            bids: tables.bids.values().cloned().collect(),
            audit: tables.audit.clone(),
        }
    }
}

impl From<Snapshot> for Tables {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            applicants: snapshot
                .applicants
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            partners: snapshot
                .partners
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            companies: snapshot
                .companies
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            bids: snapshot
                .bids
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
            audit: snapshot.audit,
        }
    }
}

#[derive(Debug)]
struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    fn load(&self) -> Result<Tables, StorageError> {
        if !self.path.exists() {
            return Ok(Tables::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(snapshot.into())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist(&self, tables: &Tables) -> Result<(), RepositoryError> {
        let body = serde_json::to_vec_pretty(&Snapshot::from(tables))
            .map_err(|err| RepositoryError::Unavailable(format!("encode snapshot: {err}")))?;
        let temp = self.temp_path();
        write_synced(&temp, &body)
            .and_then(|()| fs::rename(&temp, &self.path))
            .map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "write snapshot {}: {err}",
                    self.path.display()
                ))
            })
    }
}

fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(body)?;
    file.sync_all()
}

/// Explicitly constructed storage handle shared by every store trait.
#[derive(Debug)]
pub struct Database {
    tables: RwLock<Tables>,
    snapshot: Option<SnapshotFile>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot: None,
        }
    }

    /// Open the handle, loading the snapshot file when one is configured.
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let Some(path) = config.data_path.clone() else {
            info!("marketplace storage running in memory");
            return Ok(Self::in_memory());
        };

        let snapshot = SnapshotFile { path };
        let tables = snapshot.load()?;
        info!(
            path = %snapshot.path.display(),
            applicants = tables.applicants.len(),
            partners = tables.partners.len(),
            "marketplace snapshot loaded"
        );

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot: Some(snapshot),
        })
    }

    /// Flush the current state one last time before shutdown.
    pub fn close(self) -> Result<(), StorageError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let tables = self.read()?;
        snapshot.persist(&tables)?;
        info!(path = %snapshot.path.display(), "marketplace snapshot flushed");
        Ok(())
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(|snapshot| snapshot.path.as_path())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Unavailable("storage lock poisoned".to_string()))
    }

    fn lock(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::Unavailable("storage lock poisoned".to_string()))
    }

    /// Run `op` against the tables. `op` must validate before mutating, since without a
    /// snapshot it works on the live tables.
    fn write<T>(
        &self,
        op: impl FnOnce(&mut Tables) -> Result<Staged<T>, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let Some(snapshot) = &self.snapshot else {
            return op(&mut *guard).map(|staged| match staged {
                Staged::Changed(value) | Staged::Unchanged(value) => value,
            });
        };

        let mut staged = (*guard).clone();
        match op(&mut staged)? {
            Staged::Unchanged(value) => Ok(value),
            Staged::Changed(value) => {
                snapshot.persist(&staged)?;
                *guard = staged;
                debug!(path = %snapshot.path.display(), "marketplace snapshot written");
                Ok(value)
            }
        }
    }
}

impl ApplicantStore for Database {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        self.write(|tables| {
            if tables.applicants.contains_key(&applicant.id)
                || tables.email_in_use(&applicant.details.work_email)
            {
                return Err(RepositoryError::Conflict(format!(
                    "{} already registered",
                    applicant.details.work_email
                )));
            }
            tables.applicants.insert(applicant.id, applicant.clone());
            Ok(Staged::Changed(applicant))
        })
    }

    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self.read()?.applicants.get(id).cloned())
    }

    fn find_applicant_by_email(
        &self,
        email: &WorkEmail,
    ) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self
            .read()?
            .applicants
            .values()
            .find(|applicant| &applicant.details.work_email == email)
            .cloned())
    }

    fn remove_applicant(&self, id: &ApplicantId) -> Result<Removal<Applicant>, RepositoryError> {
        self.write(|tables| {
            Ok(match tables.remove_applicant(id) {
                Removal::Removed(applicant) => Staged::Changed(Removal::Removed(applicant)),
                Removal::NotFound => Staged::Unchanged(Removal::NotFound),
            })
        })
    }

    fn applicants(&self) -> Result<Vec<Applicant>, RepositoryError> {
        let mut applicants: Vec<Applicant> = self.read()?.applicants.values().cloned().collect();
        applicants.sort_by_key(|applicant| applicant.submitted_at);
        Ok(applicants)
    }

    fn applicant_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.read()?.applicants.len())
    }
}

impl PartnerStore for Database {
    fn fetch_partner(&self, id: &PartnerId) -> Result<Option<ValidatedPartner>, RepositoryError> {
        Ok(self.read()?.partners.get(id).cloned())
    }

    fn find_partner_by_email(
        &self,
        email: &WorkEmail,
    ) -> Result<Option<ValidatedPartner>, RepositoryError> {
        Ok(self
            .read()?
            .partners
            .values()
            .find(|partner| &partner.details.work_email == email)
            .cloned())
    }

    fn partners(&self) -> Result<Vec<ValidatedPartner>, RepositoryError> {
        let mut partners: Vec<ValidatedPartner> =
            self.read()?.partners.values().cloned().collect();
        partners.sort_by_key(|partner| partner.approved_at);
        Ok(partners)
    }

    fn partner_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.read()?.partners.len())
    }
}

impl AuditLog for Database {
    fn audit_entries(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self.read()?.audit.clone())
    }
}

impl TransitionStore for Database {
    fn commit(&self, transition: Transition) -> Result<CommitOutcome, RepositoryError> {
        self.write(|tables| tables.apply(transition))
    }
}

impl CompanyStore for Database {
    fn insert_company(&self, company: Company) -> Result<Company, RepositoryError> {
        self.write(|tables| {
            let taken = tables.companies.values().any(|existing| {
                existing
                    .company_name
                    .eq_ignore_ascii_case(&company.company_name)
            });
            if taken || tables.companies.contains_key(&company.id) {
                return Err(RepositoryError::Conflict(format!(
                    "company '{}' already exists",
                    company.company_name
                )));
            }
            tables.companies.insert(company.id, company.clone());
            Ok(Staged::Changed(company))
        })
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.read()?.companies.get(id).cloned())
    }

    fn companies(&self) -> Result<Vec<Company>, RepositoryError> {
        let mut companies: Vec<Company> = self.read()?.companies.values().cloned().collect();
        companies.sort_by_key(|company| company.company_name.to_ascii_lowercase());
        Ok(companies)
    }
}

impl BidStore for Database {
    fn insert_bid(&self, bid: BusinessBid) -> Result<BusinessBid, RepositoryError> {
        self.write(|tables| {
            if tables.bids.contains_key(&bid.id) {
                return Err(RepositoryError::Conflict(format!("bid {} exists", bid.id)));
            }
            tables.bids.insert(bid.id, bid.clone());
            Ok(Staged::Changed(bid))
        })
    }

    fn fetch_bid(&self, id: &BidId) -> Result<Option<BusinessBid>, RepositoryError> {
        Ok(self.read()?.bids.get(id).cloned())
    }

    fn bids(&self) -> Result<Vec<BusinessBid>, RepositoryError> {
        Ok(self.read()?.bids.values().cloned().collect())
    }
}

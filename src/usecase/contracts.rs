use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::customer::{Customer, CustomerProfile},
    domain::deal::{Deal, NewDeal},
    domain::platform::Platform,
    domain::rating::{Rating, RaterKey},
    domain::report::Report,
    repository::errors::RepositoryError,
};

#[cfg_attr(test, mockall::automock)]
pub trait CustomerRepository: Send + Sync {
    /// Returns the customer for `subject`, inserting a shadow record if none exists.
    /// Must be a single atomic statement against the unique subject index.
    async fn resolve_or_create(&self, subject: &str) -> Result<Customer, RepositoryError>;
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Customer>, RepositoryError>;
    async fn create(&self, customer: &Customer) -> Result<(), RepositoryError>;
    /// Sets the credential on an unclaimed customer. `Ok(None)` if it was already claimed.
    async fn claim(
        &self,
        id: Uuid,
        password_hash: &str,
        profile: &CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError>;
    async fn fill_missing_profile(&self, id: Uuid, profile: &CustomerProfile) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait DealRepository: Send + Sync {
    /// Inserts or merges on (platform, external_proof_ref) in one atomic statement.
    async fn upsert(&self, deal: &NewDeal) -> Result<Deal, RepositoryError>;
    /// Moves a PENDING_RATING deal to RATED. `Ok(false)` if it was already rated.
    async fn mark_rated(&self, id: Uuid) -> Result<bool, RepositoryError>;
    /// Puts a RATED deal back to PENDING_RATING.
    async fn reopen(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn find_by_key(&self, platform: Platform, external_proof_ref: &str) -> Result<Option<Deal>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait RatingRepository: Send + Sync {
    async fn create(&self, rating: &Rating) -> Result<(), RepositoryError>;
    async fn exists_for_proof(
        &self,
        customer_id: Uuid,
        proof_ref: &str,
        source: Platform,
        rater: &RaterKey,
    ) -> Result<bool, RepositoryError>;
    async fn exists_by_rater_name_since(
        &self,
        customer_id: Uuid,
        rater_name: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// (average score, count).
    async fn get_aggregate(&self, customer_id: Uuid) -> Result<(f64, i64), RepositoryError>;
    async fn find_by_customer(&self, customer_id: Uuid) -> Result<Vec<Rating>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, report: &Report) -> Result<(), RepositoryError>;
}

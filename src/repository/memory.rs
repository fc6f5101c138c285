//! In-process store for workflow tests. Each method holds the lock for its
//! whole body, which gives the same per-statement atomicity as the unique
//! indexes in Postgres.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::customer::{Customer, CustomerProfile, CustomerState},
    domain::deal::{Deal, DealStatus, NewDeal},
    domain::platform::Platform,
    domain::rating::{Rating, RaterKey},
    domain::report::Report,
    repository::errors::RepositoryError,
    usecase::contracts::{CustomerRepository, DealRepository, RatingRepository, ReportRepository},
};

#[derive(Default)]
struct Tables {
    customers: Vec<Customer>,
    deals: Vec<Deal>,
    ratings: Vec<Rating>,
    reports: Vec<Report>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        f(&mut tables)
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.with(|t| t.customers.clone())
    }

    pub fn deals(&self) -> Vec<Deal> {
        self.with(|t| t.deals.clone())
    }

    pub fn ratings(&self) -> Vec<Rating> {
        self.with(|t| t.ratings.clone())
    }

    pub fn reports(&self) -> Vec<Report> {
        self.with(|t| t.reports.clone())
    }

    /// Moves every stored rating back in time.
    pub fn age_ratings(&self, by: chrono::Duration) {
        self.with(|t| {
            for rating in &mut t.ratings {
                rating.created_at -= by;
            }
        })
    }
}

impl CustomerRepository for MemoryStore {
    async fn resolve_or_create(&self, subject: &str) -> Result<Customer, RepositoryError> {
        self.with(|t| {
            if let Some(existing) = t.customers.iter().find(|c| c.subject == subject) {
                return Ok(existing.clone());
            }
            let customer = Customer::new_shadow(subject);
            t.customers.push(customer.clone());
            Ok(customer)
        })
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<Customer>, RepositoryError> {
        self.with(|t| Ok(t.customers.iter().find(|c| c.subject == subject).cloned()))
    }

    async fn create(&self, customer: &Customer) -> Result<(), RepositoryError> {
        self.with(|t| {
            if t.customers.iter().any(|c| c.subject == customer.subject) {
                return Err(RepositoryError::Conflict("customers_subject_key".to_string()));
            }
            t.customers.push(customer.clone());
            Ok(())
        })
    }

    async fn claim(
        &self,
        id: Uuid,
        password_hash: &str,
        profile: &CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError> {
        self.with(|t| {
            let Some(customer) = t.customers.iter_mut().find(|c| c.id == id) else {
                return Ok(None);
            };
            if customer.is_claimed() {
                return Ok(None);
            }
            let mut merged = profile.clone();
            merged.fill_missing_from(&customer.profile);
            customer.profile = merged;
            customer.state = CustomerState::Claimed {
                password_hash: password_hash.to_string(),
            };
            customer.updated_at = Utc::now();
            Ok(Some(customer.clone()))
        })
    }

    async fn fill_missing_profile(&self, id: Uuid, profile: &CustomerProfile) -> Result<(), RepositoryError> {
        self.with(|t| {
            let customer = t
                .customers
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(RepositoryError::NotFound)?;
            customer.profile.fill_missing_from(profile);
            Ok(())
        })
    }
}

impl DealRepository for MemoryStore {
    async fn upsert(&self, deal: &NewDeal) -> Result<Deal, RepositoryError> {
        self.with(|t| {
            if let Some(existing) = t
                .deals
                .iter_mut()
                .find(|d| d.platform == deal.platform && d.external_proof_ref == deal.external_proof_ref)
            {
                existing.merge_from(deal);
                return Ok(existing.clone());
            }
            let created = deal.clone().into_deal();
            t.deals.push(created.clone());
            Ok(created)
        })
    }

    async fn mark_rated(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.with(|t| {
            let deal = t.deals.iter_mut().find(|d| d.id == id).ok_or(RepositoryError::NotFound)?;
            if deal.status == DealStatus::Rated {
                return Ok(false);
            }
            deal.status = DealStatus::Rated;
            Ok(true)
        })
    }

    async fn reopen(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.with(|t| {
            let deal = t
                .deals
                .iter_mut()
                .find(|d| d.id == id && d.status == DealStatus::Rated)
                .ok_or(RepositoryError::NotFound)?;
            deal.status = DealStatus::PendingRating;
            Ok(())
        })
    }

    async fn find_by_key(&self, platform: Platform, external_proof_ref: &str) -> Result<Option<Deal>, RepositoryError> {
        self.with(|t| {
            Ok(t.deals
                .iter()
                .find(|d| d.platform == platform && d.external_proof_ref == external_proof_ref)
                .cloned())
        })
    }
}

impl RatingRepository for MemoryStore {
    async fn create(&self, rating: &Rating) -> Result<(), RepositoryError> {
        self.with(|t| {
            t.ratings.push(rating.clone());
            Ok(())
        })
    }

    async fn exists_for_proof(
        &self,
        customer_id: Uuid,
        proof_ref: &str,
        source: Platform,
        rater: &RaterKey,
    ) -> Result<bool, RepositoryError> {
        self.with(|t| {
            Ok(t.ratings.iter().any(|r| {
                r.customer_id == customer_id
                    && r.proof_ref.as_deref() == Some(proof_ref)
                    && r.source == source
                    && match rater {
                        RaterKey::Email(email) => r.rater_email.as_deref() == Some(email.as_str()),
                        RaterKey::Name(name) => r.rater_name.as_deref() == Some(name.as_str()),
                    }
            }))
        })
    }

    async fn exists_by_rater_name_since(
        &self,
        customer_id: Uuid,
        rater_name: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.with(|t| {
            Ok(t.ratings.iter().any(|r| {
                r.customer_id == customer_id && r.rater_name.as_deref() == Some(rater_name) && r.created_at >= since
            }))
        })
    }

    async fn get_aggregate(&self, customer_id: Uuid) -> Result<(f64, i64), RepositoryError> {
        self.with(|t| {
            let scores: Vec<f64> = t
                .ratings
                .iter()
                .filter(|r| r.customer_id == customer_id)
                .map(|r| f64::from(r.score))
                .collect();
            if scores.is_empty() {
                return Ok((0.0, 0));
            }
            let count = scores.len() as i64;
            Ok((scores.iter().sum::<f64>() / scores.len() as f64, count))
        })
    }

    async fn find_by_customer(&self, customer_id: Uuid) -> Result<Vec<Rating>, RepositoryError> {
        self.with(|t| {
            let mut ratings: Vec<Rating> = t
                .ratings
                .iter()
                .filter(|r| r.customer_id == customer_id)
                .cloned()
                .collect();
            ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(ratings)
        })
    }
}

impl ReportRepository for MemoryStore {
    async fn create(&self, report: &Report) -> Result<(), RepositoryError> {
        self.with(|t| {
            t.reports.push(report.clone());
            Ok(())
        })
    }
}

use crate::domain::customer::{normalize_subject, Customer, CustomerProfile};
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::CustomerRepository;
use crate::usecase::error::UsecaseError;
use crate::usecase::password::hash_password;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Outcome of a self-registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub customer: Customer,
    /// True when an existing shadow record was claimed.
    pub upgraded: bool,
}

pub struct CustomersUseCase<C>
where
    C: CustomerRepository,
{
    customer_repository: C,
}

impl<C> CustomersUseCase<C>
where
    C: CustomerRepository,
{
    pub fn new(customer_repository: C) -> Self {
        Self { customer_repository }
    }

    fn normalized(subject: &str) -> Result<String, UsecaseError> {
        let normalized = normalize_subject(subject);
        if normalized.is_empty() {
            return Err(UsecaseError::Validation("subject: blank".to_string()));
        }
        Ok(normalized)
    }

    /// Idempotent: the same identifier (modulo case and surrounding whitespace)
    /// always yields the same customer.
    #[tracing::instrument(skip(self), fields(%subject))]
    pub async fn resolve_or_create(&self, subject: &str) -> Result<Customer, UsecaseError> {
        tracing::debug!("resolving subject");

        let subject = Self::normalized(subject)?;
        let customer = self.customer_repository.resolve_or_create(&subject).await?;

        tracing::debug!(customer_id = %customer.id, claimed = customer.is_claimed(), "subject resolved");
        Ok(customer)
    }

    /// Never creates a record.
    #[tracing::instrument(skip(self), fields(%subject))]
    pub async fn find_by_subject(&self, subject: &str) -> Result<Option<Customer>, UsecaseError> {
        let subject = Self::normalized(subject)?;
        Ok(self.customer_repository.find_by_subject(&subject).await?)
    }

    #[tracing::instrument(skip(self), fields(%subject))]
    pub async fn get_customer(&self, subject: &str) -> Result<Customer, UsecaseError> {
        self.find_by_subject(subject)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Customer".to_string()))
    }

    /// Copies counterparty details into empty profile fields of `customer`.
    #[tracing::instrument(skip(self, customer, profile), fields(customer_id = %customer.id))]
    pub async fn fill_missing_profile(
        &self,
        customer: &Customer,
        profile: CustomerProfile,
    ) -> Result<(), UsecaseError> {
        let mut merged = customer.profile.clone();
        merged.fill_missing_from(&profile);
        if merged == customer.profile {
            tracing::debug!("no profile fields to fill");
            return Ok(());
        }

        self.customer_repository
            .fill_missing_profile(customer.id, &profile)
            .await?;

        tracing::info!(customer_id = %customer.id, "customer profile enriched");
        Ok(())
    }

    /// Creates a claimed customer, or claims a shadow record. A subject that
    /// already carries a credential is rejected with `Conflict`.
    #[tracing::instrument(skip(self, password, profile), fields(%subject))]
    pub async fn register(
        &self,
        subject: &str,
        password: &str,
        profile: CustomerProfile,
    ) -> Result<Registration, UsecaseError> {
        tracing::debug!("registering customer");

        let subject = Self::normalized(subject)?;
        let password_len = password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password_len) {
            return Err(UsecaseError::Validation(format!(
                "password: must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = hash_password(password).map_err(|e| UsecaseError::Internal(e.to_string()))?;
        let profile = profile.cleaned();

        let existing = match self.customer_repository.find_by_subject(&subject).await? {
            Some(existing) => existing,
            None => {
                let customer = Customer::new_claimed(&subject, password_hash.clone(), profile.clone());
                match self.customer_repository.create(&customer).await {
                    Ok(()) => {
                        tracing::info!(customer_id = %customer.id, "customer registered");
                        return Ok(Registration {
                            customer,
                            upgraded: false,
                        });
                    }
                    // Someone rated this subject in the meantime; claim their shadow record.
                    Err(RepositoryError::Conflict(_)) => self
                        .customer_repository
                        .find_by_subject(&subject)
                        .await?
                        .ok_or_else(|| UsecaseError::Internal("customer vanished after conflict".to_string()))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if existing.is_claimed() {
            tracing::warn!(customer_id = %existing.id, "registration for already claimed subject");
            return Err(UsecaseError::Conflict("Subject is already registered".to_string()));
        }

        let customer = self
            .customer_repository
            .claim(existing.id, &password_hash, &profile)
            .await?
            .ok_or_else(|| UsecaseError::Conflict("Subject is already registered".to_string()))?;

        tracing::info!(customer_id = %customer.id, "shadow customer claimed");
        Ok(Registration {
            customer,
            upgraded: true,
        })
    }
}

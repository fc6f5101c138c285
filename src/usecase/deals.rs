use uuid::Uuid;

use crate::domain::deal::{Deal, DealEvidence, NewDeal};
use crate::domain::platform::Platform;
use crate::usecase::contracts::DealRepository;
use crate::usecase::error::UsecaseError;

pub struct DealsUseCase<D>
where
    D: DealRepository,
{
    deal_repository: D,
}

impl<D> DealsUseCase<D>
where
    D: DealRepository,
{
    pub fn new(deal_repository: D) -> Self {
        Self { deal_repository }
    }

    /// Upserts the deal a rating refers to. Returns `None` when no known
    /// platform or no proof reference can be derived.
    ///
    /// The platform comes from the evidence when it names a known one, else
    /// from the rating source. The proof reference comes from the evidence,
    /// else from the rating.
    #[tracing::instrument(skip(self, evidence), fields(customer_id = %customer_id, %source, ?proof_ref))]
    pub async fn upsert_for_rating(
        &self,
        customer_id: Uuid,
        source: Platform,
        proof_ref: Option<&str>,
        evidence: Option<&DealEvidence>,
    ) -> Result<Option<Deal>, UsecaseError> {
        let platform = evidence
            .and_then(DealEvidence::platform)
            .filter(Platform::is_known)
            .or_else(|| Some(source).filter(Platform::is_known));
        let external_proof_ref = evidence
            .and_then(DealEvidence::proof_ref)
            .or_else(|| proof_ref.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string));

        let (Some(platform), Some(external_proof_ref)) = (platform, external_proof_ref) else {
            tracing::debug!("no deal key available, skipping deal upsert");
            return Ok(None);
        };

        let empty = DealEvidence::default();
        let new_deal = NewDeal::from_evidence(customer_id, platform, external_proof_ref, evidence.unwrap_or(&empty));
        let deal = self.deal_repository.upsert(&new_deal).await?;

        if deal.customer_id != customer_id {
            tracing::warn!(
                deal_id = %deal.id,
                owner_id = %deal.customer_id,
                customer_id = %customer_id,
                "deal is owned by another customer"
            );
        }

        tracing::info!(deal_id = %deal.id, %platform, created = deal.id == new_deal.id, "deal upserted");
        Ok(Some(deal))
    }

    /// Atomically moves the deal to RATED. Returns true only for the one
    /// rating that closes it. Best-effort: storage failures are logged and
    /// read as "not closed".
    #[tracing::instrument(skip(self), fields(deal_id = %deal_id))]
    pub async fn close_for_rating(&self, deal_id: Uuid) -> bool {
        match self.deal_repository.mark_rated(deal_id).await {
            Ok(true) => {
                tracing::info!(deal_id = %deal_id, "deal marked as rated");
                true
            }
            Ok(false) => {
                tracing::info!(deal_id = %deal_id, "deal already closed by another rating");
                false
            }
            Err(e) => {
                tracing::error!(deal_id = %deal_id, error = %e, "failed to mark deal as rated");
                false
            }
        }
    }

    /// Undoes `close_for_rating` when the closing rating could not be stored.
    #[tracing::instrument(skip(self), fields(deal_id = %deal_id))]
    pub async fn reopen(&self, deal_id: Uuid) {
        if let Err(e) = self.deal_repository.reopen(deal_id).await {
            tracing::error!(deal_id = %deal_id, error = %e, "failed to reopen deal");
        }
    }

    #[tracing::instrument(skip(self), fields(%platform, %external_proof_ref))]
    pub async fn get_deal(&self, platform: Platform, external_proof_ref: &str) -> Result<Deal, UsecaseError> {
        self.deal_repository
            .find_by_key(platform, external_proof_ref.trim())
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Deal".to_string()))
    }
}

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::domain::customer::normalize_subject;
use crate::domain::rating::{mask_email, Rating, RatingSummary};
use crate::domain::submission::{first_validation_error, RatingSubmission};
use crate::usecase::contracts::{CustomerRepository, DealRepository, RatingRepository, ReportRepository};
use crate::usecase::customers::CustomersUseCase;
use crate::usecase::deals::DealsUseCase;
use crate::usecase::duplicates::{assert_not_duplicate, DuplicateCheck};
use crate::usecase::error::UsecaseError;

pub struct RatingsUseCase<C, D, Ra, Rp>
where
    C: CustomerRepository,
    D: DealRepository,
    Ra: RatingRepository,
    Rp: ReportRepository,
{
    customers: CustomersUseCase<C>,
    deals: DealsUseCase<D>,
    rating_repository: Ra,
    report_repository: Rp,
}

impl<C, D, Ra, Rp> RatingsUseCase<C, D, Ra, Rp>
where
    C: CustomerRepository,
    D: DealRepository,
    Ra: RatingRepository,
    Rp: ReportRepository,
{
    pub fn new(customer_repository: C, deal_repository: D, rating_repository: Ra, report_repository: Rp) -> Self {
        Self {
            customers: CustomersUseCase::new(customer_repository),
            deals: DealsUseCase::new(deal_repository),
            rating_repository,
            report_repository,
        }
    }

    pub fn deals(&self) -> &DealsUseCase<D> {
        &self.deals
    }

    /// Validates, resolves the subject, upserts the deal, checks for duplicates,
    /// then stores the rating. The steps run in this order; a deal upserted
    /// before a duplicate rejection stays stored.
    ///
    /// A deal is linked to at most one rating: the one whose submission moves
    /// it from PENDING_RATING to RATED. Later ratings on the same deal are
    /// stored without a deal reference.
    #[tracing::instrument(skip(self, input), fields(rating_value = input.rating))]
    pub async fn submit_rating(&self, input: RatingSubmission) -> Result<Rating, UsecaseError> {
        tracing::debug!("submitting rating");

        if let Err(validation_errors) = input.validate() {
            tracing::debug!(?validation_errors, "rating submission rejected");
            return Err(UsecaseError::Validation(first_validation_error(&validation_errors)));
        }

        let subject = normalize_subject(&input.subject);
        if input.counterparty_email().as_deref() == Some(subject.as_str()) {
            tracing::warn!(%subject, "counterparty email equals rated subject");
            return Err(UsecaseError::SubjectMismatch);
        }

        let customer = self.customers.resolve_or_create(&subject).await?;

        let dossier = input.counterparty.as_ref().map(|c| c.profile()).filter(|p| !p.is_empty());
        if let Some(profile) = dossier {
            if let Err(e) = self
                .customers
                .fill_missing_profile(&customer, profile)
                .await
            {
                tracing::warn!(customer_id = %customer.id, error = %e, "failed to enrich customer profile");
            }
        }

        let source = input.source();
        let proof_ref = input.proof_ref();
        let deal = self
            .deals
            .upsert_for_rating(customer.id, source, proof_ref.as_deref(), input.deal.as_ref())
            .await?;

        let rater_email = input.rater_email();
        let rater_name = input.rater_name();
        assert_not_duplicate(
            &self.rating_repository,
            DuplicateCheck {
                customer_id: customer.id,
                proof_ref: proof_ref.as_deref(),
                source,
                rater_email: rater_email.as_deref(),
                rater_name: rater_name.as_deref(),
            },
            Utc::now(),
        )
        .await?;

        let deal_id = match &deal {
            Some(deal) if self.deals.close_for_rating(deal.id).await => Some(deal.id),
            _ => None,
        };

        let rating = Rating {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            deal_id,
            score: input.rating,
            comment: input.comment(),
            rater_name: rater_name.or_else(|| rater_email.as_deref().map(mask_email)),
            rater_email,
            proof_ref,
            source,
            created_at: Utc::now(),
        };
        if let Err(e) = self.rating_repository.create(&rating).await {
            if let Some(deal_id) = deal_id {
                self.deals.reopen(deal_id).await;
            }
            return Err(e.into());
        }

        if let Some(evidence) = input.report.as_ref().filter(|r| r.should_file()) {
            let report = evidence.to_report(customer.id, rating.id);
            match self.report_repository.create(&report).await {
                Ok(()) => tracing::info!(report_id = %report.id, reason = ?report.reason, "report filed"),
                Err(e) => tracing::error!(rating_id = %rating.id, error = %e, "failed to file report"),
            }
        }

        tracing::info!(
            rating_id = %rating.id,
            customer_id = %customer.id,
            deal_id = ?rating.deal_id,
            source = %rating.source,
            "rating submitted successfully"
        );
        Ok(rating)
    }

    /// Recomputed on every call.
    #[tracing::instrument(skip(self), fields(%subject))]
    pub async fn average_for_subject(&self, subject: &str) -> Result<RatingSummary, UsecaseError> {
        tracing::debug!("computing rating average");

        let Some(customer) = self.customers.find_by_subject(subject).await? else {
            return Ok(RatingSummary::empty());
        };

        let (average, count) = self.rating_repository.get_aggregate(customer.id).await?;
        let summary = RatingSummary::new(count, average);

        tracing::debug!(customer_id = %customer.id, average = summary.average, count, "rating average computed");
        Ok(summary)
    }

    /// Newest first.
    #[tracing::instrument(skip(self), fields(%subject))]
    pub async fn list_for_subject(&self, subject: &str) -> Result<Vec<Rating>, UsecaseError> {
        tracing::debug!("listing ratings");

        let Some(customer) = self.customers.find_by_subject(subject).await? else {
            return Ok(Vec::new());
        };

        let ratings = self.rating_repository.find_by_customer(customer.id).await?;

        tracing::debug!(customer_id = %customer.id, count = ratings.len(), "ratings listed");
        Ok(ratings)
    }
}

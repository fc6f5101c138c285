use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::platform::Platform;
use crate::domain::rating::RaterKey;
use crate::usecase::contracts::RatingRepository;
use crate::usecase::error::UsecaseError;

pub const DUPLICATE_WINDOW_HOURS: i64 = 24;

/// Who is rating whom, as far as duplicate detection is concerned.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateCheck<'a> {
    pub customer_id: Uuid,
    pub proof_ref: Option<&'a str>,
    pub source: Platform,
    pub rater_email: Option<&'a str>,
    pub rater_name: Option<&'a str>,
}

/// Rejects a rating that repeats an earlier one.
///
/// Primary rule: same customer, proof reference and source, from the same
/// rater (email if known, else name) fails with `DuplicateDeal`.
///
/// Secondary rule: the same rater name on the same customer within the last
/// 24 hours fails with `Duplicate24h`, whatever the proof reference.
///
/// A rater with neither email nor name passes both rules.
#[tracing::instrument(skip(ratings, check), fields(customer_id = %check.customer_id))]
pub async fn assert_not_duplicate<Ra>(
    ratings: &Ra,
    check: DuplicateCheck<'_>,
    now: DateTime<Utc>,
) -> Result<(), UsecaseError>
where
    Ra: RatingRepository,
{
    let rater = RaterKey::from_parts(check.rater_email, check.rater_name);

    if let (Some(proof_ref), Some(rater)) = (check.proof_ref, rater.as_ref()) {
        if ratings
            .exists_for_proof(check.customer_id, proof_ref, check.source, rater)
            .await?
        {
            tracing::info!(%proof_ref, source = %check.source, "duplicate rating for deal rejected");
            return Err(UsecaseError::DuplicateDeal);
        }
    }

    if let Some(rater_name) = check.rater_name {
        let since = now - Duration::hours(DUPLICATE_WINDOW_HOURS);
        if ratings
            .exists_by_rater_name_since(check.customer_id, rater_name, since)
            .await?
        {
            tracing::info!(%rater_name, "rating within 24h window rejected");
            return Err(UsecaseError::Duplicate24h);
        }
    }

    if rater.is_none() {
        // TODO: decide whether anonymous raters need their own dedup key.
        tracing::warn!("rater gave neither email nor name, duplicate checks skipped");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::contracts::MockRatingRepository;

    fn check<'a>(customer_id: Uuid) -> DuplicateCheck<'a> {
        DuplicateCheck {
            customer_id,
            proof_ref: Some("ORDER-9"),
            source: Platform::Tradera,
            rater_email: Some("bob@x.com"),
            rater_name: None,
        }
    }

    #[tokio::test]
    async fn test_primary_rule_matches_on_email() {
        let mut mock_repo = MockRatingRepository::new();
        let customer_id = Uuid::new_v4();

        mock_repo
            .expect_exists_for_proof()
            .withf(move |c, proof, source, rater| {
                *c == customer_id
                    && proof == "ORDER-9"
                    && *source == Platform::Tradera
                    && *rater == RaterKey::Email("bob@x.com".to_string())
            })
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let result = assert_not_duplicate(&mock_repo, check(customer_id), Utc::now()).await;

        assert!(matches!(result, Err(UsecaseError::DuplicateDeal)));
    }

    #[tokio::test]
    async fn test_primary_rule_falls_back_to_name() {
        let mut mock_repo = MockRatingRepository::new();
        let customer_id = Uuid::new_v4();

        mock_repo
            .expect_exists_for_proof()
            .withf(|_, _, _, rater| *rater == RaterKey::Name("Bob".to_string()))
            .times(1)
            .returning(|_, _, _, _| Ok(false));
        mock_repo
            .expect_exists_by_rater_name_since()
            .times(1)
            .returning(|_, _, _| Ok(false));

        let input = DuplicateCheck {
            rater_email: None,
            rater_name: Some("Bob"),
            ..check(customer_id)
        };

        assert!(assert_not_duplicate(&mock_repo, input, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_primary_rule_skipped_without_proof_ref() {
        let mut mock_repo = MockRatingRepository::new();
        mock_repo.expect_exists_for_proof().times(0);

        let input = DuplicateCheck {
            proof_ref: None,
            ..check(Uuid::new_v4())
        };

        assert!(assert_not_duplicate(&mock_repo, input, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_secondary_rule_uses_24h_window() {
        let mut mock_repo = MockRatingRepository::new();
        let now = Utc::now();

        mock_repo
            .expect_exists_for_proof()
            .returning(|_, _, _, _| Ok(false));
        mock_repo
            .expect_exists_by_rater_name_since()
            .withf(move |_, name, since| name == "Bob" && *since == now - Duration::hours(24))
            .times(1)
            .returning(|_, _, _| Ok(true));

        let input = DuplicateCheck {
            rater_name: Some("Bob"),
            ..check(Uuid::new_v4())
        };

        let result = assert_not_duplicate(&mock_repo, input, now).await;

        assert!(matches!(result, Err(UsecaseError::Duplicate24h)));
    }

    #[tokio::test]
    async fn test_anonymous_rater_bypasses_both_rules() {
        let mut mock_repo = MockRatingRepository::new();
        mock_repo.expect_exists_for_proof().times(0);
        mock_repo.expect_exists_by_rater_name_since().times(0);

        let input = DuplicateCheck {
            rater_email: None,
            rater_name: None,
            ..check(Uuid::new_v4())
        };

        assert!(assert_not_duplicate(&mock_repo, input, Utc::now()).await.is_ok());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "report_reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportReason {
    Fraud,
    Impersonation,
    NonDelivery,
    Counterfeit,
    PaymentAbuse,
    #[default]
    Other,
}

impl ReportReason {
    /// Strict parse; unknown values fall back to `Other`.
    pub fn parse(text: &str) -> Self {
        let tag = text.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match tag.as_str() {
            "FRAUD" => ReportReason::Fraud,
            "IMPERSONATION" => ReportReason::Impersonation,
            "NON_DELIVERY" => ReportReason::NonDelivery,
            "COUNTERFEIT" => ReportReason::Counterfeit,
            "PAYMENT_ABUSE" => ReportReason::PaymentAbuse,
            _ => ReportReason::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub rating_id: Uuid,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub evidence_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(
        customer_id: Uuid,
        rating_id: Uuid,
        reason: ReportReason,
        details: Option<String>,
        evidence_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            rating_id,
            reason,
            details,
            evidence_url,
            created_at: Utc::now(),
        }
    }
}

/// Report flag carried by a rating submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReportEvidence {
    pub flagged: Option<bool>,
    #[validate(length(max = 64))]
    pub reason: Option<String>,
    #[validate(length(max = 4000))]
    pub text: Option<String>,
    #[validate(url)]
    pub evidence_url: Option<String>,
    pub consent: Option<bool>,
}

impl ReportEvidence {
    fn reason_text(&self) -> Option<&str> {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    fn details(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Filed when flagged or implied by a reason/text, unless consent was withheld.
    pub fn should_file(&self) -> bool {
        let requested = self.flagged == Some(true) || self.reason_text().is_some() || self.details().is_some();
        requested && self.consent != Some(false)
    }

    pub fn to_report(&self, customer_id: Uuid, rating_id: Uuid) -> Report {
        Report::new(
            customer_id,
            rating_id,
            self.reason_text().map(ReportReason::parse).unwrap_or_default(),
            self.details().map(str::to_string),
            self.evidence_url.clone(),
        )
    }
}

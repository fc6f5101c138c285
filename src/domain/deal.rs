use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::platform::Platform;

pub const DEFAULT_CURRENCY: &str = "SEK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "deal_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    PendingRating,
    Rated,
}

/// One verifiable marketplace transaction. Unique per (platform, external_proof_ref).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deal {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub platform: Platform,
    pub external_proof_ref: String,
    pub external_item_id: Option<String>,
    pub page_url: Option<String>,
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub currency: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Amounts arrive either as JSON numbers or as formatted strings like `"1 234,50 kr"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            AmountInput::Number(n) => *n,
            AmountInput::Text(text) => {
                let normalized: String = text
                    .chars()
                    .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
                    .map(|c| if c == ',' { '.' } else { c })
                    .collect();
                normalized.parse::<f64>().ok()?
            }
        };
        value.is_finite().then_some(value)
    }
}

/// Transaction evidence attached to a rating submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct DealEvidence {
    pub platform: Option<String>,
    #[validate(length(max = 200))]
    pub proof_ref: Option<String>,
    #[validate(length(max = 200))]
    pub item_id: Option<String>,
    #[validate(length(max = 2048))]
    pub page_url: Option<String>,
    #[validate(length(max = 500))]
    pub title: Option<String>,
    pub amount: Option<AmountInput>,
    #[validate(length(max = 8))]
    pub currency: Option<String>,
    pub completed_at: Option<String>,
    pub date_iso: Option<String>,
    pub date_text: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl DealEvidence {
    pub fn platform(&self) -> Option<Platform> {
        non_empty(&self.platform).map(|p| Platform::parse(&p))
    }

    pub fn proof_ref(&self) -> Option<String> {
        non_empty(&self.proof_ref)
    }

    /// First parsable of `completed_at`, `date_iso`, `date_text`.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        non_empty(&self.completed_at)
            .and_then(|v| parse_iso_date(&v))
            .or_else(|| non_empty(&self.date_iso).and_then(|v| parse_iso_date(&v)))
            .or_else(|| non_empty(&self.date_text).and_then(|v| parse_text_date(&v)))
    }
}

fn parse_iso_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_text_date(value: &str) -> Option<DateTime<Utc>> {
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%d %B %Y %H:%M"];
    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d %B %Y"];

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Upsert input for a deal. `None` means "not supplied": it never blanks a stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeal {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub platform: Platform,
    pub external_proof_ref: String,
    pub external_item_id: Option<String>,
    pub page_url: Option<String>,
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewDeal {
    pub fn from_evidence(
        customer_id: Uuid,
        platform: Platform,
        external_proof_ref: String,
        evidence: &DealEvidence,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            platform,
            external_proof_ref,
            external_item_id: non_empty(&evidence.item_id),
            page_url: non_empty(&evidence.page_url),
            title: non_empty(&evidence.title),
            amount: evidence.amount.as_ref().and_then(AmountInput::value),
            currency: non_empty(&evidence.currency).map(|c| c.to_uppercase()),
            completed_at: evidence.completed_at(),
            created_at: Utc::now(),
        }
    }

    /// Row inserted when no deal exists for the key yet.
    pub fn into_deal(self) -> Deal {
        Deal {
            id: self.id,
            customer_id: self.customer_id,
            platform: self.platform,
            external_proof_ref: self.external_proof_ref,
            external_item_id: self.external_item_id,
            page_url: self.page_url,
            title: self.title,
            amount: self.amount,
            currency: self.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            completed_at: self.completed_at,
            status: DealStatus::PendingRating,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

impl Deal {
    /// Applies the supplied descriptive fields of `incoming`; absent ones keep their stored value.
    pub fn merge_from(&mut self, incoming: &NewDeal) {
        if incoming.external_item_id.is_some() {
            self.external_item_id.clone_from(&incoming.external_item_id);
        }
        if incoming.page_url.is_some() {
            self.page_url.clone_from(&incoming.page_url);
        }
        if incoming.title.is_some() {
            self.title.clone_from(&incoming.title);
        }
        if incoming.amount.is_some() {
            self.amount = incoming.amount;
        }
        if let Some(currency) = &incoming.currency {
            self.currency.clone_from(currency);
        }
        if incoming.completed_at.is_some() {
            self.completed_at = incoming.completed_at;
        }
        self.updated_at = incoming.created_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_amount_from_number_and_text() {
        assert_eq!(AmountInput::Number(250.0).value(), Some(250.0));
        assert_eq!(AmountInput::Text("1 234,50".to_string()).value(), Some(1234.5));
        assert_eq!(AmountInput::Text("1\u{a0}000 kr".to_string()).value(), Some(1000.0));
        assert_eq!(AmountInput::Text("free".to_string()).value(), None);
    }

    #[test]
    fn test_completed_at_prefers_explicit_field() {
        let evidence = DealEvidence {
            completed_at: Some("2024-05-01T10:00:00Z".to_string()),
            date_iso: Some("2023-01-01".to_string()),
            ..Default::default()
        };

        let completed = evidence.completed_at().unwrap();
        assert_eq!(completed.year(), 2024);
        assert_eq!(completed.hour(), 10);
    }

    #[test]
    fn test_completed_at_falls_back_through_candidates() {
        let evidence = DealEvidence {
            completed_at: Some("not a date".to_string()),
            date_iso: Some("".to_string()),
            date_text: Some("3 March 2024".to_string()),
            ..Default::default()
        };

        let completed = evidence.completed_at().unwrap();
        assert_eq!((completed.year(), completed.month(), completed.day()), (2024, 3, 3));
    }

    #[test]
    fn test_completed_at_unparsable_is_absent() {
        let evidence = DealEvidence {
            date_text: Some("sometime last spring".to_string()),
            ..Default::default()
        };

        assert!(evidence.completed_at().is_none());
    }

    #[test]
    fn test_text_date_formats() {
        assert!(parse_text_date("2024-02-10 14:30").is_some());
        assert!(parse_text_date("10/02/2024").is_some());
        assert!(parse_text_date("10.02.2024").is_some());
        assert!(parse_text_date("31/02/2024").is_none());
    }

    #[test]
    fn test_from_evidence_defaults() {
        let customer_id = Uuid::new_v4();
        let evidence = DealEvidence {
            title: Some("  ".to_string()),
            amount: Some(AmountInput::Text("99,90".to_string())),
            ..Default::default()
        };

        let deal = NewDeal::from_evidence(customer_id, Platform::Tradera, "ORDER-1".to_string(), &evidence).into_deal();

        assert_eq!(deal.customer_id, customer_id);
        assert_eq!(deal.status, DealStatus::PendingRating);
        assert_eq!(deal.currency, DEFAULT_CURRENCY);
        assert_eq!(deal.amount, Some(99.9));
        assert!(deal.title.is_none());
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let customer_id = Uuid::new_v4();
        let mut stored = NewDeal::from_evidence(
            customer_id,
            Platform::Tradera,
            "ORDER-1".to_string(),
            &DealEvidence {
                title: Some("Widget".to_string()),
                currency: Some("eur".to_string()),
                ..Default::default()
            },
        )
        .into_deal();
        let incoming = NewDeal::from_evidence(
            customer_id,
            Platform::Tradera,
            "ORDER-1".to_string(),
            &DealEvidence {
                item_id: Some("ITEM-7".to_string()),
                ..Default::default()
            },
        );

        stored.merge_from(&incoming);

        assert_eq!(stored.title.as_deref(), Some("Widget"));
        assert_eq!(stored.external_item_id.as_deref(), Some("ITEM-7"));
        assert_eq!(stored.currency, "EUR");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::platform::Platform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub score: i16,
    pub comment: Option<String>,
    pub rater_name: Option<String>,
    pub rater_email: Option<String>,
    pub proof_ref: Option<String>,
    pub source: Platform,
    pub created_at: DateTime<Utc>,
}

/// Identity used to match an earlier rating by the same rater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaterKey {
    Email(String),
    Name(String),
}

impl RaterKey {
    /// Email wins over name; `None` when the rater gave neither.
    pub fn from_parts(email: Option<&str>, name: Option<&str>) -> Option<Self> {
        email
            .map(|e| RaterKey::Email(e.to_string()))
            .or_else(|| name.map(|n| RaterKey::Name(n.to_string())))
    }
}

/// `bob@x.com` becomes `b***@x.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: i64,
    pub average: f64,
}

impl RatingSummary {
    pub fn empty() -> Self {
        Self { count: 0, average: 0.0 }
    }

    /// Average is rounded to two decimals.
    pub fn new(count: i64, average: f64) -> Self {
        if count == 0 {
            return Self::empty();
        }
        Self {
            count,
            average: (average * 100.0).round() / 100.0,
        }
    }
}

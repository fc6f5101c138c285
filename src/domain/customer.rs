use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical form of a subject identifier: trimmed and lowercased.
pub fn normalize_subject(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// Whether somebody has registered for this subject.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerState {
    /// Shadow record, created only because someone rated the subject.
    Unclaimed,
    Claimed { password_hash: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

impl CustomerProfile {
    /// Drops blank values so they never overwrite stored data.
    pub fn cleaned(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            email: clean(self.email).map(|e| e.to_lowercase()),
            full_name: clean(self.full_name),
            phone: clean(self.phone),
            address_line: clean(self.address_line),
            postal_code: clean(self.postal_code),
            city: clean(self.city),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.full_name.is_none()
            && self.phone.is_none()
            && self.address_line.is_none()
            && self.postal_code.is_none()
            && self.city.is_none()
    }

    /// Fills fields that are empty here from `other`.
    pub fn fill_missing_from(&mut self, other: &CustomerProfile) {
        fn fill(slot: &mut Option<String>, value: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }

        fill(&mut self.email, &other.email);
        fill(&mut self.full_name, &other.full_name);
        fill(&mut self.phone, &other.phone);
        fill(&mut self.address_line, &other.address_line);
        fill(&mut self.postal_code, &other.postal_code);
        fill(&mut self.city, &other.city);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub subject: String,
    pub profile: CustomerProfile,
    pub state: CustomerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new_shadow(subject: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject: normalize_subject(subject),
            profile: CustomerProfile::default(),
            state: CustomerState::Unclaimed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_claimed(subject: &str, password_hash: String, profile: CustomerProfile) -> Self {
        let mut customer = Self::new_shadow(subject);
        customer.profile = profile;
        customer.state = CustomerState::Claimed { password_hash };
        customer
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self.state, CustomerState::Claimed { .. })
    }

    pub fn password_hash(&self) -> Option<&str> {
        match &self.state {
            CustomerState::Claimed { password_hash } => Some(password_hash),
            CustomerState::Unclaimed => None,
        }
    }
}

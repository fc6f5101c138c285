use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::domain::customer::CustomerProfile;
use crate::domain::deal::DealEvidence;
use crate::domain::platform::Platform;
use crate::domain::report::ReportEvidence;

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Email check on the trimmed value. Blank counts as absent.
pub fn validate_optional_email(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || value.validate_email() {
        return Ok(());
    }
    Err(ValidationError::new("email"))
}

/// The person on the other side of the deal, as described by the rater.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Counterparty {
    #[validate(custom(function = "validate_optional_email"))]
    pub email: Option<String>,
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    pub address_line: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
}

impl Counterparty {
    pub fn profile(&self) -> CustomerProfile {
        CustomerProfile {
            email: self.email.clone(),
            full_name: self.name.clone(),
            phone: self.phone.clone(),
            address_line: self.address_line.clone(),
            postal_code: self.postal_code.clone(),
            city: self.city.clone(),
        }
        .cleaned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RatingSubmission {
    #[validate(length(min = 1, max = 320), custom(function = "validate_not_blank"))]
    pub subject: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 120))]
    pub rater_name: Option<String>,
    #[validate(custom(function = "validate_optional_email"))]
    pub rater_email: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[validate(length(max = 200))]
    pub proof_ref: Option<String>,
    pub source: Option<String>,
    #[validate(nested)]
    pub counterparty: Option<Counterparty>,
    #[validate(nested)]
    pub deal: Option<DealEvidence>,
    #[validate(nested)]
    pub report: Option<ReportEvidence>,
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl RatingSubmission {
    pub fn source(&self) -> Platform {
        self.source.as_deref().map(Platform::parse).unwrap_or_default()
    }

    pub fn rater_email(&self) -> Option<String> {
        trimmed(self.rater_email.as_deref()).map(str::to_lowercase)
    }

    pub fn rater_name(&self) -> Option<String> {
        trimmed(self.rater_name.as_deref()).map(str::to_string)
    }

    pub fn proof_ref(&self) -> Option<String> {
        trimmed(self.proof_ref.as_deref()).map(str::to_string)
    }

    pub fn comment(&self) -> Option<String> {
        trimmed(self.comment.as_deref()).map(str::to_string)
    }

    pub fn counterparty_email(&self) -> Option<String> {
        self.counterparty
            .as_ref()
            .and_then(|c| trimmed(c.email.as_deref()))
            .map(str::to_lowercase)
    }
}

/// Renders the first offending field (in path order) as `field: code`.
pub fn first_validation_error(errors: &ValidationErrors) -> String {
    fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(errs) => {
                    if let Some(err) = errs.first() {
                        out.push(format!("{path}: {}", err.code));
                    }
                }
                ValidationErrorsKind::Struct(inner) => collect(&path, inner, out),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        collect(&format!("{path}[{index}]"), inner, out);
                    }
                }
            }
        }
    }

    let mut messages = Vec::new();
    collect("", errors, &mut messages);
    messages.sort();
    messages
        .into_iter()
        .next()
        .unwrap_or_else(|| "invalid input".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> RatingSubmission {
        RatingSubmission {
            subject: "alice@example.com".to_string(),
            rating: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_submission() {
        assert!(submission().validate().is_ok());
    }

    #[test]
    fn test_rating_out_of_range() {
        let mut input = submission();
        input.rating = 6;

        let errors = input.validate().unwrap_err();
        assert_eq!(first_validation_error(&errors), "rating: range");
    }

    #[test]
    fn test_blank_subject_rejected() {
        let mut input = submission();
        input.subject = "   ".to_string();

        let errors = input.validate().unwrap_err();
        assert_eq!(first_validation_error(&errors), "subject: blank");
    }

    #[test]
    fn test_nested_counterparty_email_rejected() {
        let mut input = submission();
        input.counterparty = Some(Counterparty {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        });

        let errors = input.validate().unwrap_err();
        assert_eq!(first_validation_error(&errors), "counterparty.email: email");
    }

    #[test]
    fn test_comment_too_long() {
        let mut input = submission();
        input.comment = Some("x".repeat(2001));

        let errors = input.validate().unwrap_err();
        assert_eq!(first_validation_error(&errors), "comment: length");
    }

    #[test]
    fn test_padded_rater_email_accepted() {
        let mut input = submission();
        input.rater_email = Some(" Bob@X.com ".to_string());

        assert!(input.validate().is_ok());
        assert_eq!(input.rater_email().as_deref(), Some("bob@x.com"));
    }

    #[test]
    fn test_blank_rater_email_counts_as_absent() {
        let mut input = submission();
        input.rater_email = Some("".to_string());
        input.rater_name = Some("Bob".to_string());
        input.counterparty = Some(Counterparty {
            email: Some("   ".to_string()),
            ..Default::default()
        });

        assert!(input.validate().is_ok());
        assert!(input.rater_email().is_none());
        assert!(input.counterparty_email().is_none());
    }

    #[test]
    fn test_malformed_rater_email_rejected() {
        let mut input = submission();
        input.rater_email = Some(" bob at x ".to_string());

        let errors = input.validate().unwrap_err();
        assert_eq!(first_validation_error(&errors), "rater_email: email");
    }

    #[test]
    fn test_accessors_normalize() {
        let mut input = submission();
        input.rater_email = Some(" Bob@X.com ".to_string());
        input.rater_name = Some("  ".to_string());
        input.source = Some("tradera".to_string());
        input.counterparty = Some(Counterparty {
            email: Some("Carol@Example.com".to_string()),
            ..Default::default()
        });

        assert_eq!(input.rater_email().as_deref(), Some("bob@x.com"));
        assert!(input.rater_name().is_none());
        assert_eq!(input.source(), Platform::Tradera);
        assert_eq!(input.counterparty_email().as_deref(), Some("carol@example.com"));
    }

    #[test]
    fn test_deserialize_with_deal_amount_as_string() {
        let input: RatingSubmission = serde_json::from_str(
            r#"{
                "subject": "alice@example.com",
                "rating": 4,
                "source": "TRADERA",
                "deal": { "proof_ref": "ORDER-1", "amount": "1 200,00", "title": "Widget" }
            }"#,
        )
        .unwrap();

        assert!(input.validate().is_ok());
        let deal = input.deal.unwrap();
        assert_eq!(deal.proof_ref().as_deref(), Some("ORDER-1"));
        assert_eq!(deal.amount.and_then(|a| a.value()), Some(1200.0));
    }
}

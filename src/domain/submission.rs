//! User-proposed tool listings and their intake validation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SubmissionId;
use crate::error::FieldError;

/// Listing tier requested by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free listing, reviewed in the normal queue.
    Free,
    /// Paid fast-track review.
    Priority,
    /// Paid review plus a featured listing.
    Premium,
}

impl Tier {
    /// Stable lowercase name used in storage and provider metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Priority => "priority",
            Self::Premium => "premium",
        }
    }

    /// Whether this tier requires payment.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "priority" => Ok(Self::Priority),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Lifecycle status of a [`Submission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Awaiting moderation (and, for paid tiers, payment).
    Pending,
    /// Promoted into a public tool. Terminal.
    Approved,
    /// Payment failed.
    Failed,
}

impl SubmissionStatus {
    /// Stable lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

/// A stored submission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// Opaque identity.
    pub id: SubmissionId,
    /// Proposed tool name.
    pub tool_name: String,
    /// Proposed description.
    pub description: String,
    /// Canonical website URL.
    pub website_url: String,
    /// Category label.
    pub category: String,
    /// Pricing label shown on the listing (e.g. `"freemium"`).
    pub pricing: String,
    /// Submitter contact email.
    pub email: String,
    /// Requested tier.
    pub tier: Tier,
    /// Amount due in cents.
    pub amount_cents: i64,
    /// Lifecycle status.
    pub status: SubmissionStatus,
    /// Provider payment reference once paid (or once payment failed).
    pub payment_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A validated submission ready to be inserted as `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    /// Identity assigned at intake.
    pub id: SubmissionId,
    /// Trimmed tool name.
    pub tool_name: String,
    /// Trimmed description.
    pub description: String,
    /// Normalised website URL.
    pub website_url: String,
    /// Trimmed category.
    pub category: String,
    /// Trimmed pricing label.
    pub pricing: String,
    /// Lowercased email.
    pub email: String,
    /// Requested tier.
    pub tier: Tier,
    /// Amount due in cents.
    pub amount_cents: i64,
}

/// Raw, untrusted intake payload.
///
/// Every field is optional so that a missing field surfaces as a field
/// error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    /// Proposed tool name.
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Proposed description.
    #[serde(default)]
    pub description: Option<String>,
    /// Website URL.
    #[serde(default)]
    pub website_url: Option<String>,
    /// Category label.
    #[serde(default)]
    pub category: Option<String>,
    /// Pricing label.
    #[serde(default)]
    pub pricing: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Requested tier (defaults to `free`).
    #[serde(default)]
    pub tier: Option<String>,
    /// Amount in cents (defaults to 0).
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    /// Hidden form field; humans leave it empty.
    #[serde(default)]
    pub website: Option<String>,
}

/// Tool name length bounds, in characters.
pub const TOOL_NAME_CHARS: (usize, usize) = (2, 100);
/// Description length bounds, in characters.
pub const DESCRIPTION_CHARS: (usize, usize) = (10, 2000);
const LABEL_MAX_CHARS: usize = 50;
const EMAIL_MAX_CHARS: usize = 254;
const URL_MAX_CHARS: usize = 2048;

impl SubmissionPayload {
    /// True when the honeypot field carries any non-whitespace content.
    #[must_use]
    pub fn honeypot_tripped(&self) -> bool {
        self.website.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Validates every field and returns either the insertable submission
    /// or the complete list of field errors.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per violated field.
    pub fn validate(&self) -> Result<NewSubmission, Vec<FieldError>> {
        let mut errors = Vec::new();

        let tool_name = text(&self.tool_name);
        check_len(&mut errors, "toolName", tool_name, TOOL_NAME_CHARS);

        let description = text(&self.description);
        check_len(&mut errors, "description", description, DESCRIPTION_CHARS);

        let website_url = match normalize_url(text(&self.website_url)) {
            Some(url) => url,
            None => {
                errors.push(FieldError::new("websiteUrl", "must be a valid http(s) URL"));
                String::new()
            }
        };

        let category = text(&self.category);
        check_len(&mut errors, "category", category, (1, LABEL_MAX_CHARS));

        let pricing = text(&self.pricing);
        check_len(&mut errors, "pricing", pricing, (1, LABEL_MAX_CHARS));

        let email = text(&self.email).to_lowercase();
        if !is_valid_email(&email) {
            errors.push(FieldError::new("email", "must be a valid email address"));
        }

        let tier = match self.tier.as_deref().map(str::trim) {
            None | Some("") => Some(Tier::Free),
            Some(raw) => raw.parse::<Tier>().ok(),
        };
        if tier.is_none() {
            errors.push(FieldError::new("tier", "must be one of free, priority, premium"));
        }

        let amount_cents = match &self.amount {
            None | Some(serde_json::Value::Null) => Some(0),
            Some(value) => value.as_i64(),
        };
        match (tier, amount_cents) {
            (_, None) => errors.push(FieldError::new("amount", "must be a whole number of cents")),
            (_, Some(a)) if a < 0 => errors.push(FieldError::new("amount", "must not be negative")),
            (Some(Tier::Free), Some(a)) if a != 0 => {
                errors.push(FieldError::new("amount", "must be 0 for the free tier"));
            }
            (Some(t), Some(0)) if t.is_paid() => {
                errors.push(FieldError::new("amount", "must be positive for paid tiers"));
            }
            _ => {}
        }

        match (tier, amount_cents) {
            (Some(tier), Some(amount_cents)) if errors.is_empty() => Ok(NewSubmission {
                id: SubmissionId::new(),
                tool_name: tool_name.to_string(),
                description: description.to_string(),
                website_url,
                category: category.to_string(),
                pricing: pricing.to_string(),
                email,
                tier,
                amount_cents,
            }),
            _ => Err(errors),
        }
    }
}

fn text(field: &Option<String>) -> &str {
    field.as_deref().map(str::trim).unwrap_or_default()
}

fn check_len(errors: &mut Vec<FieldError>, field: &str, value: &str, (min, max): (usize, usize)) {
    let len = value.chars().count();
    if len < min || len > max {
        let message = if min <= 1 {
            format!("is required and must be at most {max} characters")
        } else {
            format!("must be between {min} and {max} characters")
        };
        errors.push(FieldError::new(field, message));
    }
}

/// Parses an absolute http(s) URL with a host and returns its serialized
/// form, or `None` if it is not acceptable.
#[must_use]
pub fn normalize_url(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.chars().count() > URL_MAX_CHARS {
        return None;
    }
    let parsed = url::Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed.to_string())
}

/// Structural email check: one `@`, a non-empty local part, a dotted domain
/// made of alphanumerics and hyphens, no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().count() > EMAIL_MAX_CHARS {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn valid_payload() -> SubmissionPayload {
        SubmissionPayload {
            tool_name: Some("Test Tool".to_string()),
            description: Some("A tool that writes tests for you.".to_string()),
            website_url: Some("https://example.com".to_string()),
            category: Some("coding".to_string()),
            pricing: Some("free".to_string()),
            email: Some("test@example.com".to_string()),
            ..SubmissionPayload::default()
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn happy_path_defaults_to_free() {
        let Ok(new) = valid_payload().validate() else {
            panic!("expected valid payload");
        };
        assert_eq!(new.tier, Tier::Free);
        assert_eq!(new.amount_cents, 0);
        assert_eq!(new.website_url, "https://example.com/");
    }

    #[test]
    fn tool_name_boundary() {
        let mut p = valid_payload();
        p.tool_name = Some("A".to_string());
        let Err(errors) = p.validate() else {
            panic!("one-char name must be rejected");
        };
        assert_eq!(fields(&errors), vec!["toolName"]);

        p.tool_name = Some("AB".to_string());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn description_boundary() {
        let mut p = valid_payload();
        p.description = Some("123456789".to_string());
        assert!(p.validate().is_err());

        p.description = Some("1234567890".to_string());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn invalid_payload_reports_every_field() {
        let p = SubmissionPayload {
            tool_name: Some("A".to_string()),
            description: Some("Short".to_string()),
            website_url: Some("not-a-url".to_string()),
            category: Some(String::new()),
            pricing: Some(String::new()),
            email: Some("not-an-email".to_string()),
            ..SubmissionPayload::default()
        };
        let Err(errors) = p.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(
            fields(&errors),
            vec!["toolName", "description", "websiteUrl", "category", "pricing", "email"]
        );
    }

    #[test]
    fn bad_email_rejected_even_when_rest_is_valid() {
        for bad in ["a@b", "@example.com", "a b@example.com", "a@@example.com", "a@-x.com"] {
            let mut p = valid_payload();
            p.email = Some(bad.to_string());
            let Err(errors) = p.validate() else {
                panic!("{bad} must be rejected");
            };
            assert_eq!(fields(&errors), vec!["email"]);
        }
    }

    #[test]
    fn non_http_url_rejected() {
        let mut p = valid_payload();
        p.website_url = Some("javascript:alert(1)".to_string());
        assert!(p.validate().is_err());
    }

    #[test]
    fn amount_must_match_tier() {
        let mut p = valid_payload();
        p.amount = Some(serde_json::json!(500));
        let Err(errors) = p.validate() else {
            panic!("free tier with amount must be rejected");
        };
        assert_eq!(fields(&errors), vec!["amount"]);

        p.tier = Some("premium".to_string());
        let Ok(new) = p.validate() else {
            panic!("premium with amount is valid");
        };
        assert_eq!(new.tier, Tier::Premium);

        p.amount = None;
        assert!(p.validate().is_err());

        p.amount = Some(serde_json::json!(-5));
        assert!(p.validate().is_err());
    }

    #[test]
    fn unknown_tier_rejected() {
        let mut p = valid_payload();
        p.tier = Some("gold".to_string());
        let Err(errors) = p.validate() else {
            panic!("unknown tier must be rejected");
        };
        assert_eq!(fields(&errors), vec!["tier"]);
    }

    #[test]
    fn honeypot_detection() {
        let mut p = valid_payload();
        assert!(!p.honeypot_tripped());
        p.website = Some("   ".to_string());
        assert!(!p.honeypot_tripped());
        p.website = Some("http://spam.example".to_string());
        assert!(p.honeypot_tripped());
    }
}

//! Hosted checkout for sponsorships and paid submissions.
//!
//! No local row is written here. Everything reconciliation needs later is
//! encoded into provider metadata via [`CheckoutIntent`].

use std::sync::Arc;

use crate::config::{PriceTable, is_http_origin};
use crate::domain::submission::{is_valid_email, normalize_url};
use crate::domain::{Placement, SponsorshipIntent, SubmissionId, SubmissionStatus};
use crate::error::{AppError, FieldError};
use crate::payments::{
    CheckoutIntent, CheckoutMode, CheckoutSession, CheckoutSessionRequest, PaymentProvider,
};
use crate::persistence::RecordStore;

const SPONSOR_NAME_MAX_CHARS: usize = 100;
/// Provider metadata values are capped at 500 characters.
const SPONSOR_COPY_MAX_CHARS: usize = 500;

/// A sponsorship purchase request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SponsorshipCheckout {
    /// Requested placement name.
    pub placement: String,
    /// Target tool, required for tool-scoped placements.
    pub tool_slug: Option<String>,
    /// Sponsor display name.
    pub sponsor_name: Option<String>,
    /// Sponsor landing page.
    pub sponsor_url: Option<String>,
    /// Sponsor contact email; prefilled at checkout.
    pub sponsor_email: Option<String>,
    /// Ad copy.
    pub sponsor_copy: Option<String>,
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SponsorshipCheckout {
    /// Checks the sponsor fields and normalizes them.
    fn validate(&self) -> Result<(Placement, SponsorshipIntent), Vec<FieldError>> {
        let mut errors = Vec::new();
        let placement = self.placement.trim().parse::<Placement>().ok();
        if placement.is_none() {
            errors.push(FieldError::new(
                "placement",
                "must be one of newsletter, featured_spotlight, sidebar_ad",
            ));
        }
        let tool_slug = trimmed(self.tool_slug.as_ref());
        if placement.is_some_and(Placement::requires_tool) && tool_slug.is_none() {
            errors.push(FieldError::new("toolSlug", "is required for this placement"));
        }

        let sponsor_name = trimmed(self.sponsor_name.as_ref());
        if sponsor_name
            .as_ref()
            .is_some_and(|n| n.chars().count() > SPONSOR_NAME_MAX_CHARS)
        {
            errors.push(FieldError::new(
                "sponsorName",
                format!("must be at most {SPONSOR_NAME_MAX_CHARS} characters"),
            ));
        }
        let sponsor_url = match trimmed(self.sponsor_url.as_ref()) {
            None => None,
            Some(raw) => {
                let normalized = normalize_url(&raw);
                if normalized.is_none() {
                    errors.push(FieldError::new("sponsorUrl", "must be a valid http(s) URL"));
                }
                normalized
            }
        };
        let sponsor_email = trimmed(self.sponsor_email.as_ref()).map(|e| e.to_lowercase());
        if sponsor_email.as_deref().is_some_and(|e| !is_valid_email(e)) {
            errors.push(FieldError::new("sponsorEmail", "must be a valid email address"));
        }
        let sponsor_copy = trimmed(self.sponsor_copy.as_ref());
        if sponsor_copy
            .as_ref()
            .is_some_and(|c| c.chars().count() > SPONSOR_COPY_MAX_CHARS)
        {
            errors.push(FieldError::new(
                "sponsorCopy",
                format!("must be at most {SPONSOR_COPY_MAX_CHARS} characters"),
            ));
        }

        match placement {
            Some(placement) if errors.is_empty() => Ok((
                placement,
                SponsorshipIntent {
                    placement,
                    tool_slug,
                    tool_id: None,
                    sponsor_name,
                    sponsor_url,
                    sponsor_email,
                    sponsor_copy,
                },
            )),
            _ => Err(errors),
        }
    }
}

/// Starts provider checkout sessions.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn PaymentProvider>,
    prices: PriceTable,
    public_base_url: String,
}

impl CheckoutService {
    /// Creates a new `CheckoutService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn PaymentProvider>,
        prices: PriceTable,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            prices,
            public_base_url: public_base_url.into(),
        }
    }

    /// Redirect base: the request origin when it is a usable http(s)
    /// origin, the configured public URL otherwise.
    fn redirect_base(&self, origin: Option<&str>) -> String {
        origin
            .map(|o| o.trim().trim_end_matches('/'))
            .filter(|o| is_http_origin(o))
            .unwrap_or(self.public_base_url.as_str())
            .trim_end_matches('/')
            .to_string()
    }

    /// Creates a subscription checkout for a placement.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for bad sponsor fields or a tool-scoped
    ///   placement without `toolSlug`.
    /// - [`AppError::ToolNotFound`] for an unknown tool slug.
    /// - [`AppError::NotConfigured`] when the placement has no price.
    /// - [`AppError::Payment`] when the provider call fails.
    pub async fn create_sponsorship_checkout(
        &self,
        request: &SponsorshipCheckout,
        origin: Option<&str>,
    ) -> Result<CheckoutSession, AppError> {
        let (placement, mut intent) = request.validate().map_err(AppError::Validation)?;
        let price_id = self
            .prices
            .for_placement(placement)
            .ok_or_else(|| AppError::NotConfigured(format!("price for placement {placement}")))?
            .to_string();

        if let Some(slug) = intent.tool_slug.clone() {
            let mut session = self.store.begin().await?;
            let tool = session
                .tool_by_slug(&slug)
                .await?
                .ok_or(AppError::ToolNotFound(slug))?;
            intent.tool_id = Some(tool.id);
        }

        let base = self.redirect_base(origin);
        let customer_email = intent.sponsor_email.clone();
        let checkout = CheckoutSessionRequest {
            mode: CheckoutMode::Subscription,
            price_id,
            customer_email,
            success_url: format!("{base}/advertise/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/advertise?canceled=1"),
            metadata: CheckoutIntent::Sponsorship(intent).to_metadata(),
        };
        let session = self.provider.create_checkout_session(&checkout).await?;
        tracing::info!(
            session_id = %session.id,
            placement = %placement,
            "sponsorship checkout created"
        );
        Ok(session)
    }

    /// Creates a one-time payment checkout for a pending paid submission.
    ///
    /// # Errors
    ///
    /// - [`AppError::SubmissionNotFound`] for an unknown id.
    /// - [`AppError::InvalidRequest`] for a free or non-pending submission.
    /// - [`AppError::NotConfigured`] when the tier has no price.
    /// - [`AppError::Payment`] when the provider call fails.
    pub async fn create_submission_checkout(
        &self,
        id: SubmissionId,
        origin: Option<&str>,
    ) -> Result<CheckoutSession, AppError> {
        let submission = {
            let mut session = self.store.begin().await?;
            session
                .submission_for_update(id)
                .await?
                .ok_or(AppError::SubmissionNotFound(*id.as_uuid()))?
        };
        if !submission.tier.is_paid() {
            return Err(AppError::InvalidRequest(
                "free submissions need no payment".to_string(),
            ));
        }
        if submission.status != SubmissionStatus::Pending {
            return Err(AppError::InvalidRequest(format!(
                "submission is {}, not pending",
                submission.status
            )));
        }
        let price_id = self
            .prices
            .for_tier(submission.tier)
            .ok_or_else(|| AppError::NotConfigured(format!("price for tier {}", submission.tier)))?
            .to_string();

        let base = self.redirect_base(origin);
        let checkout = CheckoutSessionRequest {
            mode: CheckoutMode::Payment,
            price_id,
            customer_email: Some(submission.email.clone()),
            success_url: format!("{base}/submit/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/submit?canceled=1"),
            metadata: CheckoutIntent::SubmissionPayment {
                submission_id: submission.id,
                tier: submission.tier,
            }
            .to_metadata(),
        };
        let session = self.provider.create_checkout_session(&checkout).await?;
        tracing::info!(
            session_id = %session.id,
            submission_id = %submission.id,
            tier = %submission.tier,
            "submission checkout created"
        );
        Ok(session)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{NewSubmission, NewTool, Tier};
    use crate::persistence::MemoryStore;
    use crate::service::fakes::FakeProvider;

    fn prices() -> PriceTable {
        PriceTable {
            newsletter: Some("price_newsletter".to_string()),
            sidebar_ad: Some("price_sidebar".to_string()),
            premium: Some("price_premium".to_string()),
            ..PriceTable::default()
        }
    }

    fn service(store: &MemoryStore, provider: &Arc<FakeProvider>) -> CheckoutService {
        CheckoutService::new(
            Arc::new(store.clone()),
            Arc::clone(provider) as Arc<dyn PaymentProvider>,
            prices(),
            "https://vibestack.dev",
        )
    }

    async fn seed_tool(store: &MemoryStore, slug: &str) -> crate::domain::Tool {
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let new = NewTool {
            id: crate::domain::ToolId::new(),
            slug: slug.to_string(),
            title: "Cursor".to_string(),
            description: "AI code editor.".to_string(),
            category: "coding".to_string(),
            pricing: "freemium".to_string(),
            website_url: format!("https://{slug}.dev/"),
            affiliate_url: None,
            features: Vec::new(),
            pros: Vec::new(),
            cons: Vec::new(),
            color: crate::domain::tool::DEFAULT_COLOR.to_string(),
            gradient: crate::domain::tool::DEFAULT_GRADIENT.to_string(),
            tier: Tier::Free,
            is_featured: false,
            source_submission_id: None,
        };
        let Ok(Some(tool)) = session.insert_tool_if_absent(&new).await else {
            panic!("tool insert failed");
        };
        assert!(session.commit().await.is_ok());
        tool
    }

    #[tokio::test]
    async fn newsletter_checkout_encodes_intent() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let request = SponsorshipCheckout {
            placement: "newsletter".to_string(),
            sponsor_name: Some("Acme".to_string()),
            sponsor_email: Some("Ads@Acme.dev".to_string()),
            ..SponsorshipCheckout::default()
        };
        let Ok(session) = service(&store, &provider)
            .create_sponsorship_checkout(&request, Some("https://preview.vibestack.dev/"))
            .await
        else {
            panic!("checkout failed");
        };
        assert!(session.url.starts_with("https://"));

        let requests = provider.checkout_requests().await;
        let Some(sent) = requests.first() else {
            panic!("provider not called");
        };
        assert_eq!(sent.mode, CheckoutMode::Subscription);
        assert_eq!(sent.price_id, "price_newsletter");
        assert_eq!(sent.customer_email.as_deref(), Some("ads@acme.dev"));
        assert!(sent.success_url.starts_with("https://preview.vibestack.dev/advertise/success"));
        assert_eq!(sent.metadata.get("type").map(String::as_str), Some("sponsorship"));
        assert_eq!(sent.metadata.get("placement").map(String::as_str), Some("newsletter"));
        assert!(store.sponsorships().await.is_empty());
    }

    #[tokio::test]
    async fn tool_scoped_placement_resolves_tool() {
        let store = MemoryStore::new();
        let tool = seed_tool(&store, "cursor").await;
        let provider = Arc::new(FakeProvider::default());
        let request = SponsorshipCheckout {
            placement: "sidebar_ad".to_string(),
            tool_slug: Some("cursor".to_string()),
            ..SponsorshipCheckout::default()
        };
        let result = service(&store, &provider)
            .create_sponsorship_checkout(&request, Some("null"))
            .await;
        assert!(result.is_ok());
        let requests = provider.checkout_requests().await;
        let Some(sent) = requests.first() else {
            panic!("provider not called");
        };
        assert_eq!(sent.metadata.get("toolId"), Some(&tool.id.to_string()));
        assert!(sent.cancel_url.starts_with("https://vibestack.dev/advertise"));
    }

    #[tokio::test]
    async fn tool_scoped_placement_needs_slug_and_known_tool() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let checkout = service(&store, &provider);

        let missing = SponsorshipCheckout {
            placement: "sidebar_ad".to_string(),
            ..SponsorshipCheckout::default()
        };
        assert!(matches!(
            checkout.create_sponsorship_checkout(&missing, None).await,
            Err(AppError::Validation(_))
        ));

        let unknown = SponsorshipCheckout {
            tool_slug: Some("ghost".to_string()),
            ..missing
        };
        assert!(matches!(
            checkout.create_sponsorship_checkout(&unknown, None).await,
            Err(AppError::ToolNotFound(_))
        ));
        assert!(provider.checkout_requests().await.is_empty());
    }

    #[tokio::test]
    async fn unpriced_placement_is_not_configured() {
        let store = MemoryStore::new();
        seed_tool(&store, "cursor").await;
        let provider = Arc::new(FakeProvider::default());
        let request = SponsorshipCheckout {
            placement: "featured_spotlight".to_string(),
            tool_slug: Some("cursor".to_string()),
            ..SponsorshipCheckout::default()
        };
        let result = service(&store, &provider)
            .create_sponsorship_checkout(&request, None)
            .await;
        assert!(matches!(result, Err(AppError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_payment_error() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::failing());
        let request = SponsorshipCheckout {
            placement: "newsletter".to_string(),
            ..SponsorshipCheckout::default()
        };
        let result = service(&store, &provider)
            .create_sponsorship_checkout(&request, None)
            .await;
        assert!(matches!(result, Err(AppError::Payment(_))));
    }

    #[tokio::test]
    async fn submission_checkout_only_for_pending_paid() {
        let store = MemoryStore::new();
        let provider = Arc::new(FakeProvider::default());
        let checkout = service(&store, &provider);

        let mut ids = Vec::new();
        for (tier, amount) in [(Tier::Premium, 9_900), (Tier::Free, 0)] {
            let Ok(mut session) = store.begin().await else {
                panic!("begin failed");
            };
            let new = NewSubmission {
                id: SubmissionId::new(),
                tool_name: "Paid Tool".to_string(),
                description: "A tool that pays for placement.".to_string(),
                website_url: "https://paid.dev/".to_string(),
                category: "coding".to_string(),
                pricing: "paid".to_string(),
                email: "maker@example.com".to_string(),
                tier,
                amount_cents: amount,
            };
            assert!(session.insert_submission(&new).await.is_ok());
            assert!(session.commit().await.is_ok());
            ids.push(new.id);
        }
        let [premium, free] = ids.as_slice() else {
            panic!("expected two submissions");
        };

        assert!(checkout.create_submission_checkout(*premium, None).await.is_ok());
        assert!(matches!(
            checkout.create_submission_checkout(*free, None).await,
            Err(AppError::InvalidRequest(_))
        ));

        let requests = provider.checkout_requests().await;
        let Some(sent) = requests.first() else {
            panic!("provider not called");
        };
        assert_eq!(sent.mode, CheckoutMode::Payment);
        assert_eq!(sent.metadata.get("type").map(String::as_str), Some("submission"));
        assert_eq!(sent.metadata.get("tier").map(String::as_str), Some("premium"));
    }
}

//! Promotion engine: turns an approved submission into a public tool.
//!
//! Promotion is idempotent by source submission and by website URL. Slug
//! uniqueness is enforced by
//! the store; this code only probes for a free candidate and retries when an
//! insert loses a race.

use crate::domain::tool::{base_slug, slug_candidate};
use crate::domain::{NewTool, Submission, Tool};
use crate::error::AppError;
use crate::persistence::RecordSession;

/// Upper bound on slug probes for one promotion.
pub const MAX_SLUG_ATTEMPTS: u32 = 1_000;

/// The tool already listed for `submission`: the one promoted from it, else
/// the one with its website URL. Never creates anything.
///
/// # Errors
///
/// Returns [`AppError::PersistenceError`] on store failure.
pub async fn existing_tool(
    session: &mut dyn RecordSession,
    submission: &Submission,
) -> Result<Option<Tool>, AppError> {
    if let Some(tool) = session.tool_by_source_submission(submission.id).await? {
        return Ok(Some(tool));
    }
    session.tool_by_website_url(&submission.website_url).await
}

/// Returns the tool for `submission`, creating it unless one was already
/// promoted from it or shares its website URL.
///
/// The new tool gets the first free slug among `base`, `base-2`, `base-3`,
/// ... and is featured iff the submission tier is premium. Runs inside the
/// caller's session and does not commit.
///
/// # Errors
///
/// Returns [`AppError::PersistenceError`] on store failure and
/// [`AppError::Internal`] if no free slug is found within
/// [`MAX_SLUG_ATTEMPTS`].
pub async fn promote(
    session: &mut dyn RecordSession,
    submission: &Submission,
) -> Result<Tool, AppError> {
    let base = base_slug(&submission.tool_name, submission.id);
    let mut attempt = 1;
    while attempt <= MAX_SLUG_ATTEMPTS {
        // Re-checked on every pass: a concurrent promotion of the same
        // submission or URL shows up here after our insert loses to it.
        if let Some(existing) = existing_tool(session, submission).await? {
            tracing::debug!(
                submission_id = %submission.id,
                tool_id = %existing.id,
                slug = %existing.slug,
                "tool already listed, reusing"
            );
            return Ok(existing);
        }

        let candidate = slug_candidate(&base, attempt);
        if session.tool_by_slug(&candidate).await?.is_none() {
            let new_tool = NewTool::from_submission(submission, candidate);
            if let Some(tool) = session.insert_tool_if_absent(&new_tool).await? {
                tracing::info!(
                    submission_id = %submission.id,
                    tool_id = %tool.id,
                    slug = %tool.slug,
                    featured = tool.is_featured,
                    "tool created from submission"
                );
                return Ok(tool);
            }
        }
        attempt += 1;
    }
    Err(AppError::Internal(format!(
        "no free slug for {base:?} after {MAX_SLUG_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{SubmissionId, SubmissionStatus, Tier};
    use crate::persistence::{MemoryStore, RecordStore};

    fn submission(name: &str, url: &str, tier: Tier) -> Submission {
        let now = Utc::now();
        Submission {
            id: SubmissionId::new(),
            tool_name: name.to_string(),
            description: "An AI tool used in tests.".to_string(),
            website_url: url.to_string(),
            category: "coding".to_string(),
            pricing: "free".to_string(),
            email: "maker@example.com".to_string(),
            tier,
            amount_cents: if tier.is_paid() { 4_900 } else { 0 },
            status: SubmissionStatus::Pending,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn promote_committed(store: &MemoryStore, submission: &Submission) -> Tool {
        let Ok(mut session) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(tool) = promote(session.as_mut(), submission).await else {
            panic!("promotion failed");
        };
        assert!(session.commit().await.is_ok());
        tool
    }

    #[tokio::test]
    async fn promotion_is_idempotent_by_url() {
        let store = MemoryStore::new();
        let sub = submission("Test Tool", "https://test.dev/", Tier::Free);
        let first = promote_committed(&store, &sub).await;
        let second = promote_committed(&store, &sub).await;
        assert_eq!(first.id, second.id);
        assert_eq!(store.tools().await.len(), 1);
    }

    #[tokio::test]
    async fn changed_url_still_reuses_tool_of_same_submission() {
        let store = MemoryStore::new();
        let original = submission("Test Tool", "https://test.dev/", Tier::Free);
        let first = promote_committed(&store, &original).await;

        let mut moved = original.clone();
        moved.website_url = "https://moved.dev/".to_string();
        let second = promote_committed(&store, &moved).await;

        assert_eq!(first.id, second.id);
        assert_eq!(store.tools().await.len(), 1);
    }

    #[tokio::test]
    async fn same_url_under_another_name_reuses_tool() {
        let store = MemoryStore::new();
        let first = promote_committed(&store, &submission("Test Tool", "https://test.dev/", Tier::Free)).await;
        let second =
            promote_committed(&store, &submission("Renamed", "https://test.dev/", Tier::Premium)).await;
        assert_eq!(first.id, second.id);
        assert_eq!(second.slug, "test-tool");
        assert!(!second.is_featured);
    }

    #[tokio::test]
    async fn colliding_names_get_increasing_suffixes() {
        let store = MemoryStore::new();
        let a = promote_committed(&store, &submission("Test Tool", "https://a.dev/", Tier::Free)).await;
        let b = promote_committed(&store, &submission("Test Tool", "https://b.dev/", Tier::Free)).await;
        let c = promote_committed(&store, &submission("test tool!", "https://c.dev/", Tier::Free)).await;
        assert_eq!(a.slug, "test-tool");
        assert_eq!(b.slug, "test-tool-2");
        assert_eq!(c.slug, "test-tool-3");
    }

    #[tokio::test]
    async fn premium_tier_is_featured_with_defaults() {
        let store = MemoryStore::new();
        let tool =
            promote_committed(&store, &submission("Shiny", "https://shiny.dev/", Tier::Premium)).await;
        assert!(tool.is_featured);
        assert_eq!(tool.tier, Tier::Premium);
        assert_eq!(tool.color, crate::domain::tool::DEFAULT_COLOR);
        assert!(tool.features.is_empty() && tool.pros.is_empty() && tool.cons.is_empty());
    }

    #[tokio::test]
    async fn uncommitted_promotion_leaves_no_tool() {
        let store = MemoryStore::new();
        {
            let Ok(mut session) = store.begin().await else {
                panic!("begin failed");
            };
            let sub = submission("Test Tool", "https://test.dev/", Tier::Free);
            assert!(promote(session.as_mut(), &sub).await.is_ok());
        }
        assert!(store.tools().await.is_empty());
    }
}

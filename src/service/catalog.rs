//! Read side: public tool catalog and live sponsorship lookup.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{Placement, Sponsorship, Tool};
use crate::error::AppError;
use crate::persistence::{Page, RecordStore};

/// Read-only queries over listed tools and sponsorships.
#[derive(Debug, Clone)]
pub struct CatalogService {
    store: Arc<dyn RecordStore>,
}

impl CatalogService {
    /// Creates a new `CatalogService`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Lists tools, featured first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] on store failure.
    pub async fn list_tools(&self, limit: i64, offset: i64) -> Result<Page<Tool>, AppError> {
        let mut session = self.store.begin().await?;
        session.list_tools(limit, offset).await
    }

    /// Looks up one tool by slug.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ToolNotFound`] for an unknown slug.
    pub async fn tool_by_slug(&self, slug: &str) -> Result<Tool, AppError> {
        let mut session = self.store.begin().await?;
        session
            .tool_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::ToolNotFound(slug.to_string()))
    }

    /// The sponsorship currently shown in a placement, if any.
    ///
    /// Tool-scoped placements need `tool_slug`; the newsletter ignores it.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidRequest`] when a tool-scoped placement is
    ///   queried without a slug.
    /// - [`AppError::ToolNotFound`] for an unknown slug.
    pub async fn active_sponsorship(
        &self,
        placement: Placement,
        tool_slug: Option<&str>,
    ) -> Result<Option<Sponsorship>, AppError> {
        let mut session = self.store.begin().await?;
        let tool_id = match (placement.requires_tool(), tool_slug) {
            (false, _) => None,
            (true, None) => {
                return Err(AppError::InvalidRequest(format!(
                    "placement {placement} requires toolSlug"
                )));
            }
            (true, Some(slug)) => Some(
                session
                    .tool_by_slug(slug)
                    .await?
                    .ok_or_else(|| AppError::ToolNotFound(slug.to_string()))?
                    .id,
            ),
        };
        session.active_sponsorship(placement, tool_id, Utc::now()).await
    }
}

//! Service layer: business logic orchestration.
//!
//! Each service owns an `Arc<dyn RecordStore>` and opens one session per
//! operation. Services that cause notifications publish on the
//! [`super::domain::EventBus`] only after their session has committed.
//!
//! - [`IntakeService`] accepts public submissions.
//! - [`ModerationService`] approves them via [`promotion::promote`].
//! - [`CheckoutService`] starts provider checkout sessions.
//! - [`ReconciliationService`] applies provider webhooks.
//! - [`CatalogService`] serves the read side.

pub mod catalog;
pub mod checkout;
pub mod intake;
pub mod moderation;
pub mod promotion;
pub mod reconciliation;

pub use catalog::CatalogService;
pub use checkout::{CheckoutService, SponsorshipCheckout};
pub use intake::IntakeService;
pub use moderation::{Approval, ApprovalSource, ModerationService};
pub use reconciliation::{ReconcileOutcome, ReconciliationService};

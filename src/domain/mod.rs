//! Domain layer: entities, identifiers, and the event system.
//!
//! This module contains the directory's record types (submissions, tools,
//! sponsorships, webhook audit rows), their validation and slug rules, and
//! the event bus that decouples notifications from state transitions.

pub mod directory_event;
pub mod event_bus;
pub mod ids;
pub mod sponsorship;
pub mod submission;
pub mod tool;
pub mod webhook_event;

pub use directory_event::DirectoryEvent;
pub use event_bus::EventBus;
pub use ids::{SponsorshipId, SubmissionId, ToolId, WebhookEventId};
pub use sponsorship::{
    Placement, Sponsorship, SponsorshipIntent, SponsorshipStatus, SponsorshipUpsert,
};
pub use submission::{NewSubmission, Submission, SubmissionPayload, SubmissionStatus, Tier};
pub use tool::{NewTool, Tool};
pub use webhook_event::{WebhookClaim, WebhookEvent, WebhookEventStatus, WebhookStats};

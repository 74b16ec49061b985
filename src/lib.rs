//! # vibestack-core
//!
//! Back-end core of the VibeStack AI tools directory: public tool
//! submissions, moderation and promotion into listed tools, sponsorship and
//! paid-listing checkout, payment webhook reconciliation, and notifications.
//!
//! ## Architecture
//!
//! ```text
//! Clients (site, admin, payment provider)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── Intake / Moderation / Checkout / Reconciliation / Catalog (service/)
//!     │       └── Promotion engine (service/promotion)
//!     ├── EventBus (domain/) ──► NotificationDispatcher (notify/)
//!     │                               ├── Resend email
//!     │                               └── Slack webhook
//!     ├── PaymentProvider (payments/) ──► Stripe REST API
//!     │
//!     └── RecordStore (persistence/)
//!             ├── PostgreSQL
//!             └── in-memory
//! ```
//!
//! State transitions happen inside one [`persistence::RecordSession`];
//! domain events are published only after it commits.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod payments;
pub mod persistence;
pub mod service;

//! Data Transfer Objects for REST request/response serialization.
//!
//! JSON bodies use camelCase field names. Domain records are converted
//! with `From` impls so storage types never leak onto the wire.

pub mod common_dto;
pub mod sponsorship_dto;
pub mod submission_dto;
pub mod tool_dto;
pub mod webhook_dto;

pub use common_dto::*;
pub use sponsorship_dto::*;
pub use submission_dto::*;
pub use tool_dto::*;
pub use webhook_dto::*;

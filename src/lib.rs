//! Invite Service
//!
//! Registration and invitation rendering service. Accepts a submission
//! (name, attributes, and a profile photo as a data URL) over a single HTTP
//! endpoint, uploads the photo to an object store, appends an invite record
//! to an append-only tabular store, and returns a personalized invitation
//! image containing the photo, a scannable QR code, and overlaid text.
//!
//! ## Pipeline
//!
//! ```text
//! POST /api/v1/invites
//!        │
//!        ▼
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Decode       │───▶│ Upload photo │───▶│ Append       │
//! │ data URL     │    │ (S3)         │    │ record (PG)  │
//! └──────────────┘    └──────────────┘    └──────────────┘
//!                                                │
//!                                                ▼
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ base64 PNG   │◀───│ Composite    │◀───│ Derive ID,   │
//! │ response     │    │ invitation   │    │ generate QR  │
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! Steps are strictly sequential with no rollback: a failure after the
//! upload leaves the asset (and possibly the record) in place while the
//! caller receives the uniform error response.

pub mod api;
pub mod asset_store;
pub mod compositor;
pub mod config;
pub mod invite_id;
pub mod pipeline;
pub mod record_store;
pub mod scannable;
pub mod submission;

pub use api::{create_router, start_api_server, AppState};
pub use asset_store::{AssetStore, S3AssetStore};
pub use compositor::{Compositor, InviteCard};
pub use config::Config;
pub use invite_id::invite_id;
pub use pipeline::{RenderedInvite, SubmissionPipeline};
pub use record_store::{PgRecordStore, RecordStore};
pub use submission::{InviteRecord, Submission, SubmissionRequest};

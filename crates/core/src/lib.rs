//! # medrec core
//!
//! Core logic for filling in, validating and exporting joint medical recommendation forms.
//!
//! This crate contains three cooperating pieces that share one data model:
//! - A shared context store that independent forms read at start and write back to at end
//!   ([`shared_context`], [`prefill`])
//! - A validation engine whose errors route back to form sections ([`validation`],
//!   [`sections`])
//! - An asynchronous export pipeline ([`export`]) driven by a [`FormSession`]
//!
//! **No UI or file format concerns**: rendering the document and delivering it to the user
//! are collaborators supplied by the host through [`DocumentRenderer`] and
//! [`DocumentDelivery`].

pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod prefill;
pub mod record;
pub mod sections;
pub mod session;
pub mod shared_context;
pub mod validation;

pub use config::{form_code_from_env_value, CoreConfig};
pub use error::{CoreError, CoreResult, EditError};
pub use export::{
    DocumentDelivery, DocumentHandle, DocumentRenderer, ExportFailure, ExportFilename,
    ExportPipeline, RecordSnapshot,
};
pub use prefill::{prefill, sync_back, sync_back_to_store};
pub use record::{FieldValue, FormField, FormRecord};
pub use sections::{Section, SectionSummary};
pub use session::{ExportOutcome, ExportRequest, FormSession};
pub use shared_context::{InMemorySharedContext, SharedContext, SharedContextStore, SourceTag};
pub use validation::{validate, FieldError};

// Re-export validated value types so callers need only depend on this crate.
pub use medrec_types::{AgeError, EmailAddress, EmailError, NonEmptyText, PatientAge, TextError};

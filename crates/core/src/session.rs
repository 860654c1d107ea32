//! Form sessions.
//!
//! A [`FormSession`] is the command interface a UI drives for one form instance:
//!
//! ```text
//! start/resume ──► prefill from shared context (once)
//!      │
//!      ├── on_field_changed(field, value)      edit the record
//!      ├── validate / section_summaries        derived state, on demand
//!      ├── request_export                      spawn background export
//!      ├── process_export_completions          apply results on the session's loop
//!      │
//! finish ─────► sync record back to shared context
//! ```
//!
//! All session state is mutated on the caller's task. The export task only sees an
//! immutable [`RecordSnapshot`] and reports back over a oneshot channel created for that
//! export; the session applies the result the next time its owner drains completions.
//! The session never holds the sending half, so an export task that is dropped without
//! reporting (a stopped runtime, a panic) closes the channel and is applied as
//! [`ExportFailure::Worker`].

use crate::config::CoreConfig;
use crate::error::EditError;
use crate::export::{DocumentHandle, ExportFailure, ExportPipeline, RecordSnapshot};
use crate::prefill::{prefill, sync_back_to_store};
use crate::record::{FieldValue, FormField, FormRecord};
use crate::sections::{self, Progress, RoutedErrors, Section, SectionSummary};
use crate::shared_context::{FieldGroup, SharedContextStore};
use crate::validation::{validate, FieldError};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::Instrument;
use uuid::Uuid;

/// Result of asking a session to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportRequest {
    Started,
    /// An export is already running; nothing was started.
    AlreadyExporting,
}

/// How a finished export ended, as applied to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Ready,
    Failed,
}

#[derive(Debug)]
struct ExportCompletion {
    result: Result<DocumentHandle, ExportFailure>,
}

impl ExportCompletion {
    fn abandoned() -> Self {
        Self {
            result: Err(ExportFailure::Worker(
                "export task ended without reporting a result".into(),
            )),
        }
    }
}

/// One form being filled in.
pub struct FormSession {
    id: Uuid,
    cfg: Arc<CoreConfig>,
    store: Arc<dyn SharedContextStore>,
    pipeline: ExportPipeline,
    runtime: Handle,
    record: FormRecord,
    errors: Vec<FieldError>,
    document: Option<DocumentHandle>,
    export_failure: Option<ExportFailure>,
    /// Set while an export is in flight.
    pending_export: Option<oneshot::Receiver<ExportCompletion>>,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("id", &self.id)
            .field("form_code", self.cfg.form_code())
            .field("exporting", &self.is_exporting())
            .finish_non_exhaustive()
    }
}

impl FormSession {
    /// Starts a session with an empty record, prefilled from the shared context.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration (form code and provenance tag)
    /// * `store` - The process-wide shared context
    /// * `pipeline` - Export pipeline used by [`request_export`](Self::request_export)
    /// * `runtime` - Runtime the background export is spawned on
    pub fn start(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn SharedContextStore>,
        pipeline: ExportPipeline,
        runtime: Handle,
    ) -> Self {
        Self::resume(FormRecord::default(), cfg, store, pipeline, runtime)
    }

    /// Starts a session from a saved draft.
    ///
    /// Prefill still runs, but only fills fields the draft left empty.
    pub fn resume(
        draft: FormRecord,
        cfg: Arc<CoreConfig>,
        store: Arc<dyn SharedContextStore>,
        pipeline: ExportPipeline,
        runtime: Handle,
    ) -> Self {
        let id = Uuid::new_v4();
        let record = prefill(draft, &store.read());

        tracing::info!(session_id = %id, form_code = %cfg.form_code(), "form session started");

        Self {
            id,
            cfg,
            store,
            pipeline,
            runtime,
            record,
            errors: Vec::new(),
            document: None,
            export_failure: None,
            pending_export: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    /// Applies a user edit to the record.
    pub fn on_field_changed(&mut self, field: FormField, value: FieldValue) -> Result<(), EditError> {
        self.record.apply(field, value).inspect_err(|e| {
            tracing::debug!(session_id = %self.id, field = %field, error = %e, "edit rejected");
        })
    }

    /// Re-runs validation and publishes the result.
    pub fn validate(&mut self) -> &[FieldError] {
        self.errors = validate(&self.record);
        &self.errors
    }

    /// The most recently published validation errors.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn routed_errors(&self) -> RoutedErrors {
        sections::route_errors(&self.errors)
    }

    pub fn section_summaries(&self) -> Vec<SectionSummary> {
        sections::section_summaries(&self.record, &self.errors)
    }

    /// Fields to highlight when `section` is opened.
    pub fn highlighted_fields(&self, section: Section) -> BTreeSet<&'static str> {
        sections::highlighted_fields(section, &self.errors)
    }

    pub fn progress(&self) -> Progress {
        sections::progress(&self.record)
    }

    pub fn is_exporting(&self) -> bool {
        self.pending_export.is_some()
    }

    /// The last successfully exported document.
    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }

    /// Why the last export failed, if it did.
    pub fn export_failure(&self) -> Option<&ExportFailure> {
        self.export_failure.as_ref()
    }

    /// Validates, then starts a background export of the current record.
    ///
    /// Validation errors are published but do not stop the export. While an export is in
    /// flight further requests are ignored.
    pub fn request_export(&mut self) -> ExportRequest {
        if self.is_exporting() {
            tracing::debug!(session_id = %self.id, "export already in progress");
            return ExportRequest::AlreadyExporting;
        }

        let error_count = self.validate().len();
        if error_count > 0 {
            tracing::info!(
                session_id = %self.id,
                error_count,
                "exporting with validation errors"
            );
        }

        self.export_failure = None;

        let snapshot = RecordSnapshot::capture(&self.record, self.cfg.form_code().clone(), Utc::now());
        let pipeline = self.pipeline.clone();
        let (completion_tx, completion_rx) = oneshot::channel();
        self.pending_export = Some(completion_rx);
        let span = tracing::info_span!("export", session_id = %self.id);

        self.runtime.spawn(
            async move {
                let result = pipeline.run(snapshot).await;
                if completion_tx.send(ExportCompletion { result }).is_err() {
                    tracing::debug!("session ended before export completed");
                }
            }
            .instrument(span),
        );

        ExportRequest::Started
    }

    /// Applies the in-flight export's result if it has arrived, without waiting.
    pub fn process_export_completions(&mut self) -> Option<ExportOutcome> {
        let completion = match self.pending_export.as_mut()?.try_recv() {
            Ok(completion) => completion,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => ExportCompletion::abandoned(),
        };
        self.pending_export = None;
        Some(self.apply_completion(completion))
    }

    /// Waits for the in-flight export to finish and applies its result.
    ///
    /// Returns `None` immediately when no export is running.
    pub async fn next_export_completion(&mut self) -> Option<ExportOutcome> {
        let pending = self.pending_export.as_mut()?;
        let completion = pending.await.unwrap_or_else(|_| ExportCompletion::abandoned());
        self.pending_export = None;
        Some(self.apply_completion(completion))
    }

    fn apply_completion(&mut self, completion: ExportCompletion) -> ExportOutcome {
        match completion.result {
            Ok(handle) => {
                tracing::info!(session_id = %self.id, filename = %handle.filename, "export ready");
                self.document = Some(handle);
                self.export_failure = None;
                ExportOutcome::Ready
            }
            Err(failure) => {
                tracing::warn!(session_id = %self.id, error = %failure, "export failed");
                self.export_failure = Some(failure);
                ExportOutcome::Failed
            }
        }
    }

    /// Hands the last exported document to the delivery collaborator for sharing.
    ///
    /// Returns false when there is nothing to present.
    pub fn present_document(&self) -> bool {
        match &self.document {
            Some(handle) => {
                self.pipeline.present(handle);
                true
            }
            None => false,
        }
    }

    /// Ends the session, copying the record back into the shared context.
    ///
    /// Returns the field groups that were written.
    pub fn finish(self) -> Vec<FieldGroup> {
        if self.is_exporting() {
            tracing::debug!(session_id = %self.id, "session finished with export in flight");
        }
        let groups = sync_back_to_store(&self.record, self.store.as_ref(), self.cfg.source_tag());
        tracing::info!(session_id = %self.id, groups = ?groups, "form session finished");
        groups
    }
}

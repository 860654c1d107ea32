//! Document export.
//!
//! The pipeline turns an immutable [`RecordSnapshot`] into a delivered document:
//!
//! 1. the [`DocumentRenderer`] produces document bytes on a blocking worker;
//! 2. no bytes (or empty bytes) is a [`ExportFailure::Render`] and nothing is persisted;
//! 3. otherwise the bytes are handed to the [`DocumentDelivery`] under a filename of the
//!    form `Form_<Code>_<yyyyMMdd_HHmmss>.docx` (local time), also on a blocking worker;
//! 4. delivery returns a [`DocumentHandle`] or an I/O error
//!    ([`ExportFailure::Persistence`]).
//!
//! The pipeline owns no session state. Gating re-entry and publishing the outcome is the
//! job of [`FormSession`](crate::session::FormSession).

use crate::constants::{EXPORT_FILENAME_PREFIX, EXPORT_FILE_EXTENSION, EXPORT_TIMESTAMP_FORMAT};
use crate::record::FormRecord;
use crate::NonEmptyText;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// A read-only copy of a record taken when export was requested.
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    record: Arc<FormRecord>,
    form_code: NonEmptyText,
    captured_at: DateTime<Utc>,
}

impl RecordSnapshot {
    pub fn capture(record: &FormRecord, form_code: NonEmptyText, captured_at: DateTime<Utc>) -> Self {
        Self {
            record: Arc::new(record.clone()),
            form_code,
            captured_at,
        }
    }

    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    pub fn form_code(&self) -> &NonEmptyText {
        &self.form_code
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Filename stamped with the capture time on the local clock.
    pub fn filename(&self) -> ExportFilename {
        ExportFilename::new(&self.form_code, self.captured_at.with_timezone(&Local))
    }
}

/// Filename of an exported document: `Form_<Code>_<yyyyMMdd_HHmmss>.docx`.
///
/// The timestamp is the wall-clock time of `at` in its own zone, with no offset in the
/// name. The snapshot keeps the UTC instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFilename(String);

impl ExportFilename {
    pub fn new<Tz>(form_code: &NonEmptyText, at: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self(format!(
            "{}_{}_{}.{}",
            EXPORT_FILENAME_PREFIX,
            form_code,
            at.format(EXPORT_TIMESTAMP_FORMAT),
            EXPORT_FILE_EXTENSION
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The filename without its extension.
    pub fn stem(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ExportFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted document, ready to be shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub filename: String,
    pub location: PathBuf,
}

/// Encodes a record snapshot into document bytes.
///
/// Returning `None` signals that no document could be produced.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, snapshot: &RecordSnapshot) -> Option<Vec<u8>>;
}

/// Saves rendered documents and hands them to the user.
pub trait DocumentDelivery: Send + Sync {
    fn persist(&self, bytes: &[u8], filename: &str) -> io::Result<DocumentHandle>;

    /// Presents a saved document, e.g. in a share sheet.
    fn present(&self, handle: &DocumentHandle);
}

#[derive(Debug, thiserror::Error)]
pub enum ExportFailure {
    #[error("the document could not be generated")]
    Render,
    #[error("the document {filename} could not be saved: {source}")]
    Persistence {
        filename: String,
        #[source]
        source: io::Error,
    },
    #[error("the export stopped unexpectedly: {0}")]
    Worker(String),
}

/// Renders and delivers record snapshots.
#[derive(Clone)]
pub struct ExportPipeline {
    renderer: Arc<dyn DocumentRenderer>,
    delivery: Arc<dyn DocumentDelivery>,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline").finish_non_exhaustive()
    }
}

impl ExportPipeline {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, delivery: Arc<dyn DocumentDelivery>) -> Self {
        Self { renderer, delivery }
    }

    /// Renders `snapshot` and persists the result.
    ///
    /// Both collaborator calls run on tokio's blocking pool, so the caller's task is never
    /// blocked by a slow renderer or disk.
    pub async fn run(&self, snapshot: RecordSnapshot) -> Result<DocumentHandle, ExportFailure> {
        let filename = snapshot.filename();
        tracing::info!(filename = %filename, "rendering document");

        let renderer = Arc::clone(&self.renderer);
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&snapshot))
            .await
            .map_err(|e| ExportFailure::Worker(e.to_string()))?;

        let bytes = match rendered {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                tracing::warn!(filename = %filename, "renderer returned no document");
                return Err(ExportFailure::Render);
            }
        };

        let delivery = Arc::clone(&self.delivery);
        let name = filename.as_str().to_string();
        let persisted = tokio::task::spawn_blocking(move || delivery.persist(&bytes, &name))
            .await
            .map_err(|e| ExportFailure::Worker(e.to_string()))?;

        match persisted {
            Ok(handle) => {
                tracing::info!(
                    filename = %filename,
                    location = %handle.location.display(),
                    "document saved"
                );
                Ok(handle)
            }
            Err(source) => {
                tracing::warn!(filename = %filename, error = %source, "failed to save document");
                Err(ExportFailure::Persistence {
                    filename: filename.as_str().to_string(),
                    source,
                })
            }
        }
    }

    pub fn present(&self, handle: &DocumentHandle) {
        self.delivery.present(handle);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Renderer returning fixed output, optionally waiting for a release signal first.
    pub(crate) struct StubRenderer {
        output: Option<Vec<u8>>,
        gate: Option<Mutex<std::sync::mpsc::Receiver<()>>>,
        pub(crate) calls: AtomicUsize,
    }

    impl StubRenderer {
        pub(crate) fn returning(output: Option<Vec<u8>>) -> Self {
            Self {
                output,
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Blocks each render until a value is sent on the returned sender.
        pub(crate) fn gated(output: Option<Vec<u8>>) -> (Self, std::sync::mpsc::Sender<()>) {
            let (tx, rx) = std::sync::mpsc::channel();
            let renderer = Self {
                output,
                gate: Some(Mutex::new(rx)),
                calls: AtomicUsize::new(0),
            };
            (renderer, tx)
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DocumentRenderer for StubRenderer {
        fn render(&self, _snapshot: &RecordSnapshot) -> Option<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _ = gate.lock().expect("gate lock").recv();
            }
            self.output.clone()
        }
    }

    /// Delivery that records every persisted file in memory.
    #[derive(Default)]
    pub(crate) struct RecordingDelivery {
        pub(crate) saved: Mutex<Vec<(String, Vec<u8>)>>,
        pub(crate) presented: Mutex<Vec<DocumentHandle>>,
        pub(crate) fail_with: Option<io::ErrorKind>,
    }

    impl RecordingDelivery {
        pub(crate) fn failing(kind: io::ErrorKind) -> Self {
            Self {
                fail_with: Some(kind),
                ..Self::default()
            }
        }

        pub(crate) fn saved_count(&self) -> usize {
            self.saved.lock().expect("saved lock").len()
        }
    }

    impl DocumentDelivery for RecordingDelivery {
        fn persist(&self, bytes: &[u8], filename: &str) -> io::Result<DocumentHandle> {
            if let Some(kind) = self.fail_with {
                return Err(io::Error::new(kind, "write refused"));
            }
            self.saved
                .lock()
                .expect("saved lock")
                .push((filename.to_string(), bytes.to_vec()));
            Ok(DocumentHandle {
                filename: filename.to_string(),
                location: PathBuf::from("/tmp").join(filename),
            })
        }

        fn present(&self, handle: &DocumentHandle) {
            self.presented
                .lock()
                .expect("presented lock")
                .push(handle.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::FixedOffset;

    fn snapshot() -> RecordSnapshot {
        let mut record = FormRecord::default();
        record.patient.name = "Jane Doe".into();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 5, 7).unwrap();
        RecordSnapshot::capture(&record, NonEmptyText::new("A3").unwrap(), at)
    }

    #[test]
    fn filename_follows_fixed_pattern() {
        let code = NonEmptyText::new("A3").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 5, 7).unwrap();

        let filename = ExportFilename::new(&code, at);
        assert_eq!(filename.as_str(), "Form_A3_20261019_090507.docx");
        assert_eq!(filename.stem(), "Form_A3_20261019_090507");
    }

    #[test]
    fn filename_uses_wall_clock_of_the_given_zone() {
        let code = NonEmptyText::new("A3").unwrap();
        let london_summer = FixedOffset::east_opt(3600).unwrap();
        let at = Utc
            .with_ymd_and_hms(2026, 6, 30, 23, 30, 0)
            .unwrap()
            .with_timezone(&london_summer);

        assert_eq!(
            ExportFilename::new(&code, at).as_str(),
            "Form_A3_20260701_003000.docx"
        );
    }

    #[test]
    fn snapshot_filename_is_local_time() {
        let snapshot = snapshot();
        let local = snapshot.captured_at().with_timezone(&Local);
        assert_eq!(
            snapshot.filename(),
            ExportFilename::new(snapshot.form_code(), local)
        );
    }

    #[test]
    fn snapshot_is_detached_from_the_live_record() {
        let mut record = FormRecord::default();
        record.patient.name = "Before".into();
        let snapshot = RecordSnapshot::capture(&record, NonEmptyText::new("A3").unwrap(), Utc::now());

        record.patient.name = "After".into();
        assert_eq!(snapshot.record().patient.name, "Before");
    }

    #[tokio::test]
    async fn run_persists_rendered_bytes() {
        let renderer = Arc::new(StubRenderer::returning(Some(b"docx".to_vec())));
        let delivery = Arc::new(RecordingDelivery::default());
        let pipeline = ExportPipeline::new(renderer.clone(), delivery.clone());

        let snapshot = snapshot();
        let expected = snapshot.filename();
        let handle = pipeline.run(snapshot).await.expect("export should succeed");

        assert_eq!(handle.filename, expected.as_str());
        assert_eq!(renderer.calls(), 1);
        let saved = delivery.saved.lock().unwrap();
        assert_eq!(saved.as_slice(), &[(handle.filename.clone(), b"docx".to_vec())]);
    }

    #[tokio::test]
    async fn run_reports_render_failure_without_persisting() {
        for output in [None, Some(Vec::new())] {
            let renderer = Arc::new(StubRenderer::returning(output));
            let delivery = Arc::new(RecordingDelivery::default());
            let pipeline = ExportPipeline::new(renderer, delivery.clone());

            let err = pipeline.run(snapshot()).await.expect_err("render should fail");
            assert!(matches!(err, ExportFailure::Render));
            assert_eq!(delivery.saved_count(), 0, "nothing should be persisted");
        }
    }

    #[tokio::test]
    async fn run_reports_persistence_failure_with_reason() {
        let renderer = Arc::new(StubRenderer::returning(Some(b"docx".to_vec())));
        let delivery = Arc::new(RecordingDelivery::failing(io::ErrorKind::PermissionDenied));
        let pipeline = ExportPipeline::new(renderer, delivery);

        let snapshot = snapshot();
        let expected = snapshot.filename();
        let err = pipeline.run(snapshot).await.expect_err("persist should fail");
        match err {
            ExportFailure::Persistence { filename, source } => {
                assert_eq!(filename, expected.as_str());
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected persistence failure, got {other:?}"),
        }
    }

    #[test]
    fn present_delegates_to_delivery() {
        let delivery = Arc::new(RecordingDelivery::default());
        let pipeline = ExportPipeline::new(
            Arc::new(StubRenderer::returning(None)),
            delivery.clone(),
        );
        let handle = DocumentHandle {
            filename: "Form_A3_20261019_090507.docx".into(),
            location: PathBuf::from("/tmp/Form_A3_20261019_090507.docx"),
        };

        pipeline.present(&handle);
        assert_eq!(delivery.presented.lock().unwrap().as_slice(), &[handle]);
    }
}

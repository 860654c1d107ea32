//! Host-side collaborators for the export pipeline.
//!
//! The CLI has no DOCX encoder, so [`YamlRenderer`] writes a YAML rendering of the
//! snapshot instead. [`DirectoryDelivery`] saves documents into an output directory and
//! "presents" them by printing their path.

use chrono::{DateTime, Utc};
use medrec_core::{DocumentDelivery, DocumentHandle, DocumentRenderer, FormRecord, RecordSnapshot};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Serialize)]
struct RenderedForm<'a> {
    form_code: &'a str,
    captured_at: DateTime<Utc>,
    labels: CodedLabels,
    record: &'a FormRecord,
}

/// Human-readable text for the coded fields, as printed on the form.
#[derive(Serialize)]
struct CodedLabels {
    gender: &'static str,
    ethnicity: &'static str,
    diagnosis_block: Option<&'static str>,
}

impl CodedLabels {
    fn for_record(record: &FormRecord) -> Self {
        Self {
            gender: record.patient.gender.label(),
            ethnicity: record.patient.ethnicity.label(),
            diagnosis_block: record.clinical_reasons.diagnosis_code.icd10_block(),
        }
    }
}

#[derive(Debug, Default)]
pub struct YamlRenderer;

impl DocumentRenderer for YamlRenderer {
    fn render(&self, snapshot: &RecordSnapshot) -> Option<Vec<u8>> {
        let rendered = RenderedForm {
            form_code: snapshot.form_code().as_str(),
            captured_at: snapshot.captured_at(),
            labels: CodedLabels::for_record(snapshot.record()),
            record: snapshot.record(),
        };

        match serde_yaml::to_string(&rendered) {
            Ok(yaml) => Some(yaml.into_bytes()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to render form as YAML");
                None
            }
        }
    }
}

/// Writes documents into a single directory.
#[derive(Debug)]
pub struct DirectoryDelivery {
    output_dir: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

impl DocumentDelivery for DirectoryDelivery {
    fn persist(&self, bytes: &[u8], filename: &str) -> io::Result<DocumentHandle> {
        if filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing unsafe document filename: {filename}"),
            ));
        }

        fs::create_dir_all(&self.output_dir)?;
        let location = self.output_dir.join(filename);
        fs::write(&location, bytes)?;

        Ok(DocumentHandle {
            filename: filename.to_string(),
            location,
        })
    }

    fn present(&self, handle: &DocumentHandle) {
        println!("Document ready: {}", handle.location.display());
    }
}

//! Form sections and the field-to-section index.
//!
//! Sections are a derived view used to route validation errors to the part of the form
//! that caused them. The index is a static table keyed by field identifier, so it works
//! for any error list, including errors whose field is not on the form at all. Those are
//! "unroutable": they stay in the raw error list but have no section to jump to.

use crate::record::{is_blank, FormField, FormRecord};
use crate::validation::FieldError;
use std::collections::{BTreeMap, BTreeSet};

/// The sections of the form, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Patient,
    PractitionerOne,
    PractitionerTwo,
    ClinicalOpinion,
    Signatures,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Self::Patient,
        Self::PractitionerOne,
        Self::PractitionerTwo,
        Self::ClinicalOpinion,
        Self::Signatures,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::PractitionerOne => "Practitioner 1",
            Self::PractitionerTwo => "Practitioner 2",
            Self::ClinicalOpinion => "Clinical Opinion",
            Self::Signatures => "Signatures",
        }
    }

    /// Field identifiers that belong to this section, in form order.
    pub fn field_keys(self) -> impl Iterator<Item = &'static str> {
        FIELD_SECTION_INDEX
            .iter()
            .filter(move |(_, section)| *section == self)
            .map(|(key, _)| *key)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Every field identifier mapped to exactly one section.
pub static FIELD_SECTION_INDEX: &[(&str, Section)] = &[
    ("patientName", Section::Patient),
    ("patientAddress", Section::Patient),
    ("patientAge", Section::Patient),
    ("patientGender", Section::Patient),
    ("patientEthnicity", Section::Patient),
    ("practitionerOneName", Section::PractitionerOne),
    ("practitionerOneEmail", Section::PractitionerOne),
    ("practitionerOneAddress", Section::PractitionerOne),
    ("practitionerOneExaminationDate", Section::PractitionerOne),
    ("practitionerOnePreviousAcquaintance", Section::PractitionerOne),
    ("practitionerOneApproved", Section::PractitionerOne),
    ("practitionerTwoName", Section::PractitionerTwo),
    ("practitionerTwoEmail", Section::PractitionerTwo),
    ("practitionerTwoAddress", Section::PractitionerTwo),
    ("practitionerTwoExaminationDate", Section::PractitionerTwo),
    ("practitionerTwoPreviousAcquaintance", Section::PractitionerTwo),
    ("practitionerTwoApproved", Section::PractitionerTwo),
    ("primaryDiagnosis", Section::ClinicalOpinion),
    ("diagnosisCode", Section::ClinicalOpinion),
    ("mentalDisorderDescription", Section::ClinicalOpinion),
    ("practitionerOneSignatureDate", Section::Signatures),
    ("practitionerTwoSignatureDate", Section::Signatures),
];

/// Looks up the section that owns `field_key`.
pub fn section_for_field(field_key: &str) -> Option<Section> {
    FIELD_SECTION_INDEX
        .iter()
        .find(|(key, _)| *key == field_key)
        .map(|(_, section)| *section)
}

/// Where a single error should take the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRouting {
    Section(Section),
    Unroutable,
}

pub fn route(error: &FieldError) -> FieldRouting {
    match section_for_field(&error.field) {
        Some(section) => FieldRouting::Section(section),
        None => FieldRouting::Unroutable,
    }
}

/// Errors partitioned by section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutedErrors {
    pub by_section: BTreeMap<Section, Vec<FieldError>>,
    pub unroutable: Vec<FieldError>,
}

impl RoutedErrors {
    pub fn for_section(&self, section: Section) -> &[FieldError] {
        self.by_section
            .get(&section)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The first section with an error, in display order.
    pub fn first_section(&self) -> Option<Section> {
        self.by_section.keys().next().copied()
    }
}

/// Partitions `errors` by section, keeping their original order within each bucket.
pub fn route_errors(errors: &[FieldError]) -> RoutedErrors {
    let mut routed = RoutedErrors::default();
    for error in errors {
        match route(error) {
            FieldRouting::Section(section) => routed
                .by_section
                .entry(section)
                .or_default()
                .push(error.clone()),
            FieldRouting::Unroutable => {
                tracing::debug!(field = %error.field, "validation error has no section mapping");
                routed.unroutable.push(error.clone());
            }
        }
    }
    routed
}

/// Fields of `section` that currently have an error.
pub fn highlighted_fields(section: Section, errors: &[FieldError]) -> BTreeSet<&'static str> {
    let error_fields: BTreeSet<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    section
        .field_keys()
        .filter(|key| error_fields.contains(key))
        .collect()
}

/// True iff any of the section's fields has an error.
pub fn section_has_error(section: Section, errors: &[FieldError]) -> bool {
    !highlighted_fields(section, errors).is_empty()
}

/// Whether a section has its identifying fields filled in.
///
/// This is a progress indicator, not validation: a complete section can still have errors.
/// Signatures are collected outside the system, so that section is always complete.
pub fn is_section_complete(section: Section, record: &FormRecord) -> bool {
    match section {
        Section::Patient => !is_blank(&record.patient.name),
        Section::PractitionerOne => !is_blank(&record.practitioner_one.name),
        Section::PractitionerTwo => !is_blank(&record.practitioner_two.name),
        Section::ClinicalOpinion => record.clinical_reasons.has_clinical_opinion(),
        Section::Signatures => true,
    }
}

/// What a section's summary card shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSummary {
    pub section: Section,
    pub complete: bool,
    pub has_error: bool,
}

pub fn section_summaries(record: &FormRecord, errors: &[FieldError]) -> Vec<SectionSummary> {
    Section::ALL
        .into_iter()
        .map(|section| SectionSummary {
            section,
            complete: is_section_complete(section, record),
            has_error: section_has_error(section, errors),
        })
        .collect()
}

/// Completed sections out of the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f32 / self.total as f32
    }
}

pub fn progress(record: &FormRecord) -> Progress {
    let completed = Section::ALL
        .into_iter()
        .filter(|section| is_section_complete(*section, record))
        .count();
    Progress {
        completed,
        total: Section::ALL.len(),
    }
}

impl FormField {
    pub fn section(self) -> Section {
        // Every FormField key is in the index; checked by `every_form_field_is_indexed_once`.
        section_for_field(self.key()).unwrap_or(Section::Patient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(field: &str) -> FieldError {
        FieldError::new(field, "required")
    }

    #[test]
    fn every_form_field_is_indexed_once() {
        for field in FormField::ALL {
            let matches = FIELD_SECTION_INDEX
                .iter()
                .filter(|(key, _)| *key == field.key())
                .count();
            assert_eq!(matches, 1, "{} should map to exactly one section", field);
        }
        assert_eq!(FIELD_SECTION_INDEX.len(), FormField::ALL.len());
    }

    #[test]
    fn form_field_section_follows_index() {
        assert_eq!(FormField::PatientName.section(), Section::Patient);
        assert_eq!(
            FormField::MentalDisorderDescription.section(),
            Section::ClinicalOpinion
        );
        assert_eq!(
            FormField::PractitionerTwoSignatureDate.section(),
            Section::Signatures
        );
    }

    #[test]
    fn unknown_field_is_unroutable_not_a_crash() {
        assert_eq!(section_for_field("patientShoeSize"), None);

        let errors = vec![error("patientName"), error("patientShoeSize")];
        let routed = route_errors(&errors);

        assert_eq!(routed.for_section(Section::Patient), &errors[..1]);
        assert_eq!(routed.unroutable, vec![error("patientShoeSize")]);
    }

    #[test]
    fn routing_is_exclusive_and_exhaustive() {
        let errors = vec![
            error("practitionerTwoName"),
            error("nonsense"),
            error("mentalDisorderDescription"),
            error("patientAddress"),
        ];
        let routed = route_errors(&errors);

        let routed_count: usize = routed.by_section.values().map(Vec::len).sum();
        assert_eq!(routed_count + routed.unroutable.len(), errors.len());
        assert_eq!(routed.first_section(), Some(Section::Patient));
    }

    #[test]
    fn section_has_error_iff_fields_intersect() {
        let errors = vec![error("practitionerOneEmail"), error("diagnosisCode")];

        assert!(section_has_error(Section::PractitionerOne, &errors));
        assert!(section_has_error(Section::ClinicalOpinion, &errors));
        assert!(!section_has_error(Section::Patient, &errors));
        assert!(!section_has_error(Section::Signatures, &errors));

        let highlighted = highlighted_fields(Section::PractitionerOne, &errors);
        assert_eq!(highlighted.into_iter().collect::<Vec<_>>(), vec!["practitionerOneEmail"]);
    }

    #[test]
    fn completeness_uses_identifying_fields() {
        let mut record = FormRecord::default();
        assert_eq!(progress(&record), Progress { completed: 1, total: 5 });

        record.patient.name = "Jane Doe".into();
        record.clinical_reasons.primary_diagnosis = "Depression".into();
        assert!(is_section_complete(Section::Patient, &record));
        assert!(is_section_complete(Section::ClinicalOpinion, &record));
        assert!(!is_section_complete(Section::PractitionerTwo, &record));
        assert!(is_section_complete(Section::Signatures, &record));
        assert_eq!(progress(&record).completed, 3);
        assert!((progress(&record).fraction() - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_progress_fraction_is_zero() {
        let empty = Progress { completed: 0, total: 0 };
        assert_eq!(empty.fraction(), 0.0);
    }

    #[test]
    fn section_summaries_cover_every_section_in_order() {
        let record = FormRecord::default();
        let summaries = section_summaries(&record, &[error("patientName")]);

        let sections: Vec<Section> = summaries.iter().map(|s| s.section).collect();
        assert_eq!(sections, Section::ALL.to_vec());
        assert!(summaries[0].has_error);
        assert!(!summaries[0].complete);
        assert!(summaries[4].complete);
    }
}

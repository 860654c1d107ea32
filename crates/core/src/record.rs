//! The in-memory form record.
//!
//! A [`FormRecord`] is one instance of the joint medical recommendation form: the patient,
//! the two examining practitioners, the clinical reasons and the signature dates. It is
//! owned by exactly one [`FormSession`](crate::session::FormSession) and mutated only
//! through [`FormRecord::apply`].
//!
//! Text fields are plain `String`s because every field is optional until validated.
//! "Empty" always means empty after trimming whitespace; see [`is_blank`].

use crate::error::EditError;
use crate::PatientAge;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns true if `text` contains nothing but whitespace.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Splits a full name into `(first, last)`.
///
/// The first whitespace-delimited token is the first name; the remaining tokens joined with
/// single spaces form the last name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut tokens = full_name.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Joins first and last names with a single space, skipping empty parts.
pub fn join_name(first: &str, last: &str) -> String {
    first
        .split_whitespace()
        .chain(last.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    NotSpecified,
    Female,
    Male,
    NonBinary,
    Other,
}

impl Gender {
    pub fn is_default(self) -> bool {
        self == Self::NotSpecified
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotSpecified => "Not specified",
            Self::Female => "Female",
            Self::Male => "Male",
            Self::NonBinary => "Non-binary",
            Self::Other => "Other",
        }
    }
}

/// Top-level ethnic groups as recorded on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ethnicity {
    #[default]
    NotSpecified,
    Asian,
    Black,
    Mixed,
    White,
    Other,
}

impl Ethnicity {
    pub fn is_default(self) -> bool {
        self == Self::NotSpecified
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotSpecified => "Not specified",
            Self::Asian => "Asian or Asian British",
            Self::Black => "Black, Black British, Caribbean or African",
            Self::Mixed => "Mixed or multiple ethnic groups",
            Self::White => "White",
            Self::Other => "Other ethnic group",
        }
    }
}

/// Coded classification of the primary diagnosis, by ICD-10 chapter V block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisCode {
    #[default]
    NotSpecified,
    Organic,
    SubstanceUse,
    Psychotic,
    Mood,
    Neurotic,
    Behavioural,
    Personality,
    Intellectual,
    Developmental,
    ChildhoodOnset,
}

impl DiagnosisCode {
    pub fn is_default(self) -> bool {
        self == Self::NotSpecified
    }

    /// ICD-10 block covered by this classification, if any.
    pub fn icd10_block(self) -> Option<&'static str> {
        match self {
            Self::NotSpecified => None,
            Self::Organic => Some("F00-F09"),
            Self::SubstanceUse => Some("F10-F19"),
            Self::Psychotic => Some("F20-F29"),
            Self::Mood => Some("F30-F39"),
            Self::Neurotic => Some("F40-F48"),
            Self::Behavioural => Some("F50-F59"),
            Self::Personality => Some("F60-F69"),
            Self::Intellectual => Some("F70-F79"),
            Self::Developmental => Some("F80-F89"),
            Self::ChildhoodOnset => Some("F90-F98"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientDetails {
    pub name: String,
    pub address: String,
    pub age: PatientAge,
    pub gender: Gender,
    pub ethnicity: Ethnicity,
}

/// One of the two examining practitioners.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Practitioner {
    pub name: String,
    pub email: String,
    pub address: String,
    pub examination_date: Option<NaiveDate>,
    /// The practitioner knew the patient before the examination.
    pub previous_acquaintance: bool,
    /// The practitioner is approved under section 12 of the Act.
    pub specially_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalReasons {
    pub primary_diagnosis: String,
    pub diagnosis_code: DiagnosisCode,
    pub disorder_description: String,
}

impl ClinicalReasons {
    /// True when a diagnosis or a disorder description has been written.
    pub fn has_clinical_opinion(&self) -> bool {
        !is_blank(&self.primary_diagnosis) || !is_blank(&self.disorder_description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Signatures {
    pub practitioner_one: Option<NaiveDate>,
    pub practitioner_two: Option<NaiveDate>,
}

/// One form instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormRecord {
    pub patient: PatientDetails,
    pub practitioner_one: Practitioner,
    pub practitioner_two: Practitioner,
    pub clinical_reasons: ClinicalReasons,
    pub signatures: Signatures,
}

/// The value type a [`FormField`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Age,
    Gender,
    Ethnicity,
    Diagnosis,
    Date,
    Flag,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Ethnicity => "ethnicity",
            Self::Diagnosis => "diagnosis code",
            Self::Date => "date",
            Self::Flag => "yes/no",
        }
    }
}

/// Every editable field on the form.
///
/// [`FormField::key`] is the stable identifier used in validation errors and in the
/// field-to-section index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    PatientName,
    PatientAddress,
    PatientAge,
    PatientGender,
    PatientEthnicity,
    PractitionerOneName,
    PractitionerOneEmail,
    PractitionerOneAddress,
    PractitionerOneExaminationDate,
    PractitionerOnePreviousAcquaintance,
    PractitionerOneApproved,
    PractitionerTwoName,
    PractitionerTwoEmail,
    PractitionerTwoAddress,
    PractitionerTwoExaminationDate,
    PractitionerTwoPreviousAcquaintance,
    PractitionerTwoApproved,
    PrimaryDiagnosis,
    DiagnosisCode,
    MentalDisorderDescription,
    PractitionerOneSignatureDate,
    PractitionerTwoSignatureDate,
}

impl FormField {
    pub const ALL: [FormField; 22] = [
        Self::PatientName,
        Self::PatientAddress,
        Self::PatientAge,
        Self::PatientGender,
        Self::PatientEthnicity,
        Self::PractitionerOneName,
        Self::PractitionerOneEmail,
        Self::PractitionerOneAddress,
        Self::PractitionerOneExaminationDate,
        Self::PractitionerOnePreviousAcquaintance,
        Self::PractitionerOneApproved,
        Self::PractitionerTwoName,
        Self::PractitionerTwoEmail,
        Self::PractitionerTwoAddress,
        Self::PractitionerTwoExaminationDate,
        Self::PractitionerTwoPreviousAcquaintance,
        Self::PractitionerTwoApproved,
        Self::PrimaryDiagnosis,
        Self::DiagnosisCode,
        Self::MentalDisorderDescription,
        Self::PractitionerOneSignatureDate,
        Self::PractitionerTwoSignatureDate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::PatientName => "patientName",
            Self::PatientAddress => "patientAddress",
            Self::PatientAge => "patientAge",
            Self::PatientGender => "patientGender",
            Self::PatientEthnicity => "patientEthnicity",
            Self::PractitionerOneName => "practitionerOneName",
            Self::PractitionerOneEmail => "practitionerOneEmail",
            Self::PractitionerOneAddress => "practitionerOneAddress",
            Self::PractitionerOneExaminationDate => "practitionerOneExaminationDate",
            Self::PractitionerOnePreviousAcquaintance => "practitionerOnePreviousAcquaintance",
            Self::PractitionerOneApproved => "practitionerOneApproved",
            Self::PractitionerTwoName => "practitionerTwoName",
            Self::PractitionerTwoEmail => "practitionerTwoEmail",
            Self::PractitionerTwoAddress => "practitionerTwoAddress",
            Self::PractitionerTwoExaminationDate => "practitionerTwoExaminationDate",
            Self::PractitionerTwoPreviousAcquaintance => "practitionerTwoPreviousAcquaintance",
            Self::PractitionerTwoApproved => "practitionerTwoApproved",
            Self::PrimaryDiagnosis => "primaryDiagnosis",
            Self::DiagnosisCode => "diagnosisCode",
            Self::MentalDisorderDescription => "mentalDisorderDescription",
            Self::PractitionerOneSignatureDate => "practitionerOneSignatureDate",
            Self::PractitionerTwoSignatureDate => "practitionerTwoSignatureDate",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::PatientAge => FieldKind::Age,
            Self::PatientGender => FieldKind::Gender,
            Self::PatientEthnicity => FieldKind::Ethnicity,
            Self::DiagnosisCode => FieldKind::Diagnosis,
            Self::PractitionerOneExaminationDate
            | Self::PractitionerTwoExaminationDate
            | Self::PractitionerOneSignatureDate
            | Self::PractitionerTwoSignatureDate => FieldKind::Date,
            Self::PractitionerOnePreviousAcquaintance
            | Self::PractitionerOneApproved
            | Self::PractitionerTwoPreviousAcquaintance
            | Self::PractitionerTwoApproved => FieldKind::Flag,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown form field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for FormField {
    type Err = UnknownField;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.key() == key)
            .ok_or_else(|| UnknownField(key.to_string()))
    }
}

/// A value delivered by a field edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Age(u32),
    Gender(Gender),
    Ethnicity(Ethnicity),
    Diagnosis(DiagnosisCode),
    Date(Option<NaiveDate>),
    Flag(bool),
}

impl FormRecord {
    /// Applies one field edit.
    ///
    /// Rejected edits (wrong value type, out-of-range age) leave the record unchanged.
    pub fn apply(&mut self, field: FormField, value: FieldValue) -> Result<(), EditError> {
        let mismatch = || EditError::TypeMismatch {
            field,
            expected: field.kind().name(),
        };

        match value {
            FieldValue::Text(text) => *self.text_mut(field).ok_or_else(mismatch)? = text,
            FieldValue::Date(date) => *self.date_mut(field).ok_or_else(mismatch)? = date,
            FieldValue::Flag(flag) => *self.flag_mut(field).ok_or_else(mismatch)? = flag,
            FieldValue::Age(years) if field == FormField::PatientAge => {
                self.patient.age = PatientAge::new(years)?;
            }
            FieldValue::Gender(gender) if field == FormField::PatientGender => {
                self.patient.gender = gender;
            }
            FieldValue::Ethnicity(ethnicity) if field == FormField::PatientEthnicity => {
                self.patient.ethnicity = ethnicity;
            }
            FieldValue::Diagnosis(code) if field == FormField::DiagnosisCode => {
                self.clinical_reasons.diagnosis_code = code;
            }
            _ => return Err(mismatch()),
        }

        Ok(())
    }

    /// Reads the current value of a field.
    pub fn value(&self, field: FormField) -> FieldValue {
        match field.kind() {
            FieldKind::Age => FieldValue::Age(u32::from(self.patient.age.years())),
            FieldKind::Gender => FieldValue::Gender(self.patient.gender),
            FieldKind::Ethnicity => FieldValue::Ethnicity(self.patient.ethnicity),
            FieldKind::Diagnosis => FieldValue::Diagnosis(self.clinical_reasons.diagnosis_code),
            FieldKind::Text => FieldValue::Text(self.text(field).unwrap_or_default().to_string()),
            FieldKind::Date => FieldValue::Date(self.date(field)),
            FieldKind::Flag => FieldValue::Flag(self.flag(field).unwrap_or_default()),
        }
    }

    pub fn text(&self, field: FormField) -> Option<&str> {
        let text = match field {
            FormField::PatientName => &self.patient.name,
            FormField::PatientAddress => &self.patient.address,
            FormField::PractitionerOneName => &self.practitioner_one.name,
            FormField::PractitionerOneEmail => &self.practitioner_one.email,
            FormField::PractitionerOneAddress => &self.practitioner_one.address,
            FormField::PractitionerTwoName => &self.practitioner_two.name,
            FormField::PractitionerTwoEmail => &self.practitioner_two.email,
            FormField::PractitionerTwoAddress => &self.practitioner_two.address,
            FormField::PrimaryDiagnosis => &self.clinical_reasons.primary_diagnosis,
            FormField::MentalDisorderDescription => &self.clinical_reasons.disorder_description,
            _ => return None,
        };
        Some(text)
    }

    fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        let text = match field {
            FormField::PatientName => &mut self.patient.name,
            FormField::PatientAddress => &mut self.patient.address,
            FormField::PractitionerOneName => &mut self.practitioner_one.name,
            FormField::PractitionerOneEmail => &mut self.practitioner_one.email,
            FormField::PractitionerOneAddress => &mut self.practitioner_one.address,
            FormField::PractitionerTwoName => &mut self.practitioner_two.name,
            FormField::PractitionerTwoEmail => &mut self.practitioner_two.email,
            FormField::PractitionerTwoAddress => &mut self.practitioner_two.address,
            FormField::PrimaryDiagnosis => &mut self.clinical_reasons.primary_diagnosis,
            FormField::MentalDisorderDescription => {
                &mut self.clinical_reasons.disorder_description
            }
            _ => return None,
        };
        Some(text)
    }

    fn date(&self, field: FormField) -> Option<NaiveDate> {
        match field {
            FormField::PractitionerOneExaminationDate => self.practitioner_one.examination_date,
            FormField::PractitionerTwoExaminationDate => self.practitioner_two.examination_date,
            FormField::PractitionerOneSignatureDate => self.signatures.practitioner_one,
            FormField::PractitionerTwoSignatureDate => self.signatures.practitioner_two,
            _ => None,
        }
    }

    fn date_mut(&mut self, field: FormField) -> Option<&mut Option<NaiveDate>> {
        let date = match field {
            FormField::PractitionerOneExaminationDate => &mut self.practitioner_one.examination_date,
            FormField::PractitionerTwoExaminationDate => &mut self.practitioner_two.examination_date,
            FormField::PractitionerOneSignatureDate => &mut self.signatures.practitioner_one,
            FormField::PractitionerTwoSignatureDate => &mut self.signatures.practitioner_two,
            _ => return None,
        };
        Some(date)
    }

    fn flag(&self, field: FormField) -> Option<bool> {
        match field {
            FormField::PractitionerOnePreviousAcquaintance => {
                Some(self.practitioner_one.previous_acquaintance)
            }
            FormField::PractitionerOneApproved => Some(self.practitioner_one.specially_approved),
            FormField::PractitionerTwoPreviousAcquaintance => {
                Some(self.practitioner_two.previous_acquaintance)
            }
            FormField::PractitionerTwoApproved => Some(self.practitioner_two.specially_approved),
            _ => None,
        }
    }

    fn flag_mut(&mut self, field: FormField) -> Option<&mut bool> {
        let flag = match field {
            FormField::PractitionerOnePreviousAcquaintance => {
                &mut self.practitioner_one.previous_acquaintance
            }
            FormField::PractitionerOneApproved => &mut self.practitioner_one.specially_approved,
            FormField::PractitionerTwoPreviousAcquaintance => {
                &mut self.practitioner_two.previous_acquaintance
            }
            FormField::PractitionerTwoApproved => &mut self.practitioner_two.specially_approved,
            _ => return None,
        };
        Some(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_full_name_takes_first_token_as_first_name() {
        assert_eq!(
            split_full_name("Jane Doe"),
            ("Jane".to_string(), "Doe".to_string())
        );
        assert_eq!(
            split_full_name("  Mary   Ann  van der Berg "),
            ("Mary".to_string(), "Ann van der Berg".to_string())
        );
        assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_full_name("   "), (String::new(), String::new()));
    }

    #[test]
    fn join_name_skips_empty_parts() {
        assert_eq!(join_name("Jane", "Doe"), "Jane Doe");
        assert_eq!(join_name("Cher", ""), "Cher");
        assert_eq!(join_name("", "Doe"), "Doe");
        assert_eq!(join_name(" ", " "), "");
    }

    #[test]
    fn split_then_join_normalises_whitespace() {
        let (first, last) = split_full_name("Mary  Ann   Smith");
        assert_eq!(join_name(&first, &last), "Mary Ann Smith");
    }

    #[test]
    fn form_field_keys_are_unique_and_parse_back() {
        let mut keys: Vec<&str> = FormField::ALL.iter().map(|f| f.key()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), FormField::ALL.len(), "keys should be unique");

        for field in FormField::ALL {
            let parsed: FormField = field.key().parse().expect("key should parse");
            assert_eq!(parsed, field);
        }

        let err = "patientShoeSize".parse::<FormField>().expect_err("unknown key");
        assert_eq!(err, UnknownField("patientShoeSize".into()));
    }

    #[test]
    fn apply_updates_typed_fields() {
        let mut record = FormRecord::default();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        record
            .apply(FormField::PatientName, FieldValue::Text("Jane Doe".into()))
            .expect("text edit");
        record
            .apply(FormField::PatientAge, FieldValue::Age(42))
            .expect("age edit");
        record
            .apply(FormField::PractitionerTwoApproved, FieldValue::Flag(true))
            .expect("flag edit");
        record
            .apply(FormField::PractitionerOneExaminationDate, FieldValue::Date(Some(date)))
            .expect("date edit");
        record
            .apply(FormField::DiagnosisCode, FieldValue::Diagnosis(DiagnosisCode::Mood))
            .expect("diagnosis edit");

        assert_eq!(record.patient.name, "Jane Doe");
        assert_eq!(record.patient.age.years(), 42);
        assert!(record.practitioner_two.specially_approved);
        assert_eq!(record.practitioner_one.examination_date, Some(date));
        assert_eq!(record.clinical_reasons.diagnosis_code, DiagnosisCode::Mood);
        assert_eq!(
            record.value(FormField::PatientName),
            FieldValue::Text("Jane Doe".into())
        );
    }

    #[test]
    fn apply_rejects_type_mismatch_without_changing_record() {
        let mut record = FormRecord::default();
        let err = record
            .apply(FormField::PatientAge, FieldValue::Text("forty".into()))
            .expect_err("text is not an age");
        assert_eq!(
            err,
            EditError::TypeMismatch {
                field: FormField::PatientAge,
                expected: "age",
            }
        );

        let err = record
            .apply(FormField::PatientGender, FieldValue::Flag(true))
            .expect_err("flag is not a gender");
        assert!(matches!(err, EditError::TypeMismatch { .. }));
        assert_eq!(record, FormRecord::default());
    }

    #[test]
    fn apply_rejects_out_of_range_age() {
        let mut record = FormRecord::default();
        record
            .apply(FormField::PatientAge, FieldValue::Age(30))
            .expect("valid age");

        let err = record
            .apply(FormField::PatientAge, FieldValue::Age(130))
            .expect_err("age above maximum");
        assert!(matches!(err, EditError::Age(_)));
        assert_eq!(record.patient.age.years(), 30, "age should be unchanged");
    }

    #[test]
    fn has_clinical_opinion_ignores_whitespace() {
        let mut reasons = ClinicalReasons::default();
        assert!(!reasons.has_clinical_opinion());
        reasons.disorder_description = "   ".into();
        assert!(!reasons.has_clinical_opinion());
        reasons.primary_diagnosis = "Bipolar affective disorder".into();
        assert!(reasons.has_clinical_opinion());
    }

    #[test]
    fn coded_values_have_display_labels() {
        assert_eq!(Gender::NonBinary.label(), "Non-binary");
        assert_eq!(Ethnicity::NotSpecified.label(), "Not specified");
        assert_eq!(Ethnicity::Black.label(), "Black, Black British, Caribbean or African");
        assert_eq!(DiagnosisCode::Mood.icd10_block(), Some("F30-F39"));
        assert_eq!(DiagnosisCode::NotSpecified.icd10_block(), None);
    }
}

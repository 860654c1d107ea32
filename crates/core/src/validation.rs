//! Form validation.
//!
//! [`validate`] is a pure function from a record to an ordered list of [`FieldError`]s.
//! The order is the order the rules run in, which follows the form from top to bottom.
//! Each error names its field by the stable key used in the
//! [field-to-section index](crate::sections::FIELD_SECTION_INDEX).
//!
//! Validation never blocks export. Forms are signed on paper, so a document with gaps is
//! still useful; the errors are there to guide the clinician.

use crate::constants::MAX_DAYS_BETWEEN_EXAMINATIONS;
use crate::record::{is_blank, FormField, FormRecord};
use crate::EmailAddress;

/// A validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn for_field(field: FormField, message: impl Into<String>) -> Self {
        Self::new(field.key(), message)
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

type Rule = fn(&FormRecord, &mut Vec<FieldError>);

/// Rules in execution order.
const RULES: &[Rule] = &[
    patient_name_required,
    patient_address_required,
    practitioner_one_name_required,
    practitioner_one_email_well_formed,
    practitioner_two_name_required,
    practitioner_two_email_well_formed,
    one_practitioner_specially_approved,
    examinations_close_together,
    clinical_opinion_required,
];

/// Validates a record.
pub fn validate(record: &FormRecord) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for rule in RULES {
        rule(record, &mut errors);
    }
    errors
}

fn require_text(text: &str, field: FormField, message: &str, errors: &mut Vec<FieldError>) {
    if is_blank(text) {
        errors.push(FieldError::for_field(field, message));
    }
}

fn check_email(email: &str, field: FormField, errors: &mut Vec<FieldError>) {
    if is_blank(email) {
        return;
    }
    if let Err(e) = EmailAddress::parse(email) {
        errors.push(FieldError::for_field(field, format!("Email address is not valid: {e}")));
    }
}

fn patient_name_required(record: &FormRecord, errors: &mut Vec<FieldError>) {
    require_text(
        &record.patient.name,
        FormField::PatientName,
        "Patient name is required",
        errors,
    );
}

fn patient_address_required(record: &FormRecord, errors: &mut Vec<FieldError>) {
    require_text(
        &record.patient.address,
        FormField::PatientAddress,
        "Patient address is required",
        errors,
    );
}

fn practitioner_one_name_required(record: &FormRecord, errors: &mut Vec<FieldError>) {
    require_text(
        &record.practitioner_one.name,
        FormField::PractitionerOneName,
        "First practitioner's name is required",
        errors,
    );
}

fn practitioner_one_email_well_formed(record: &FormRecord, errors: &mut Vec<FieldError>) {
    check_email(&record.practitioner_one.email, FormField::PractitionerOneEmail, errors);
}

fn practitioner_two_name_required(record: &FormRecord, errors: &mut Vec<FieldError>) {
    require_text(
        &record.practitioner_two.name,
        FormField::PractitionerTwoName,
        "Second practitioner's name is required",
        errors,
    );
}

fn practitioner_two_email_well_formed(record: &FormRecord, errors: &mut Vec<FieldError>) {
    check_email(&record.practitioner_two.email, FormField::PractitionerTwoEmail, errors);
}

fn one_practitioner_specially_approved(record: &FormRecord, errors: &mut Vec<FieldError>) {
    if !record.practitioner_one.specially_approved && !record.practitioner_two.specially_approved {
        errors.push(FieldError::for_field(
            FormField::PractitionerOneApproved,
            "At least one practitioner must be approved under section 12",
        ));
    }
}

fn examinations_close_together(record: &FormRecord, errors: &mut Vec<FieldError>) {
    let (Some(first), Some(second)) = (
        record.practitioner_one.examination_date,
        record.practitioner_two.examination_date,
    ) else {
        return;
    };

    let gap = (second - first).num_days().abs();
    if gap > MAX_DAYS_BETWEEN_EXAMINATIONS {
        errors.push(FieldError::for_field(
            FormField::PractitionerTwoExaminationDate,
            format!(
                "Examinations are {gap} days apart; at most {MAX_DAYS_BETWEEN_EXAMINATIONS} days are allowed"
            ),
        ));
    }
}

fn clinical_opinion_required(record: &FormRecord, errors: &mut Vec<FieldError>) {
    if !record.clinical_reasons.has_clinical_opinion() {
        errors.push(FieldError::for_field(
            FormField::MentalDisorderDescription,
            "Enter a primary diagnosis or describe the mental disorder",
        ));
    }
}

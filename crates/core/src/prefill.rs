//! Merge rules between a form record and the shared context.
//!
//! Two one-directional operations:
//!
//! - [`prefill`] runs once at session start. A record field takes the shared value only
//!   when the record field is unset and the shared value is set. Text is unset when blank;
//!   age, gender, ethnicity and diagnosis code are unset while they hold their default.
//!   Running it a second time changes nothing.
//! - [`sync_back`] runs at session end. Whole field groups are copied out of the record
//!   when the record has something to say for them. It is last-writer-wins: two non-empty
//!   values are never merged field by field.
//!
//! Patient names are stored split in the shared context and whole on the record. Both
//! directions go through [`split_full_name`] and [`join_name`].

use crate::record::{
    is_blank, split_full_name, ClinicalReasons, FormField, FormRecord, PatientDetails,
    Practitioner,
};
use crate::shared_context::{
    ClinicianInfo, FieldGroup, PatientInfo, Provenance, SecondPractitionerInfo, SharedContext,
    SharedContextStore, SourceTag,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Fills unset record fields from the shared context.
pub fn prefill(mut record: FormRecord, ctx: &SharedContext) -> FormRecord {
    let mut filled = Vec::new();

    prefill_patient(&mut record.patient, &ctx.patient, &mut filled);
    prefill_practitioner_one(&mut record.practitioner_one, &ctx.clinician, &mut filled);
    prefill_practitioner_two(
        &mut record.practitioner_two,
        &ctx.second_practitioner,
        &mut filled,
    );
    if ctx.clinical_reasons_present {
        prefill_clinical_reasons(&mut record.clinical_reasons, &ctx.clinical_reasons, &mut filled);
    }

    if !filled.is_empty() {
        let keys: Vec<&str> = filled.iter().map(|field| field.key()).collect();
        tracing::debug!(fields = ?keys, "prefilled record from shared context");
    }

    record
}

fn fill_text(target: &mut String, value: &str, field: FormField, filled: &mut Vec<FormField>) {
    if is_blank(target) && !is_blank(value) {
        *target = value.to_string();
        filled.push(field);
    }
}

fn fill_date(
    target: &mut Option<NaiveDate>,
    value: Option<NaiveDate>,
    field: FormField,
    filled: &mut Vec<FormField>,
) {
    if target.is_none() && value.is_some() {
        *target = value;
        filled.push(field);
    }
}

/// Enumerations and the age use their default as the "unset" sentinel.
fn fill_default<T>(target: &mut T, value: T, field: FormField, filled: &mut Vec<FormField>)
where
    T: Copy + Default + PartialEq,
{
    if *target == T::default() && value != T::default() {
        *target = value;
        filled.push(field);
    }
}

fn prefill_patient(patient: &mut PatientDetails, info: &PatientInfo, filled: &mut Vec<FormField>) {
    fill_text(&mut patient.name, &info.full_name(), FormField::PatientName, filled);
    fill_text(&mut patient.address, &info.address, FormField::PatientAddress, filled);
    if let Some(age) = info.age {
        fill_default(&mut patient.age, age, FormField::PatientAge, filled);
    }
    fill_default(&mut patient.gender, info.gender, FormField::PatientGender, filled);
    fill_default(
        &mut patient.ethnicity,
        info.ethnicity,
        FormField::PatientEthnicity,
        filled,
    );
}

/// The first practitioner is the clinician filling in the form.
fn prefill_practitioner_one(
    practitioner: &mut Practitioner,
    clinician: &ClinicianInfo,
    filled: &mut Vec<FormField>,
) {
    fill_text(&mut practitioner.name, &clinician.name, FormField::PractitionerOneName, filled);
    fill_text(
        &mut practitioner.email,
        &clinician.email,
        FormField::PractitionerOneEmail,
        filled,
    );
    fill_text(
        &mut practitioner.address,
        &clinician.organisation,
        FormField::PractitionerOneAddress,
        filled,
    );
}

fn prefill_practitioner_two(
    practitioner: &mut Practitioner,
    info: &SecondPractitionerInfo,
    filled: &mut Vec<FormField>,
) {
    fill_text(&mut practitioner.name, &info.name, FormField::PractitionerTwoName, filled);
    fill_text(&mut practitioner.email, &info.email, FormField::PractitionerTwoEmail, filled);
    fill_text(
        &mut practitioner.address,
        &info.address,
        FormField::PractitionerTwoAddress,
        filled,
    );
    fill_date(
        &mut practitioner.examination_date,
        info.examination_date,
        FormField::PractitionerTwoExaminationDate,
        filled,
    );
}

fn prefill_clinical_reasons(
    reasons: &mut ClinicalReasons,
    stored: &ClinicalReasons,
    filled: &mut Vec<FormField>,
) {
    fill_text(
        &mut reasons.primary_diagnosis,
        &stored.primary_diagnosis,
        FormField::PrimaryDiagnosis,
        filled,
    );
    fill_default(
        &mut reasons.diagnosis_code,
        stored.diagnosis_code,
        FormField::DiagnosisCode,
        filled,
    );
    fill_text(
        &mut reasons.disorder_description,
        &stored.disorder_description,
        FormField::MentalDisorderDescription,
        filled,
    );
}

/// The field groups a record will write back at session end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncPlan {
    pub patient: Option<PatientInfo>,
    /// Offered to the shared context, subject to [`SyncPlan::writes_clinical_reasons`].
    pub clinical_reasons: ClinicalReasons,
    pub second_practitioner: Option<SecondPractitionerInfo>,
}

impl SyncPlan {
    pub fn for_record(record: &FormRecord) -> Self {
        let patient = (!is_blank(&record.patient.name)).then(|| {
            let (first_name, last_name) = split_full_name(&record.patient.name);
            PatientInfo {
                first_name,
                last_name,
                address: record.patient.address.clone(),
                age: Some(record.patient.age),
                gender: record.patient.gender,
                ethnicity: record.patient.ethnicity,
            }
        });

        let second_practitioner = (!is_blank(&record.practitioner_two.name)).then(|| {
            SecondPractitionerInfo {
                name: record.practitioner_two.name.clone(),
                email: record.practitioner_two.email.clone(),
                address: record.practitioner_two.address.clone(),
                examination_date: record.practitioner_two.examination_date,
            }
        });

        Self {
            patient,
            clinical_reasons: record.clinical_reasons.clone(),
            second_practitioner,
        }
    }

    /// Whether the clinical reasons overwrite the shared ones.
    ///
    /// They are written when the context has none yet, or when the record's diagnosis code
    /// is not the default. With reasons already present and a default code, a changed
    /// description is not written back; a non-default code writes back whatever text the
    /// record holds. This gate is kept as-is pending product clarification.
    pub fn writes_clinical_reasons(&self, reasons_present: bool) -> bool {
        clinical_reasons_gate(&self.clinical_reasons, reasons_present)
    }

    /// Field groups this plan writes against a context with the given present flag, in
    /// write order.
    pub fn groups(&self, reasons_present: bool) -> Vec<FieldGroup> {
        let mut groups = Vec::new();
        if self.patient.is_some() {
            groups.push(FieldGroup::Patient);
        }
        if self.writes_clinical_reasons(reasons_present) {
            groups.push(FieldGroup::ClinicalReasons);
        }
        if self.second_practitioner.is_some() {
            groups.push(FieldGroup::SecondPractitioner);
        }
        groups
    }

    /// Applies the plan to a context snapshot.
    pub fn apply(self, mut ctx: SharedContext, source: &SourceTag, now: DateTime<Utc>) -> SharedContext {
        if let Some(patient) = self.patient {
            ctx.patient = patient;
            ctx.provenance
                .record(FieldGroup::Patient, Provenance::new(source, now));
        }
        if clinical_reasons_gate(&self.clinical_reasons, ctx.clinical_reasons_present) {
            ctx.clinical_reasons = self.clinical_reasons;
            ctx.clinical_reasons_present = true;
            ctx.provenance
                .record(FieldGroup::ClinicalReasons, Provenance::new(source, now));
        }
        if let Some(second) = self.second_practitioner {
            ctx.second_practitioner = second;
            ctx.provenance
                .record(FieldGroup::SecondPractitioner, Provenance::new(source, now));
        }
        ctx
    }

    /// Applies the plan through a store, one atomic group update per group.
    ///
    /// The clinical reasons gate is evaluated inside the store's update, so a form that
    /// wrote reasons after this plan was built is not overwritten by a default code.
    /// Returns the field groups that were written.
    pub fn apply_to_store(self, store: &dyn SharedContextStore, source: &SourceTag) -> Vec<FieldGroup> {
        let mut groups = Vec::new();

        if let Some(patient) = self.patient {
            store.update_patient(source, &mut |current| *current = patient.clone());
            groups.push(FieldGroup::Patient);
        }

        let reasons = self.clinical_reasons;
        let reasons_written = store.update_clinical_reasons_if(source, &mut |current, present| {
            if !clinical_reasons_gate(&reasons, present) {
                return false;
            }
            *current = reasons.clone();
            true
        });
        if reasons_written {
            groups.push(FieldGroup::ClinicalReasons);
        }

        if let Some(second) = self.second_practitioner {
            store.update_second_practitioner(source, &mut |current| *current = second.clone());
            groups.push(FieldGroup::SecondPractitioner);
        }

        groups
    }
}

fn clinical_reasons_gate(reasons: &ClinicalReasons, reasons_present: bool) -> bool {
    !reasons_present || !reasons.diagnosis_code.is_default()
}

/// Copies record fields back into a context snapshot at session end.
pub fn sync_back(
    record: &FormRecord,
    ctx: SharedContext,
    source: &SourceTag,
    now: DateTime<Utc>,
) -> SharedContext {
    let plan = SyncPlan::for_record(record);
    tracing::debug!(
        groups = ?plan.groups(ctx.clinical_reasons_present),
        source = %source,
        "syncing record back"
    );
    plan.apply(ctx, source, now)
}

/// Copies record fields back into a live store at session end.
///
/// Returns the field groups that were written.
pub fn sync_back_to_store(
    record: &FormRecord,
    store: &dyn SharedContextStore,
    source: &SourceTag,
) -> Vec<FieldGroup> {
    let groups = SyncPlan::for_record(record).apply_to_store(store, source);
    tracing::debug!(groups = ?groups, source = %source, "synced record back to store");
    groups
}

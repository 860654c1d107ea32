//! Process-wide shared context.
//!
//! The shared context holds data that outlives any single form session: the current
//! patient, the clinician's own details, the most recently entered second practitioner
//! and the most recent clinical reasons. Independent forms read it at session start and
//! write back to it at session end.
//!
//! ## Field Groups
//!
//! Writes are scoped to one field group at a time:
//!
//! ```text
//! patient              first/last name, address, age, gender, ethnicity
//! clinician            name, email, organisation
//! second_practitioner  name, email, address, examination date
//! clinical_reasons     present flag + diagnosis, code, description
//! ```
//!
//! Every write is tagged with the [`SourceTag`] of the form that made it. The tag is kept
//! as [`Provenance`] for audit only; it never blocks a later write from another form.

use crate::record::{join_name, ClinicalReasons, Ethnicity, Gender};
use crate::{NonEmptyText, PatientAge, TextError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Identifies the form that wrote to the shared context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTag(NonEmptyText);

impl SourceTag {
    pub fn new(tag: impl AsRef<str>) -> Result<Self, TextError> {
        Ok(Self(NonEmptyText::new(tag)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which form last wrote a field group, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: SourceTag,
    pub updated_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(source: &SourceTag, updated_at: DateTime<Utc>) -> Self {
        Self {
            source: source.clone(),
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Patient,
    Clinician,
    SecondPractitioner,
    ClinicalReasons,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInfo {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub age: Option<PatientAge>,
    pub gender: Gender,
    pub ethnicity: Ethnicity,
}

impl PatientInfo {
    pub fn full_name(&self) -> String {
        join_name(&self.first_name, &self.last_name)
    }
}

/// The signed-in clinician's own details.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicianInfo {
    pub name: String,
    pub email: String,
    pub organisation: String,
}

/// The second practitioner most recently entered on any form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondPractitionerInfo {
    pub name: String,
    pub email: String,
    pub address: String,
    pub examination_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextProvenance {
    pub patient: Option<Provenance>,
    pub clinician: Option<Provenance>,
    pub second_practitioner: Option<Provenance>,
    pub clinical_reasons: Option<Provenance>,
}

impl ContextProvenance {
    pub fn get(&self, group: FieldGroup) -> Option<&Provenance> {
        self.slot(group).as_ref()
    }

    pub fn record(&mut self, group: FieldGroup, provenance: Provenance) {
        *self.slot_mut(group) = Some(provenance);
    }

    fn slot(&self, group: FieldGroup) -> &Option<Provenance> {
        match group {
            FieldGroup::Patient => &self.patient,
            FieldGroup::Clinician => &self.clinician,
            FieldGroup::SecondPractitioner => &self.second_practitioner,
            FieldGroup::ClinicalReasons => &self.clinical_reasons,
        }
    }

    fn slot_mut(&mut self, group: FieldGroup) -> &mut Option<Provenance> {
        match group {
            FieldGroup::Patient => &mut self.patient,
            FieldGroup::Clinician => &mut self.clinician,
            FieldGroup::SecondPractitioner => &mut self.second_practitioner,
            FieldGroup::ClinicalReasons => &mut self.clinical_reasons,
        }
    }
}

/// A snapshot of the shared context.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedContext {
    pub patient: PatientInfo,
    pub clinician: ClinicianInfo,
    pub second_practitioner: SecondPractitionerInfo,
    pub clinical_reasons_present: bool,
    pub clinical_reasons: ClinicalReasons,
    pub provenance: ContextProvenance,
}

/// Atomic access to the shared context.
///
/// Implementations must serialise writes so that each `update_*` call is a single
/// read-modify-write of its field group with respect to every other call.
pub trait SharedContextStore: Send + Sync {
    /// Returns a snapshot. Changing the snapshot does not change the store.
    fn read(&self) -> SharedContext;

    fn update_patient(&self, source: &SourceTag, mutator: &mut dyn FnMut(&mut PatientInfo));

    fn update_clinician(&self, source: &SourceTag, mutator: &mut dyn FnMut(&mut ClinicianInfo));

    fn update_second_practitioner(
        &self,
        source: &SourceTag,
        mutator: &mut dyn FnMut(&mut SecondPractitionerInfo),
    );

    /// Applies `mutator` to the clinical reasons and marks them as present.
    fn update_clinical_reasons(
        &self,
        source: &SourceTag,
        mutator: &mut dyn FnMut(&mut ClinicalReasons),
    ) {
        self.update_clinical_reasons_if(source, &mut |reasons, _present| {
            mutator(reasons);
            true
        });
    }

    /// Conditional form of [`update_clinical_reasons`](Self::update_clinical_reasons).
    ///
    /// `mutator` receives a copy of the stored reasons and the current present flag, both
    /// read under the same write as the update. Returning false discards the copy and
    /// leaves the group, its flag and its provenance untouched. Returns whether the write
    /// happened.
    fn update_clinical_reasons_if(
        &self,
        source: &SourceTag,
        mutator: &mut dyn FnMut(&mut ClinicalReasons, bool) -> bool,
    ) -> bool;
}

/// In-process [`SharedContextStore`] guarded by a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemorySharedContext {
    inner: RwLock<SharedContext>,
}

impl InMemorySharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from a previously saved snapshot.
    pub fn with_snapshot(snapshot: SharedContext) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    fn write(
        &self,
        group: FieldGroup,
        source: &SourceTag,
        apply: impl FnOnce(&mut SharedContext) -> bool,
    ) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if !apply(&mut *guard) {
            tracing::debug!(?group, source = %source, "shared context update declined");
            return false;
        }

        if let Some(previous) = guard.provenance.get(group) {
            if previous.source != *source {
                tracing::debug!(
                    ?group,
                    previous = %previous.source,
                    source = %source,
                    "shared context group overwritten by another form"
                );
            }
        }

        guard
            .provenance
            .record(group, Provenance::new(source, Utc::now()));

        tracing::debug!(?group, source = %source, "shared context updated");
        true
    }
}

impl SharedContextStore for InMemorySharedContext {
    fn read(&self) -> SharedContext {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_patient(&self, source: &SourceTag, mutator: &mut dyn FnMut(&mut PatientInfo)) {
        self.write(FieldGroup::Patient, source, |ctx| {
            mutator(&mut ctx.patient);
            true
        });
    }

    fn update_clinician(&self, source: &SourceTag, mutator: &mut dyn FnMut(&mut ClinicianInfo)) {
        self.write(FieldGroup::Clinician, source, |ctx| {
            mutator(&mut ctx.clinician);
            true
        });
    }

    fn update_second_practitioner(
        &self,
        source: &SourceTag,
        mutator: &mut dyn FnMut(&mut SecondPractitionerInfo),
    ) {
        self.write(FieldGroup::SecondPractitioner, source, |ctx| {
            mutator(&mut ctx.second_practitioner);
            true
        });
    }

    fn update_clinical_reasons_if(
        &self,
        source: &SourceTag,
        mutator: &mut dyn FnMut(&mut ClinicalReasons, bool) -> bool,
    ) -> bool {
        self.write(FieldGroup::ClinicalReasons, source, |ctx| {
            let mut candidate = ctx.clinical_reasons.clone();
            if !mutator(&mut candidate, ctx.clinical_reasons_present) {
                return false;
            }
            ctx.clinical_reasons = candidate;
            ctx.clinical_reasons_present = true;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tag(value: &str) -> SourceTag {
        SourceTag::new(value).expect("valid source tag")
    }

    #[test]
    fn read_returns_detached_snapshot() {
        let store = InMemorySharedContext::new();
        let mut snapshot = store.read();
        snapshot.patient.first_name = "Changed".into();

        assert_eq!(store.read().patient.first_name, "");
    }

    #[test]
    fn update_records_provenance_per_group() {
        let store = InMemorySharedContext::new();
        store.update_patient(&tag("form-A3"), &mut |patient| {
            patient.first_name = "Jane".into();
            patient.last_name = "Doe".into();
        });

        let ctx = store.read();
        assert_eq!(ctx.patient.full_name(), "Jane Doe");
        let provenance = ctx
            .provenance
            .get(FieldGroup::Patient)
            .expect("patient provenance should be set");
        assert_eq!(provenance.source.as_str(), "form-A3");
        assert!(ctx.provenance.get(FieldGroup::Clinician).is_none());
    }

    #[test]
    fn provenance_never_blocks_other_forms() {
        let store = InMemorySharedContext::new();
        store.update_second_practitioner(&tag("form-A3"), &mut |p| p.name = "Dr Jones".into());
        store.update_second_practitioner(&tag("form-A7"), &mut |p| p.name = "Dr Smith".into());

        let ctx = store.read();
        assert_eq!(ctx.second_practitioner.name, "Dr Smith");
        assert_eq!(
            ctx.provenance
                .get(FieldGroup::SecondPractitioner)
                .map(|p| p.source.as_str()),
            Some("form-A7")
        );
    }

    #[test]
    fn update_clinical_reasons_marks_present() {
        let store = InMemorySharedContext::new();
        assert!(!store.read().clinical_reasons_present);

        store.update_clinical_reasons(&tag("form-A3"), &mut |reasons| {
            reasons.primary_diagnosis = "Schizophrenia".into();
        });

        let ctx = store.read();
        assert!(ctx.clinical_reasons_present);
        assert_eq!(ctx.clinical_reasons.primary_diagnosis, "Schizophrenia");
    }

    #[test]
    fn declined_clinical_reasons_update_changes_nothing() {
        let store = InMemorySharedContext::new();
        store.update_clinical_reasons(&tag("form-A3"), &mut |reasons| {
            reasons.disorder_description = "Low mood".into();
        });
        let before = store.read();

        let written = store.update_clinical_reasons_if(&tag("form-A7"), &mut |reasons, present| {
            assert!(present, "flag is read under the write");
            reasons.disorder_description = "Discarded".into();
            false
        });

        assert!(!written);
        assert_eq!(store.read(), before);
    }

    #[test]
    fn clinical_reasons_update_sees_present_flag_at_write_time() {
        let store = InMemorySharedContext::new();
        let mut seen = Vec::new();

        for source in ["form-A3", "form-A7"] {
            store.update_clinical_reasons_if(&tag(source), &mut |reasons, present| {
                seen.push(present);
                reasons.primary_diagnosis = source.into();
                !present
            });
        }

        assert_eq!(seen, vec![false, true]);
        let ctx = store.read();
        assert_eq!(ctx.clinical_reasons.primary_diagnosis, "form-A3");
        assert_eq!(
            ctx.provenance
                .get(FieldGroup::ClinicalReasons)
                .map(|p| p.source.as_str()),
            Some("form-A3")
        );
    }

    #[test]
    fn concurrent_updates_are_atomic() {
        let store = Arc::new(InMemorySharedContext::new());
        let source = tag("form-A3");

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                let source = source.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        store.update_clinician(&source, &mut |clinician| {
                            clinician.organisation.push('x');
                        });
                    }
                });
            }
        });

        assert_eq!(store.read().clinician.organisation.len(), 400);
    }

    #[test]
    fn with_snapshot_round_trips_through_serde() {
        let store = InMemorySharedContext::new();
        store.update_clinician(&tag("settings"), &mut |clinician| {
            clinician.name = "Dr Amy Lee".into();
            clinician.email = "amy.lee@nhs.net".into();
        });

        let json = serde_json::to_string(&store.read()).expect("serialise context");
        let restored: SharedContext = serde_json::from_str(&json).expect("deserialise context");
        let reloaded = InMemorySharedContext::with_snapshot(restored);

        assert_eq!(reloaded.read(), store.read());
    }
}

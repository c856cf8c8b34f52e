//! Snapshot generation through the public entry points

use hearth_snapshot::{
    generate_snapshot, DifferentialMerger, Error, IssueSeverity, SnapshotGenerator,
};
mod test_support;

use test_support::{ids, make_element, make_slice, patient_base, patient_profile};

#[test]
fn test_generate_snapshot_merges_existing_element() {
    let profile = patient_profile(vec![make_element("Patient.name", Some(1), Some("1"))]);

    let snapshot = generate_snapshot(&patient_base(), &profile).unwrap();

    assert_eq!(snapshot.element.len(), 6);
    let name = snapshot
        .element
        .iter()
        .find(|e| e.path == "Patient.name")
        .unwrap();
    assert_eq!(name.min, Some(1));
    assert_eq!(name.max, Some("1".to_string()));
}

#[test]
fn test_unordered_differential_is_sorted_before_merging() {
    let mut merger_input = patient_profile(vec![
        make_element("Patient.identifier:mrn.value", Some(1), Some("1")),
        make_element("Patient.birthDate", Some(1), Some("1")),
        make_slice("Patient.identifier", "mrn", 0, "1"),
    ]);
    merger_input.differential.as_mut().unwrap().element[0].path =
        "Patient.identifier.value".to_string();
    merger_input.differential.as_mut().unwrap().element[0].id =
        Some("Patient.identifier:mrn.value".to_string());

    let merger = DifferentialMerger::new();
    let problems = merger.sort_differential(&patient_base(), &mut merger_input);
    assert!(problems.is_empty(), "{:?}", problems);

    let outcome = merger.generate(&patient_base(), &merger_input);
    assert!(outcome.worst().is_none(), "{:?}", outcome.messages);

    let snapshot = outcome.snapshot.unwrap();
    assert_eq!(
        ids(&snapshot),
        vec![
            "Patient",
            "Patient.identifier",
            "Patient.identifier.system",
            "Patient.identifier.value",
            "Patient.identifier:mrn",
            "Patient.identifier:mrn.system",
            "Patient.identifier:mrn.value",
            "Patient.name",
            "Patient.birthDate",
        ]
    );
    assert_eq!(snapshot.element[6].min, Some(1));
    assert_eq!(snapshot.element[8].min, Some(1));
}

#[test]
fn test_slice_before_its_element_without_sorting_is_still_placed() {
    let profile = patient_profile(vec![make_slice("Patient.identifier", "nhs", 0, "1")]);

    let snapshot = generate_snapshot(&patient_base(), &profile).unwrap();

    assert!(ids(&snapshot).contains(&"Patient.identifier:nhs.system".to_string()));
}

#[test]
fn test_generate_snapshot_fails_on_widened_cardinality() {
    let profile = patient_profile(vec![make_element("Patient.birthDate", Some(0), Some("2"))]);

    let err = generate_snapshot(&patient_base(), &profile).unwrap_err();

    match err {
        Error::Snapshot(message) => {
            assert!(message.starts_with("Patient.birthDate:"), "{}", message)
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_orphan_is_reported_while_sorting() {
    let profile = patient_profile(vec![make_element("Patient.contact.name", None, None)]);

    let err = generate_snapshot(&patient_base(), &profile).unwrap_err();

    assert!(matches!(err, Error::Differential(_)));
}

#[test]
fn test_unchanged_elements_only_warn() {
    let profile = patient_profile(vec![make_element("Patient.name", None, None)]);

    let outcome = DifferentialMerger.generate(&patient_base(), &profile);

    assert_eq!(outcome.worst(), Some(IssueSeverity::Warning));
    assert!(generate_snapshot(&patient_base(), &profile).is_ok());
}

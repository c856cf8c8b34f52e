#![allow(dead_code)]

use hearth_models::{
    Differential, ElementDefinition, Snapshot, StructureDefinition, StructureDefinitionKind,
    TypeDerivationRule,
};

pub const BASE_URL: &str = "http://example.org/fhir/StructureDefinition/Patient";
pub const PROFILE_URL: &str = "http://example.org/fhir/StructureDefinition/patient-profile";

pub fn make_element(path: &str, min: Option<u32>, max: Option<&str>) -> ElementDefinition {
    let mut element = ElementDefinition::new(path);
    element.min = min;
    element.max = max.map(str::to_string);
    element
}

pub fn make_slice(path: &str, slice_name: &str, min: u32, max: &str) -> ElementDefinition {
    let mut element = make_element(path, Some(min), Some(max));
    element.slice_name = Some(slice_name.to_string());
    element.id = Some(format!("{}:{}", path, slice_name));
    element
}

/// A small Patient specialization with a complete snapshot
pub fn patient_base() -> StructureDefinition {
    let mut sd = StructureDefinition::new(
        BASE_URL,
        "Patient",
        StructureDefinitionKind::Resource,
        "Patient",
    );
    sd.derivation = Some(TypeDerivationRule::Specialization);
    sd.snapshot = Some(Snapshot {
        element: vec![
            make_element("Patient", Some(0), Some("*")),
            make_element("Patient.identifier", Some(0), Some("*")).with_type("Identifier"),
            make_element("Patient.identifier.system", Some(0), Some("1")).with_type("uri"),
            make_element("Patient.identifier.value", Some(0), Some("1")).with_type("string"),
            make_element("Patient.name", Some(0), Some("*")).with_type("HumanName"),
            make_element("Patient.birthDate", Some(0), Some("1")).with_type("date"),
        ],
    });
    sd
}

/// A constraint on [`patient_base`] with the given differential
pub fn patient_profile(elements: Vec<ElementDefinition>) -> StructureDefinition {
    let mut sd = StructureDefinition::new(
        PROFILE_URL,
        "PatientProfile",
        StructureDefinitionKind::Resource,
        "Patient",
    );
    sd.derivation = Some(TypeDerivationRule::Constraint);
    sd.base_definition = Some(BASE_URL.to_string());
    sd.differential = Some(Differential { element: elements });
    sd
}

pub fn ids(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .element
        .iter()
        .map(|e| e.id.clone().unwrap_or_else(|| e.key()))
        .collect()
}

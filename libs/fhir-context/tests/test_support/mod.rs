#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use hearth_context::{DifferentialMerger, SnapshotGenerator, SnapshotOutcome};
use hearth_models::{
    Differential, ElementDefinition, Snapshot, StructureDefinition, StructureDefinitionKind,
    TypeDerivationRule,
};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use zip::write::SimpleFileOptions;

pub const BASE_URL: &str = "http://example.org/fhir/StructureDefinition/Patient";
pub const PROFILE_URL: &str = "http://example.org/fhir/StructureDefinition/patient-profile";

/// Records every `generate` call and delegates to [`DifferentialMerger`].
#[derive(Default)]
pub struct CountingGenerator {
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl CountingGenerator {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    /// URLs of the definitions generated so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SnapshotGenerator for CountingGenerator {
    fn sort_differential(
        &self,
        base: &StructureDefinition,
        derived: &mut StructureDefinition,
    ) -> Vec<String> {
        DifferentialMerger::new().sort_differential(base, derived)
    }

    fn generate(
        &self,
        base: &StructureDefinition,
        derived: &StructureDefinition,
    ) -> SnapshotOutcome {
        self.calls.lock().unwrap().push(derived.url.clone());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        DifferentialMerger::new().generate(base, derived)
    }
}

/// Answers every call with the same sort problems and generation outcome.
#[derive(Default)]
pub struct FixedGenerator {
    pub problems: Vec<String>,
    pub outcome: SnapshotOutcome,
}

impl FixedGenerator {
    pub fn returning(outcome: SnapshotOutcome) -> Self {
        Self {
            problems: Vec::new(),
            outcome,
        }
    }

    pub fn sort_problems(problems: &[&str]) -> Self {
        Self {
            problems: problems.iter().map(|p| p.to_string()).collect(),
            outcome: SnapshotOutcome::default(),
        }
    }
}

impl SnapshotGenerator for FixedGenerator {
    fn sort_differential(
        &self,
        _base: &StructureDefinition,
        _derived: &mut StructureDefinition,
    ) -> Vec<String> {
        self.problems.clone()
    }

    fn generate(
        &self,
        _base: &StructureDefinition,
        _derived: &StructureDefinition,
    ) -> SnapshotOutcome {
        self.outcome.clone()
    }
}

pub fn element(path: &str, min: u32, max: &str) -> ElementDefinition {
    ElementDefinition::new(path).with_cardinality(min, max)
}

/// A Patient specialization with a complete snapshot
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
            element("Patient", 0, "*"),
            element("Patient.identifier", 0, "*").with_type("Identifier"),
            element("Patient.name", 0, "*").with_type("HumanName"),
            element("Patient.birthDate", 0, "1").with_type("date"),
        ],
    });
    sd
}

/// A constraint on `base_url` with only a differential
pub fn profile(
    url: &str,
    name: &str,
    base_url: Option<&str>,
    elements: Vec<ElementDefinition>,
) -> StructureDefinition {
    let mut sd = StructureDefinition::new(url, name, StructureDefinitionKind::Resource, "Patient");
    sd.derivation = Some(TypeDerivationRule::Constraint);
    sd.base_definition = base_url.map(str::to_string);
    sd.differential = Some(Differential { element: elements });
    sd
}

pub fn to_json(sd: &StructureDefinition) -> Vec<u8> {
    serde_json::to_vec(sd).unwrap()
}

pub fn resource_json(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

pub fn structure_map(url: &str, sources: &[&str], targets: &[&str]) -> Value {
    let structures: Vec<Value> = sources
        .iter()
        .map(|s| json!({ "url": s, "mode": "source" }))
        .chain(targets.iter().map(|t| json!({ "url": t, "mode": "target" })))
        .collect();
    json!({
        "resourceType": "StructureMap",
        "url": url,
        "name": "Map",
        "status": "active",
        "structure": structures
    })
}

/// A zip pack holding `files` in order
pub fn zip_pack(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// An NPM package tarball; `files` are paths below `package/`
pub fn npm_package(name: &str, version: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let manifest = resource_json(json!({
        "name": name,
        "version": version,
        "fhirVersions": ["4.0.1"]
    }));

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut append = |path: &str, data: &[u8]| {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("package/{}", path), data)
            .unwrap();
    };
    append("package.json", &manifest);
    for (path, data) in files {
        append(path, data);
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub const PATIENT_BASE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StructureDefinition xmlns="http://hl7.org/fhir">
  <id value="Patient"/>
  <url value="http://example.org/fhir/StructureDefinition/Patient"/>
  <name value="Patient"/>
  <status value="active"/>
  <kind value="resource"/>
  <abstract value="false"/>
  <type value="Patient"/>
  <derivation value="specialization"/>
  <snapshot>
    <element id="Patient">
      <path value="Patient"/>
      <min value="0"/>
      <max value="*"/>
    </element>
    <element id="Patient.identifier">
      <path value="Patient.identifier"/>
      <min value="0"/>
      <max value="*"/>
      <type>
        <code value="Identifier"/>
      </type>
    </element>
    <element id="Patient.name">
      <path value="Patient.name"/>
      <short value="A name associated with the patient"/>
      <min value="0"/>
      <max value="*"/>
      <type>
        <code value="HumanName"/>
      </type>
    </element>
    <element id="Patient.birthDate">
      <path value="Patient.birthDate"/>
      <min value="0"/>
      <max value="1"/>
      <type>
        <code value="date"/>
      </type>
    </element>
  </snapshot>
</StructureDefinition>
"#;

pub const PATIENT_PROFILE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StructureDefinition xmlns="http://hl7.org/fhir">
  <id value="patient-profile"/>
  <url value="http://example.org/fhir/StructureDefinition/patient-profile"/>
  <name value="PatientProfile"/>
  <status value="draft"/>
  <kind value="resource"/>
  <abstract value="false"/>
  <type value="Patient"/>
  <baseDefinition value="http://example.org/fhir/StructureDefinition/Patient"/>
  <derivation value="constraint"/>
  <differential>
    <element id="Patient.name">
      <path value="Patient.name"/>
      <min value="1"/>
      <max value="1"/>
    </element>
    <element id="Patient.birthDate">
      <path value="Patient.birthDate"/>
      <mustSupport value="true"/>
    </element>
  </differential>
</StructureDefinition>
"#;

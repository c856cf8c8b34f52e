use hearth_format::{decode, encode, ResourceFormat};
use serde_json::{json, Value};

const PROFILE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StructureDefinition xmlns="http://hl7.org/fhir">
  <id value="patient-profile"/>
  <text>
    <status value="generated"/>
    <div xmlns="http://www.w3.org/1999/xhtml"><p>Profile</p></div>
  </text>
  <url value="http://example.org/fhir/StructureDefinition/patient-profile"/>
  <version value="1"/>
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
  </differential>
</StructureDefinition>
"#;

#[test]
fn xml_profile_decodes_to_fhir_json_shape() {
    let value = decode(PROFILE_XML.as_bytes(), ResourceFormat::Xml).expect("decodes");

    assert_eq!(value["resourceType"], "StructureDefinition");
    assert_eq!(value["abstract"], false);
    // Strings that look numeric stay strings unless the element is numeric.
    assert_eq!(value["version"], "1");
    assert_eq!(value["type"], "Patient");

    let elements = value["differential"]["element"]
        .as_array()
        .expect("single element still decodes as an array");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0]["id"], "Patient.name");
    assert_eq!(elements[0]["min"], 1);
    assert_eq!(elements[0]["max"], "1");

    let div = value["text"]["div"].as_str().unwrap();
    assert!(div.starts_with("<div"));
}

#[test]
fn xml_bundle_unwraps_entry_resources() {
    let xml = r#"
    <Bundle xmlns="http://hl7.org/fhir">
      <type value="collection"/>
      <entry>
        <fullUrl value="http://example.org/fhir/StructureMap/pat"/>
        <resource>
          <StructureMap>
            <url value="http://example.org/fhir/StructureMap/pat"/>
            <name value="Pat"/>
            <status value="active"/>
            <structure>
              <url value="http://example.org/fhir/StructureDefinition/Patient"/>
              <mode value="source"/>
              <alias value="src"/>
            </structure>
          </StructureMap>
        </resource>
      </entry>
    </Bundle>
    "#;

    let value = decode(xml.as_bytes(), ResourceFormat::Xml).unwrap();
    let map = &value["entry"][0]["resource"];
    assert_eq!(map["resourceType"], "StructureMap");
    assert_eq!(map["structure"][0]["mode"], "source");
    assert_eq!(map["structure"][0]["alias"], "src");
}

#[test]
fn malformed_xml_is_a_format_error() {
    let err = decode(b"<StructureDefinition><url", ResourceFormat::Xml).unwrap_err();
    assert!(err.to_string().starts_with("XML parse error"));
}

#[test]
fn xml_encoding_reads_back_the_same_value() {
    let original = json!({
        "resourceType": "ValueSet",
        "url": "http://example.org/fhir/ValueSet/colors",
        "status": "active",
        "compose": {
            "include": [
                { "system": "http://example.org/CodeSystem/colors", "valueSet": ["http://a"] }
            ]
        }
    });

    let xml = encode(&original, ResourceFormat::Xml).unwrap();
    let back: Value = decode(xml.as_bytes(), ResourceFormat::Xml).unwrap();
    assert_eq!(back, original);
}

#[test]
fn boolean_looking_codes_stay_strings() {
    let xml = r#"<CodeSystem xmlns="http://hl7.org/fhir">
  <url value="http://example.org/CodeSystem/answers"/>
  <status value="active"/>
  <caseSensitive value="true"/>
  <content value="complete"/>
  <concept>
    <code value="true"/>
    <display value="Yes"/>
  </concept>
  <concept>
    <code value="false"/>
  </concept>
</CodeSystem>
"#;

    let value = decode(xml.as_bytes(), ResourceFormat::Xml).expect("decodes");

    assert_eq!(value["caseSensitive"], true);
    assert_eq!(value["concept"][0]["code"], "true");
    assert_eq!(value["concept"][1]["code"], "false");
    assert_eq!(value["concept"][0]["display"], "Yes");
}

//! FHIR resource decoding and encoding.
//!
//! Both wire formats decode to the same `serde_json::Value` shape (the FHIR
//! JSON representation), which typed models then deserialize from. XML is
//! mapped following the official JSON/XML mapping rules:
//! - Root element name becomes `resourceType`.
//! - Primitive values come from the `value` attribute.
//! - Primitive metadata (`id`, `extension`) is carried through `_field` entries.
//! - Repeated elements become arrays, aligned with their metadata arrays.
//! - `resource`/`contained` wrappers unwrap into nested resources.
//!
//! XML does not say which elements repeat or which primitives are numeric, so
//! the mapping carries a small table of FHIR element names for both.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node};
use serde_json::{Map, Number, Value};
use std::io::{Cursor, Write};
use thiserror::Error;

const FHIR_NS: &str = "http://hl7.org/fhir";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("expected a JSON object for the resource")]
    ExpectedObject,
    #[error("missing resourceType property")]
    MissingResourceType,
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
    #[error("XML write error: {0}")]
    XmlIo(#[from] std::io::Error),
}

/// Serialization format of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFormat {
    Xml,
    Json,
}

impl ResourceFormat {
    /// Format implied by a file name suffix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".xml") {
            Some(Self::Xml)
        } else if name.ends_with(".json") {
            Some(Self::Json)
        } else {
            None
        }
    }
}

/// Decode a serialized resource (or bundle) into its FHIR JSON value.
pub fn decode(bytes: &[u8], format: ResourceFormat) -> Result<Value, FormatError> {
    let text = std::str::from_utf8(strip_bom(bytes))?;
    let value = match format {
        ResourceFormat::Json => serde_json::from_str::<Value>(text)?,
        ResourceFormat::Xml => xml_to_value(text)?,
    };
    let obj = value.as_object().ok_or(FormatError::ExpectedObject)?;
    if !obj.get("resourceType").is_some_and(Value::is_string) {
        return Err(FormatError::MissingResourceType);
    }
    Ok(value)
}

/// Encode a FHIR JSON value in the requested format.
pub fn encode(value: &Value, format: ResourceFormat) -> Result<String, FormatError> {
    match format {
        ResourceFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        ResourceFormat::Xml => value_to_xml(value),
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

// ----------------------------------------------------------------------------
// XML -> JSON
// ----------------------------------------------------------------------------

/// Convert a FHIR XML payload into its JSON value.
pub fn xml_to_value(input: &str) -> Result<Value, FormatError> {
    let doc = Document::parse(input)?;
    Ok(Value::Object(resource_to_object(input, doc.root_element())))
}

fn resource_to_object(source: &str, node: Node) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "resourceType".to_string(),
        Value::String(node.tag_name().name().to_string()),
    );
    map.extend(complex_to_object(source, node));
    map
}

fn complex_to_object(source: &str, node: Node) -> Map<String, Value> {
    let mut obj = Map::new();
    for attr in ["id", "url"] {
        if let Some(v) = node.attribute(attr) {
            obj.insert(attr.to_string(), Value::String(v.to_string()));
        }
    }

    let parent = node.tag_name().name();
    for child in node.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();

        if child.tag_name().namespace() == Some(XHTML_NS) {
            let snippet = &source[child.range()];
            push_property(&mut obj, name, Value::String(snippet.to_string()), None, false);
            continue;
        }

        if let Some(raw) = child.attribute("value") {
            let meta = primitive_metadata(source, child);
            let repeating = repeats_primitive(parent, name);
            push_property(&mut obj, name, primitive_value(name, raw), meta, repeating);
            continue;
        }

        let value = if matches!(name, "resource" | "contained" | "outcome") {
            match child.children().find(|n| n.is_element()) {
                Some(inner) => Value::Object(resource_to_object(source, inner)),
                None => Value::Object(Map::new()),
            }
        } else {
            Value::Object(complex_to_object(source, child))
        };
        let repeating = repeats_complex(name);
        push_property(&mut obj, name, value, None, repeating);
    }
    obj
}

fn primitive_metadata(source: &str, node: Node) -> Option<Value> {
    let mut meta = Map::new();
    if let Some(id) = node.attribute("id") {
        meta.insert("id".to_string(), Value::String(id.to_string()));
    }
    let extensions: Vec<Value> = node
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "extension")
        .map(|c| Value::Object(complex_to_object(source, c)))
        .collect();
    if !extensions.is_empty() {
        meta.insert("extension".to_string(), Value::Array(extensions));
    }
    (!meta.is_empty()).then_some(Value::Object(meta))
}

fn push_property(
    obj: &mut Map<String, Value>,
    name: &str,
    value: Value,
    meta: Option<Value>,
    repeating: bool,
) {
    let meta_key = format!("_{}", name);

    let index = match obj.get_mut(name) {
        Some(Value::Array(items)) => {
            items.push(value);
            items.len() - 1
        }
        Some(existing) => {
            // A repeat the name table did not anticipate.
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
            1
        }
        None if repeating => {
            obj.insert(name.to_string(), Value::Array(vec![value]));
            0
        }
        None => {
            obj.insert(name.to_string(), value);
            if let Some(m) = meta {
                obj.insert(meta_key, m);
            }
            return;
        }
    };

    let aligned = obj.contains_key(&meta_key);
    if meta.is_none() && !aligned {
        return;
    }
    let slot = obj
        .entry(meta_key)
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        let first = slot.take();
        *slot = Value::Array(vec![first]);
    }
    if let Value::Array(metas) = slot {
        metas.resize(index, Value::Null);
        metas.push(meta.unwrap_or(Value::Null));
    }
}

fn primitive_value(name: &str, raw: &str) -> Value {
    if is_integer_element(name) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    if name.ends_with("Decimal") {
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    match raw {
        "true" if is_boolean_element(name) => Value::Bool(true),
        "false" if is_boolean_element(name) => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn is_boolean_element(name: &str) -> bool {
    matches!(
        name,
        "abstract"
            | "mustSupport"
            | "isModifier"
            | "isSummary"
            | "experimental"
            | "immutable"
            | "sliceIsConstraining"
            | "caseSensitive"
            | "compositional"
            | "versionNeeded"
            | "inactive"
            | "ordered"
            | "required"
            | "repeats"
            | "readOnly"
            | "lockedDate"
            | "active"
            | "mustHaveValue"
            | "preferred"
            | "conditionalCreate"
            | "conditionalDelete"
            | "multipleAnd"
            | "multipleOr"
    ) || name.ends_with("Boolean")
}

fn is_integer_element(name: &str) -> bool {
    matches!(
        name,
        "min" | "maxLength" | "minLength" | "total" | "count" | "offset" | "index"
    ) || name.ends_with("Integer")
        || name.ends_with("UnsignedInt")
        || name.ends_with("PositiveInt")
}

/// Complex elements that are arrays wherever they appear in conformance resources.
fn repeats_complex(name: &str) -> bool {
    matches!(
        name,
        "code"
            | "coding"
            | "concept"
            | "constraint"
            | "contact"
            | "contained"
            | "contains"
            | "context"
            | "dependent"
            | "dependsOn"
            | "designation"
            | "discriminator"
            | "element"
            | "entry"
            | "example"
            | "exclude"
            | "extension"
            | "filter"
            | "group"
            | "identifier"
            | "include"
            | "input"
            | "item"
            | "jurisdiction"
            | "keyword"
            | "link"
            | "mapping"
            | "modifierExtension"
            | "parameter"
            | "property"
            | "rule"
            | "source"
            | "structure"
            | "target"
            | "telecom"
            | "type"
            | "uniqueId"
            | "useContext"
    )
}

/// Primitive elements that repeat, keyed by their parent where the name is ambiguous.
fn repeats_primitive(parent: &str, name: &str) -> bool {
    match name {
        "profile" | "targetProfile" | "condition" | "representation" | "aggregation"
        | "import" | "operator" | "contextInvariant" | "variable" | "base" => true,
        "alias" => parent != "structure",
        "valueSet" => matches!(parent, "include" | "exclude"),
        _ => false,
    }
}

// ----------------------------------------------------------------------------
// JSON -> XML
// ----------------------------------------------------------------------------

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Convert a FHIR JSON value into its XML representation.
pub fn value_to_xml(value: &Value) -> Result<String, FormatError> {
    let obj = value.as_object().ok_or(FormatError::ExpectedObject)?;
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_resource(&mut writer, obj, true)?;
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_resource(
    writer: &mut XmlWriter,
    obj: &Map<String, Value>,
    root: bool,
) -> Result<(), FormatError> {
    let resource_type = obj
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or(FormatError::MissingResourceType)?;

    let mut start = BytesStart::new(resource_type);
    if root {
        start.push_attribute(("xmlns", FHIR_NS));
    }
    writer.write_event(Event::Start(start))?;
    write_members(writer, obj)?;
    writer.write_event(Event::End(BytesEnd::new(resource_type)))?;
    Ok(())
}

fn write_members(writer: &mut XmlWriter, obj: &Map<String, Value>) -> Result<(), FormatError> {
    for (k, v) in obj {
        if k == "resourceType" || k.starts_with('_') {
            continue;
        }
        write_value(writer, k, v, obj.get(&format!("_{}", k)))?;
    }
    // Metadata without a value (e.g. `_active` carrying only extensions)
    for (k, meta) in obj {
        if let Some(name) = k.strip_prefix('_') {
            if !obj.contains_key(name) {
                write_value(writer, name, &Value::Null, Some(meta))?;
            }
        }
    }
    Ok(())
}

fn write_value(
    writer: &mut XmlWriter,
    name: &str,
    value: &Value,
    meta: Option<&Value>,
) -> Result<(), FormatError> {
    match value {
        Value::Array(items) => {
            let metas = meta.and_then(Value::as_array);
            for (idx, item) in items.iter().enumerate() {
                write_value(writer, name, item, metas.and_then(|m| m.get(idx)))?;
            }
        }
        Value::Object(obj) if obj.contains_key("resourceType") => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            write_resource(writer, obj, false)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Value::Object(obj) => {
            let attrs: &[&str] = if matches!(name, "extension" | "modifierExtension") {
                &["id", "url"]
            } else {
                &["id"]
            };
            let mut start = BytesStart::new(name);
            for attr in attrs {
                if let Some(Value::String(v)) = obj.get(*attr) {
                    start.push_attribute((*attr, v.as_str()));
                }
            }
            writer.write_event(Event::Start(start))?;
            let body: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| !attrs.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            write_members(writer, &body)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Value::String(s) if name == "div" && s.trim_start().starts_with('<') => {
            writer.get_mut().write_all(s.as_bytes())?;
        }
        primitive => write_primitive(writer, name, primitive, meta)?,
    }
    Ok(())
}

fn write_primitive(
    writer: &mut XmlWriter,
    name: &str,
    value: &Value,
    meta: Option<&Value>,
) -> Result<(), FormatError> {
    let mut elem = BytesStart::new(name);
    let rendered = match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    };
    if let Some(ref v) = rendered {
        elem.push_attribute(("value", v.as_str()));
    }

    let meta = meta.and_then(Value::as_object);
    if let Some(Value::String(id)) = meta.and_then(|m| m.get("id")) {
        elem.push_attribute(("id", id.as_str()));
    }
    let extensions = meta.and_then(|m| m.get("extension"));

    match (rendered, extensions) {
        (None, None) => {}
        (_, Some(ext)) => {
            writer.write_event(Event::Start(elem))?;
            write_value(writer, "extension", ext, None)?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        (Some(_), None) => writer.write_event(Event::Empty(elem))?,
    }
    Ok(())
}

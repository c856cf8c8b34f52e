//! ID and slice name normalization for FHIR elements
//!
//! Element ids follow the path, with `:sliceName` appended to the segment
//! that introduces a slice (`Patient.identifier:mrn.system`).

use hearth_models::{Differential, ElementDefinition, Snapshot};

/// Id of an element, built from path and slice name when absent
pub fn element_id(element: &ElementDefinition) -> String {
    element.id.clone().unwrap_or_else(|| element.key())
}

/// Split an id into `(name, sliceName)` segments
pub fn id_segments(id: &str) -> Vec<(&str, Option<&str>)> {
    id.split('.')
        .map(|segment| match segment.split_once(':') {
            Some((name, slice)) => (name, Some(slice)),
            None => (segment, None),
        })
        .collect()
}

/// Id of the parent element (`None` for the root)
pub fn parent_id(id: &str) -> Option<&str> {
    id.rfind('.').map(|pos| &id[..pos])
}

/// Id of the element being sliced, for a slice id (`A.b:s` gives `A.b`)
pub fn sliced_id(id: &str) -> Option<&str> {
    let last = id.rfind('.').map_or(0, |pos| pos + 1);
    id[last..].rfind(':').map(|pos| &id[..last + pos])
}

/// Normalize IDs and slice names in a snapshot
pub fn normalize_snapshot(snapshot: &mut Snapshot) {
    for element in &mut snapshot.element {
        normalize_element_id(element);
    }
}

/// Normalize IDs and slice names in a differential
///
/// A slice declared only through its id (`Patient.identifier:mrn`) gets
/// its `sliceName` filled in.
pub fn normalize_differential(differential: &mut Differential) {
    for element in &mut differential.element {
        if element.slice_name.is_none() {
            if let Some(id) = &element.id {
                element.slice_name = extract_slice_name_from_id(id, &element.path);
            }
        }
        normalize_element_id(element);
    }
}

/// Normalize a single element's ID based on path and slice name
fn normalize_element_id(element: &mut ElementDefinition) {
    match (&element.id, &element.slice_name) {
        (None, _) => element.id = Some(element.key()),
        (Some(id), Some(slice_name)) => {
            let suffix = format!(":{}", slice_name);
            if !id.ends_with(&suffix) {
                let base = sliced_id(id).unwrap_or(id);
                element.id = Some(format!("{}{}", base, suffix));
            }
        }
        (Some(_), None) => {}
    }
}

/// Replace the root type of an element's path and id (`DomainResource.text`
/// becomes `Patient.text`)
pub fn rebase_element(element: &mut ElementDefinition, from_root: &str, to_root: &str) {
    if from_root == to_root {
        return;
    }
    element.path = rebase(&element.path, from_root, to_root);
    if let Some(id) = &element.id {
        element.id = Some(rebase(id, from_root, to_root));
    }
}

fn rebase(value: &str, from_root: &str, to_root: &str) -> String {
    match value.strip_prefix(from_root) {
        Some("") => to_root.to_string(),
        Some(rest) if rest.starts_with('.') || rest.starts_with(':') => {
            format!("{}{}", to_root, rest)
        }
        _ => value.to_string(),
    }
}

/// Generate a slice name from an ID
///
/// If the last segment of the ID is in the format "name:sliceName", extract the slice name
pub fn extract_slice_name_from_id(id: &str, path: &str) -> Option<String> {
    let last = id.rsplit('.').next()?;
    let (name, slice) = last.split_once(':')?;
    let path_last = path.rsplit('.').next()?;
    (name == path_last && !slice.is_empty()).then(|| slice.to_string())
}

//! Differential ordering
//!
//! Differentials may list their elements in any order. Merging expects them
//! in the order of the base snapshot, with new children after their
//! parent's existing subtree and slices after the element they slice.

use crate::normalization::{element_id, id_segments};
use hearth_models::{Differential, ElementDefinition, Snapshot};

/// Sort `differential` into base order and report elements that cannot be placed.
pub fn sort_differential(base: &Snapshot, differential: &mut Differential) -> Vec<String> {
    let mut problems = Vec::new();

    for (i, element) in differential.element.iter().enumerate() {
        let Some(parent) = element.parent_path() else {
            continue;
        };
        let in_base = base_position(base, &parent).is_some();
        let earlier = differential.element[..i].iter().any(|e| e.path == parent);
        if !in_base && !earlier {
            problems.push(format!(
                "The element {} has no parent {} in the base or earlier in the differential",
                element_id(element),
                parent
            ));
        }
    }

    let keys: Vec<Vec<(usize, usize)>> = differential
        .element
        .iter()
        .map(|e| sort_key(base, &differential.element, e))
        .collect();

    let mut keyed: Vec<_> = keys.into_iter().zip(differential.element.drain(..)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    differential.element = keyed.into_iter().map(|(_, e)| e).collect();

    problems
}

/// Position of the unsliced element with `path`, matching choice
/// elements (`value[x]`) by their renamed form (`valueQuantity`).
pub(crate) fn base_position(base: &Snapshot, path: &str) -> Option<usize> {
    base.element
        .iter()
        .position(|e| e.path == path && e.slice_name.is_none())
        .or_else(|| {
            base.element
                .iter()
                .position(|e| e.slice_name.is_none() && choice_matches(&e.path, path))
        })
}

/// Whether `path` is a type-specific rename of the choice element `choice_path`
pub(crate) fn choice_matches(choice_path: &str, path: &str) -> bool {
    choice_path
        .strip_suffix("[x]")
        .and_then(|stem| path.strip_prefix(stem))
        .is_some_and(|rest| {
            rest.chars().next().is_some_and(char::is_uppercase) && !rest.contains('.')
        })
}

/// One `(position, slice rank)` pair per id segment.
///
/// Positions come from the base snapshot; paths the base lacks sort after
/// every base element, in differential order. Unsliced segments rank 0 and
/// slices rank by first appearance.
fn sort_key(
    base: &Snapshot,
    differential: &[ElementDefinition],
    element: &ElementDefinition,
) -> Vec<(usize, usize)> {
    let id = element_id(element);
    let mut path = String::new();
    let mut prefix_id = String::new();
    let mut key = Vec::new();

    for (name, slice) in id_segments(&id) {
        if !path.is_empty() {
            path.push('.');
            prefix_id.push('.');
        }
        path.push_str(name);
        prefix_id.push_str(name);

        let position = base_position(base, &path).unwrap_or_else(|| {
            base.element.len()
                + differential
                    .iter()
                    .position(|e| e.path == path)
                    .unwrap_or(differential.len())
        });

        let rank = match slice {
            None => 0,
            Some(slice) => {
                prefix_id.push(':');
                prefix_id.push_str(slice);
                1 + differential
                    .iter()
                    .position(|e| {
                        let other = element_id(e);
                        other == prefix_id || other.starts_with(&format!("{}.", prefix_id))
                    })
                    .unwrap_or(differential.len())
            }
        };

        key.push((position, rank));
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Snapshot {
        Snapshot {
            element: ["Patient", "Patient.identifier", "Patient.name", "Patient.gender"]
                .into_iter()
                .map(ElementDefinition::new)
                .collect(),
        }
    }

    fn ids(differential: &Differential) -> Vec<String> {
        differential.element.iter().map(element_id).collect()
    }

    fn slice(path: &str, name: &str) -> ElementDefinition {
        let mut element = ElementDefinition::new(path);
        element.slice_name = Some(name.to_string());
        element.id = Some(format!("{}:{}", path, name));
        element
    }

    #[test]
    fn sorts_into_base_order() {
        let mut differential = Differential {
            element: vec![
                ElementDefinition::new("Patient.gender"),
                ElementDefinition::new("Patient.name"),
                ElementDefinition::new("Patient"),
            ],
        };

        let problems = sort_differential(&base(), &mut differential);

        assert!(problems.is_empty());
        assert_eq!(ids(&differential), vec!["Patient", "Patient.name", "Patient.gender"]);
    }

    #[test]
    fn slices_follow_their_element_and_new_children_follow_existing_ones() {
        let mut child = ElementDefinition::new("Patient.identifier.system");
        child.id = Some("Patient.identifier:mrn.system".to_string());
        let mut differential = Differential {
            element: vec![
                ElementDefinition::new("Patient.gender"),
                child,
                slice("Patient.identifier", "mrn"),
                ElementDefinition::new("Patient.identifier"),
            ],
        };

        let problems = sort_differential(&base(), &mut differential);

        assert!(problems.is_empty());
        assert_eq!(
            ids(&differential),
            vec![
                "Patient.identifier",
                "Patient.identifier:mrn",
                "Patient.identifier:mrn.system",
                "Patient.gender"
            ]
        );
    }

    #[test]
    fn reports_orphans() {
        let mut differential = Differential {
            element: vec![ElementDefinition::new("Patient.contact.name")],
        };

        let problems = sort_differential(&base(), &mut differential);

        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("Patient.contact.name"));
    }

    #[test]
    fn choice_renames_find_their_base_position() {
        let snapshot = Snapshot {
            element: vec![
                ElementDefinition::new("Observation"),
                ElementDefinition::new("Observation.value[x]"),
            ],
        };
        assert_eq!(base_position(&snapshot, "Observation.valueQuantity"), Some(1));
        assert_eq!(base_position(&snapshot, "Observation.valuequantity"), None);
    }
}

//! Snapshot generation by merging a differential over its base snapshot.

use crate::generator::{SnapshotGenerator, SnapshotOutcome, ValidationMessage};
use crate::normalization::{
    element_id, normalize_differential, normalize_snapshot, parent_id, rebase_element, sliced_id,
};
use crate::ordering::{self, choice_matches};
use hearth_models::{
    parse_max, ElementDefinition, ElementDefinitionBase, Snapshot, StructureDefinition,
};

/// Default [`SnapshotGenerator`].
///
/// Copies the base snapshot (rebased onto the derived type), then applies
/// each differential element in order: constraints overlay the matching
/// element, slices are inserted after the element they slice together with
/// a copy of its children, and new elements go after their parent's children.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialMerger;

impl DifferentialMerger {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotGenerator for DifferentialMerger {
    fn sort_differential(
        &self,
        base: &StructureDefinition,
        derived: &mut StructureDefinition,
    ) -> Vec<String> {
        let Some(base_snapshot) = &base.snapshot else {
            return vec![format!("Base definition {} has no snapshot", base.url)];
        };
        let Some(differential) = derived.differential.as_mut() else {
            return Vec::new();
        };
        normalize_differential(differential);
        ordering::sort_differential(base_snapshot, differential)
    }

    fn generate(
        &self,
        base: &StructureDefinition,
        derived: &StructureDefinition,
    ) -> SnapshotOutcome {
        let mut messages = Vec::new();
        let Some(base_snapshot) = &base.snapshot else {
            messages.push(ValidationMessage::fatal(
                derived.url.as_str(),
                format!("Base definition {} has no snapshot", base.url),
            ));
            return SnapshotOutcome {
                snapshot: None,
                messages,
            };
        };

        let mut merge = Merge::from_base(base_snapshot, &derived.type_);

        if let Some(differential) = &derived.differential {
            let mut differential = differential.clone();
            normalize_differential(&mut differential);
            for element in &differential.element {
                merge.apply(element, &mut messages);
            }
        }

        let mut snapshot = Snapshot {
            element: merge.elements,
        };
        normalize_snapshot(&mut snapshot);

        SnapshotOutcome {
            snapshot: Some(snapshot),
            messages,
        }
    }
}

struct Merge {
    elements: Vec<ElementDefinition>,
}

impl Merge {
    fn from_base(base: &Snapshot, derived_type: &str) -> Self {
        let root = base
            .element
            .first()
            .map(|e| e.path.clone())
            .unwrap_or_default();

        let elements = base
            .element
            .iter()
            .cloned()
            .map(|mut element| {
                if element.id.is_none() {
                    element.id = Some(element.key());
                }
                if element.base.is_none() {
                    element.base = Some(ElementDefinitionBase {
                        path: element.path.clone(),
                        min: element.min.unwrap_or(0),
                        max: element.max.clone().unwrap_or_else(|| "*".to_string()),
                    });
                }
                if !derived_type.is_empty() {
                    rebase_element(&mut element, &root, derived_type);
                }
                element
            })
            .collect();

        Self { elements }
    }

    fn find(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.id.as_deref() == Some(id))
    }

    /// `Observation.valueQuantity` against `Observation.value[x]`
    fn find_choice(&self, id: &str) -> Option<usize> {
        let parent = parent_id(id)?;
        self.elements.iter().position(|e| {
            e.id.as_deref().is_some_and(|candidate| {
                parent_id(candidate) == Some(parent) && choice_matches(candidate, id)
            })
        })
    }

    /// Index just past the children of the element at `index`
    fn children_end(&self, index: usize) -> usize {
        let prefix = format!("{}.", element_id(&self.elements[index]));
        self.run_end(index, |id| id.starts_with(&prefix))
    }

    /// Index just past the children and existing slices of the element at `index`
    fn slice_group_end(&self, index: usize) -> usize {
        let id = element_id(&self.elements[index]);
        let children = format!("{}.", id);
        let slices = format!("{}:", id);
        self.run_end(index, |other| {
            other.starts_with(&children) || other.starts_with(&slices)
        })
    }

    fn run_end(&self, index: usize, in_run: impl Fn(&str) -> bool) -> usize {
        let mut end = index + 1;
        while end < self.elements.len() && in_run(&element_id(&self.elements[end])) {
            end += 1;
        }
        end
    }

    fn apply(&mut self, diff: &ElementDefinition, messages: &mut Vec<ValidationMessage>) {
        let id = element_id(diff);

        if let Some(index) = self.find(&id) {
            overlay(&mut self.elements[index], diff, false, messages);
            return;
        }

        if let Some(index) = self.find_choice(&id) {
            let target = &mut self.elements[index];
            target.path = diff.path.clone();
            target.id = Some(id);
            overlay(target, diff, false, messages);
            return;
        }

        if let Some(slice_name) = &diff.slice_name {
            match sliced_id(&id).and_then(|sliced| self.find(sliced)) {
                Some(index) => self.insert_slice(index, &id, slice_name, diff, messages),
                None => messages.push(ValidationMessage::error(
                    id.as_str(),
                    format!(
                        "The slice {} does not slice any element of the base",
                        slice_name
                    ),
                )),
            }
            return;
        }

        match parent_id(&id).and_then(|parent| self.find(parent)) {
            Some(parent) => {
                let at = self.children_end(parent);
                let mut element = diff.clone();
                element.id = Some(id);
                if element.base.is_none() {
                    element.base = Some(ElementDefinitionBase {
                        path: element.path.clone(),
                        min: element.min.unwrap_or(0),
                        max: element.max.clone().unwrap_or_else(|| "*".to_string()),
                    });
                }
                self.elements.insert(at, element);
            }
            None => messages.push(ValidationMessage::error(
                id.as_str(),
                "The element could not be placed in the snapshot of its base",
            )),
        }
    }

    fn insert_slice(
        &mut self,
        sliced: usize,
        slice_id: &str,
        slice_name: &str,
        diff: &ElementDefinition,
        messages: &mut Vec<ValidationMessage>,
    ) {
        let at = self.slice_group_end(sliced);
        let sliced_element_id = element_id(&self.elements[sliced]);

        let mut root = self.elements[sliced].clone();
        root.slicing = None;
        root.slice_name = Some(slice_name.to_string());
        root.id = Some(slice_id.to_string());
        overlay(&mut root, diff, true, messages);

        let children_end = self.children_end(sliced);
        let children: Vec<ElementDefinition> = self.elements[sliced + 1..children_end]
            .iter()
            .cloned()
            .map(|mut child| {
                let child_id = element_id(&child);
                let rest = &child_id[sliced_element_id.len()..];
                child.id = Some(format!("{}{}", slice_id, rest));
                child
            })
            .collect();

        self.elements
            .splice(at..at, std::iter::once(root).chain(children));
    }
}

fn overlay(
    target: &mut ElementDefinition,
    diff: &ElementDefinition,
    new_slice: bool,
    messages: &mut Vec<ValidationMessage>,
) {
    let before = target.clone();
    let at = element_id(target);

    if let Some(min) = diff.min {
        if let Some(base_min) = target.min {
            if min < base_min && !new_slice {
                messages.push(ValidationMessage::error(
                    at.as_str(),
                    format!("The min cardinality {} is less than the base min {}", min, base_min),
                ));
            }
        }
    }

    if let Some(max) = &diff.max {
        if let Some(base_max) = target.max.as_deref().and_then(parse_max) {
            let exceeds = match parse_max(max) {
                None => true,
                Some(m) => m > base_max,
            };
            if exceeds {
                messages.push(ValidationMessage::error(
                    at.as_str(),
                    format!("The max cardinality {} exceeds the base max {}", max, base_max),
                ));
            }
        }
    }

    if let (Some(min), Some(max)) = (
        diff.min.or(target.min),
        diff.max.as_deref().or(target.max.as_deref()).and_then(parse_max),
    ) {
        if min > max {
            messages.push(ValidationMessage::error(
                at.as_str(),
                format!("The min cardinality {} is greater than the max {}", min, max),
            ));
        }
    }

    if let (Some(base_binding), Some(binding)) = (&target.binding, &diff.binding) {
        if base_binding.strength == "required" && binding.strength != "required" {
            messages.push(ValidationMessage::error(
                at.as_str(),
                format!(
                    "The binding strength {} is weaker than the base binding strength required",
                    binding.strength
                ),
            ));
        }
    }

    if let (Some(base_types), Some(types)) = (&target.types, &diff.types) {
        for t in types {
            if !base_types.iter().any(|b| b.code == t.code || b.code == "*") {
                messages.push(ValidationMessage::error(
                    at.as_str(),
                    format!("The type {} is not one of the base types", t.code),
                ));
            }
        }
    }

    replace(&mut target.min, &diff.min);
    replace(&mut target.max, &diff.max);
    replace(&mut target.short, &diff.short);
    replace(&mut target.definition, &diff.definition);
    replace(&mut target.comment, &diff.comment);
    replace(&mut target.requirements, &diff.requirements);
    replace(&mut target.alias, &diff.alias);
    replace(&mut target.types, &diff.types);
    replace(&mut target.max_length, &diff.max_length);
    replace(&mut target.is_modifier, &diff.is_modifier);
    replace(&mut target.is_modifier_reason, &diff.is_modifier_reason);
    replace(&mut target.is_summary, &diff.is_summary);
    replace(&mut target.binding, &diff.binding);
    replace(&mut target.slicing, &diff.slicing);
    replace(&mut target.slice_is_constraining, &diff.slice_is_constraining);
    replace(&mut target.must_support, &diff.must_support);

    if let Some(conditions) = &diff.condition {
        let existing = target.condition.get_or_insert_with(Vec::new);
        for condition in conditions {
            if !existing.contains(condition) {
                existing.push(condition.clone());
            }
        }
    }

    if let Some(constraints) = &diff.constraint {
        let existing = target.constraint.get_or_insert_with(Vec::new);
        for constraint in constraints {
            match existing.iter_mut().find(|c| c.key == constraint.key) {
                Some(slot) => *slot = constraint.clone(),
                None => existing.push(constraint.clone()),
            }
        }
    }

    for (key, value) in &diff.extensions {
        target.extensions.insert(key.clone(), value.clone());
    }

    if !new_slice && *target == before && diff.path.contains('.') {
        messages.push(ValidationMessage::warning(
            at.as_str(),
            "The element does not change its base",
        ));
    }
}

fn replace<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if source.is_some() {
        target.clone_from(source);
    }
}

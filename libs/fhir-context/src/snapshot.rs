//! Lazy snapshot materialization
//!
//! Every cached StructureDefinition carries an [`Elaboration`]: a small state
//! machine (`Unelaborated -> Elaborating -> Elaborated | Failed`) behind a
//! mutex, with a condition variable for callers that arrive while another
//! thread is elaborating. The merge routine therefore runs at most once per
//! definition, and its outcome (success or failure) is kept.
//!
//! Elaborating a profile first elaborates its base through the same path,
//! so a chain of depth N costs N merges, innermost first. Base chains are
//! walked for cycles before any state changes; a cycle would otherwise park
//! a thread on its own condition variable.

use crate::cache::{CacheEntry, DefinitionCache};
use crate::error::DefinitionError;
use crate::resource::{Resource, ResourceKind};
use hearth_models::{StructureDefinition, StructureDefinitionKind};
use hearth_snapshot::{IssueSeverity, SnapshotGenerator, SnapshotOutcome, ValidationMessage};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// How generation messages are judged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializerPolicy {
    /// Error messages no longer fail a definition; Fatal ones still do
    pub ignore_profile_errors: bool,
}

impl MaterializerPolicy {
    fn fails_on(&self, severity: IssueSeverity) -> bool {
        match severity {
            IssueSeverity::Fatal => true,
            IssueSeverity::Error => !self.ignore_profile_errors,
            IssueSeverity::Warning | IssueSeverity::Information => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ElaborationState {
    Unelaborated,
    Elaborating,
    Elaborated(Arc<StructureDefinition>),
    Failed(DefinitionError),
}

#[derive(Debug)]
pub(crate) struct Elaboration {
    state: Mutex<ElaborationState>,
    ready: Condvar,
}

impl Elaboration {
    /// Definitions with a snapshot, and logical models, need no merge.
    pub(crate) fn new(sd: &Arc<StructureDefinition>) -> Self {
        let state = if sd.has_snapshot() || sd.kind == StructureDefinitionKind::Logical {
            ElaborationState::Elaborated(Arc::clone(sd))
        } else {
            ElaborationState::Unelaborated
        };
        Self {
            state: Mutex::new(state),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ElaborationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ElaborationState {
        self.lock().clone()
    }

    fn complete(&self, outcome: &Result<Arc<StructureDefinition>, DefinitionError>) {
        let mut state = self.lock();
        *state = match outcome {
            Ok(sd) => ElaborationState::Elaborated(Arc::clone(sd)),
            Err(err) => ElaborationState::Failed(err.clone()),
        };
        self.ready.notify_all();
    }
}

/// Marks an elaboration as failed if the merge routine unwinds.
struct InProgress<'e> {
    elaboration: &'e Elaboration,
    name: String,
    url: String,
    finished: bool,
}

impl InProgress<'_> {
    fn finish(
        mut self,
        outcome: Result<Arc<StructureDefinition>, DefinitionError>,
    ) -> Result<Arc<StructureDefinition>, DefinitionError> {
        self.elaboration.complete(&outcome);
        self.finished = true;
        outcome
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.elaboration.complete(&Err(DefinitionError::Merge {
                name: std::mem::take(&mut self.name),
                url: std::mem::take(&mut self.url),
                message: "snapshot generation did not complete".to_string(),
            }));
        }
    }
}

/// The raw definition and elaboration state of a StructureDefinition entry
pub(crate) fn structure_parts(
    entry: &CacheEntry,
) -> Option<(&Arc<StructureDefinition>, &Elaboration)> {
    match (&entry.resource().content, entry.elaboration()) {
        (Resource::StructureDefinition(sd), Some(elaboration)) => Some((sd, elaboration)),
        _ => None,
    }
}

pub(crate) struct Materializer<'a> {
    cache: &'a DefinitionCache,
    generator: &'a dyn SnapshotGenerator,
    policy: MaterializerPolicy,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(
        cache: &'a DefinitionCache,
        generator: &'a dyn SnapshotGenerator,
        policy: MaterializerPolicy,
    ) -> Self {
        Self {
            cache,
            generator,
            policy,
        }
    }

    /// Elaborated form of a definition, elaborating it on first use.
    pub(crate) fn materialize(
        &self,
        raw: &Arc<StructureDefinition>,
        elaboration: &Elaboration,
    ) -> Result<Arc<StructureDefinition>, DefinitionError> {
        let mut state = elaboration.lock();
        loop {
            match &*state {
                ElaborationState::Elaborated(sd) => return Ok(Arc::clone(sd)),
                ElaborationState::Failed(err) => return Err(err.clone()),
                ElaborationState::Unelaborated => break,
                ElaborationState::Elaborating => {}
            }
            state = elaboration
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if let Some(chain) = self.base_cycle(raw) {
            let err = DefinitionError::CircularBase {
                name: raw.name.clone(),
                url: raw.url.clone(),
                chain,
            };
            *state = ElaborationState::Failed(err.clone());
            elaboration.ready.notify_all();
            return Err(err);
        }

        *state = ElaborationState::Elaborating;
        drop(state);

        let in_progress = InProgress {
            elaboration,
            name: raw.name.clone(),
            url: raw.url.clone(),
            finished: false,
        };
        let outcome = self.elaborate(raw);
        in_progress.finish(outcome)
    }

    /// The base URLs from `raw` up to the first repeated one, if the chain loops
    fn base_cycle(&self, raw: &StructureDefinition) -> Option<Vec<String>> {
        let mut chain = vec![raw.url.clone()];
        let mut current = raw;

        loop {
            if current.has_snapshot() || current.kind == StructureDefinitionKind::Logical {
                return None;
            }
            let base_url = current.base_definition.as_deref()?;
            let seen = chain.iter().any(|url| url == base_url);
            chain.push(base_url.to_string());
            if seen {
                return Some(chain);
            }
            let entry = self.cache.get(ResourceKind::StructureDefinition, base_url)?;
            let (base, _) = structure_parts(entry)?;
            current = base.as_ref();
        }
    }

    fn elaborate(
        &self,
        raw: &StructureDefinition,
    ) -> Result<Arc<StructureDefinition>, DefinitionError> {
        let name = raw.name.clone();
        let url = raw.url.clone();

        let Some(base_url) = raw.base_definition.clone() else {
            return Err(DefinitionError::NoBase { name, url });
        };

        let Some((base_raw, base_elaboration)) = self
            .cache
            .get(ResourceKind::StructureDefinition, &base_url)
            .and_then(|entry| structure_parts(entry))
        else {
            return Err(DefinitionError::BaseUnresolved {
                name,
                url,
                base: base_url,
            });
        };

        let base = self
            .materialize(base_raw, base_elaboration)
            .map_err(|cause| DefinitionError::BaseFailed {
                name: name.clone(),
                url: url.clone(),
                base: base_url.clone(),
                cause: Box::new(cause),
            })?;

        let mut derived = raw.clone();
        let problems = self.generator.sort_differential(&base, &mut derived);
        let mut messages: Vec<ValidationMessage> = problems
            .iter()
            .map(|problem| {
                ValidationMessage::error(
                    url.as_str(),
                    format!("Error sorting Differential: {}", problem),
                )
            })
            .collect();

        let outcome = self.generator.generate(&base, &derived);
        messages.extend(outcome.messages);
        let combined = SnapshotOutcome {
            snapshot: outcome.snapshot,
            messages,
        };

        for message in &combined.messages {
            match message.severity {
                IssueSeverity::Information | IssueSeverity::Warning => {
                    debug!(profile = %url, path = %message.path, "{}", message.text)
                }
                IssueSeverity::Error | IssueSeverity::Fatal => {
                    warn!(profile = %url, path = %message.path, "{}", message.text)
                }
            }
        }

        if let Some(worst) = combined
            .worst_message()
            .filter(|message| self.policy.fails_on(message.severity))
        {
            // Sorting problems lead the combined list, one message each.
            let index = combined
                .messages
                .iter()
                .position(|message| std::ptr::eq(message, worst));
            return Err(match index.and_then(|i| problems.get(i)) {
                Some(problem) => DefinitionError::DifferentialSort {
                    name,
                    url,
                    message: problem.clone(),
                },
                None => DefinitionError::Merge {
                    name,
                    url,
                    message: worst.to_string(),
                },
            });
        }

        let Some(snapshot) = combined.snapshot else {
            return Err(DefinitionError::EmptySnapshot { name, url });
        };

        debug!(
            profile = %url,
            base = %base_url,
            elements = snapshot.element.len(),
            "Generated snapshot"
        );
        derived.snapshot = Some(snapshot);
        Ok(Arc::new(derived))
    }
}

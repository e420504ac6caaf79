//! The ordered step history of one attempt.
//!
//! Committed steps are append-only. At most one trailing autosaved step may
//! exist on top of them; it is held separately so the "only one, always
//! last" rule holds by construction.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::error::{AttemptError, Result};
use crate::step::{Step, StoredFile, VarMap};

/// Committed steps plus an optional trailing autosave.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSequence {
    committed: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    autosaved: Option<Step>,
}

impl StepSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps, the trailing autosave included.
    pub fn len(&self) -> usize {
        self.committed.len() + usize::from(self.autosaved.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of committed steps. Callers echo this back with each request
    /// so stale resubmissions can be detected.
    pub fn sequence_check_count(&self) -> usize {
        self.committed.len()
    }

    pub fn has_autosave(&self) -> bool {
        self.autosaved.is_some()
    }

    pub fn autosaved(&self) -> Option<&Step> {
        self.autosaved.as_ref()
    }

    /// Step `index`, counting from 0.
    pub fn get(&self, index: usize) -> Result<&Step> {
        let committed = self.committed.len();
        if index < committed {
            return Ok(&self.committed[index]);
        }
        match &self.autosaved {
            Some(step) if index == committed => Ok(step),
            _ => Err(AttemptError::StepOutOfRange {
                index,
                len: self.len(),
            }),
        }
    }

    /// The latest step, autosave included.
    pub fn last(&self) -> Option<&Step> {
        self.autosaved.as_ref().or_else(|| self.committed.last())
    }

    /// The latest committed step.
    pub fn last_committed(&self) -> Option<&Step> {
        self.committed.last()
    }

    /// Append a committed step, discarding any pending autosave first.
    ///
    /// Returns the discarded autosave so the caller can report its deletion.
    pub fn append(&mut self, step: Step) -> Option<Step> {
        let discarded = self.autosaved.take();
        self.committed.push(step);
        discarded
    }

    /// Set the trailing autosave. A previous autosave is replaced and returned.
    pub fn append_autosaved(&mut self, step: Step) -> Option<Step> {
        debug_assert!(!self.committed.is_empty(), "step 0 is never autosaved");
        self.autosaved.replace(step)
    }

    /// Remove the pending autosave, if any.
    pub fn discard_autosave(&mut self) -> Option<Step> {
        self.autosaved.take()
    }

    /// Turn the pending autosave into a committed step in place.
    ///
    /// Returns the index it now occupies, or `None` if nothing was pending.
    pub fn promote_autosave(&mut self) -> Option<usize> {
        let step = self.autosaved.take()?;
        self.committed.push(step);
        Some(self.committed.len() - 1)
    }

    pub(crate) fn first_mut(&mut self) -> Option<&mut Step> {
        self.committed.first_mut()
    }

    /// A copy holding only steps `0..=lastseq`.
    pub fn prefix(&self, lastseq: usize) -> Result<StepSequence> {
        if lastseq >= self.len() {
            return Err(AttemptError::LastSeqOutOfRange {
                lastseq,
                len: self.len(),
            });
        }
        let committed = self.committed.len();
        if lastseq < committed {
            Ok(StepSequence {
                committed: self.committed[..=lastseq].to_vec(),
                autosaved: None,
            })
        } else {
            Ok(self.clone())
        }
    }

    /// Forward traversal yielding `(index, step)`.
    pub fn iter(&self) -> StepIter<'_> {
        StepIter {
            seq: self,
            front: 0,
            back: self.len(),
        }
    }

    /// Backward traversal, from the latest step to step 0.
    pub fn reverse_iter(&self) -> std::iter::Rev<StepIter<'_>> {
        self.iter().rev()
    }

    // Reverse scans used by the attempt's "latest value" queries.

    pub fn last_step_with_qt_var(&self, name: &str) -> Option<&Step> {
        self.reverse_iter()
            .map(|(_, step)| step)
            .find(|step| step.has_qt_var(name))
    }

    pub fn last_step_with_behaviour_var(&self, name: &str) -> Option<&Step> {
        self.reverse_iter()
            .map(|(_, step)| step)
            .find(|step| step.has_behaviour_var(name))
    }

    pub fn last_qt_var(&self, name: &str) -> Option<&str> {
        self.last_step_with_qt_var(name)
            .and_then(|step| step.qt_var(name))
    }

    pub fn last_behaviour_var(&self, name: &str) -> Option<&str> {
        self.last_step_with_behaviour_var(name)
            .and_then(|step| step.behaviour_var(name))
    }

    /// Response data of the latest step that has any, or an empty map.
    pub fn last_qt_data(&self) -> VarMap {
        self.reverse_iter()
            .map(|(_, step)| step.qt_data())
            .find(|data| !data.is_empty())
            .unwrap_or_default()
    }

    /// Files of the latest step that set `name`.
    pub fn last_qt_files(&self, name: &str) -> &[StoredFile] {
        self.last_step_with_qt_var(name)
            .map(|step| step.qt_files(name))
            .unwrap_or(&[])
    }
}

/// Double-ended traversal over a [`StepSequence`].
///
/// Cheap to clone, so a traversal can be restarted from a saved copy.
#[derive(Debug, Clone)]
pub struct StepIter<'a> {
    seq: &'a StepSequence,
    front: usize,
    back: usize,
}

impl<'a> Iterator for StepIter<'a> {
    type Item = (usize, &'a Step);

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let index = self.front;
        self.front += 1;
        self.seq.get(index).ok().map(|step| (index, step))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<'a> DoubleEndedIterator for StepIter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        let index = self.back;
        self.seq.get(index).ok().map(|step| (index, step))
    }
}

impl ExactSizeIterator for StepIter<'_> {}

impl FusedIterator for StepIter<'_> {}

/// The steps in which a response was submitted, numbered from 1 by try.
///
/// If response data was saved after the last submitted response (and the
/// attempt ended without submitting it), that last saved step is included
/// as a final try.
#[derive(Debug, Clone)]
pub struct StepsWithSubmittedResponse<'a> {
    seq: &'a StepSequence,
    step_nos: Vec<usize>,
}

impl<'a> StepsWithSubmittedResponse<'a> {
    /// Select steps using `has_submitted_response`, normally the behaviour's
    /// `step_has_a_submitted_response`.
    pub fn find(seq: &'a StepSequence, has_submitted_response: impl Fn(&Step) -> bool) -> Self {
        let mut step_nos = Vec::new();
        let mut last_saved = None;
        for (step_no, step) in seq.iter() {
            if has_submitted_response(step) {
                step_nos.push(step_no);
                last_saved = None;
            } else if !step.qt_data().is_empty() {
                last_saved = Some(step_no);
            }
        }
        step_nos.extend(last_saved);
        Self { seq, step_nos }
    }

    /// Number of tries found.
    pub fn len(&self) -> usize {
        self.step_nos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.step_nos.is_empty()
    }

    /// Step number for try `try_no`, or `None` past the last try.
    pub fn step_no_for_try(&self, try_no: usize) -> Result<Option<usize>> {
        if try_no == 0 {
            return Err(AttemptError::TryNumberNotFound(try_no));
        }
        Ok(self.step_nos.get(try_no - 1).copied())
    }

    /// The step for try `try_no`, or `None` if there is no such try.
    pub fn get(&self, try_no: usize) -> Option<&'a Step> {
        let step_no = self.step_no_for_try(try_no).ok().flatten()?;
        self.seq.get(step_no).ok()
    }

    /// `(try_no, step)` pairs, `try_no` counting from 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Step)> + '_ {
        self.step_nos
            .iter()
            .enumerate()
            .filter_map(|(i, &step_no)| self.seq.get(step_no).ok().map(|s| (i + 1, s)))
    }
}

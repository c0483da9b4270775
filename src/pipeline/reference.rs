// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipecraft contributors

//! Cross-job references
//!
//! `needs` and `dependencies` point at other nodes of the tree. Their
//! rendered names are only known once the whole pipeline has been
//! rendered, so references are kept as handles until then and resolved
//! against the final job documents.

use std::collections::HashMap;
use std::fmt;

use super::document::JobDocument;
use super::job::Job;
use super::sequence::Sequence;
use super::values::Need;
use crate::errors::{PipecraftError, PipecraftResult};

/// A job, a sequence, or an already named need
#[derive(Clone)]
pub enum JobReference {
    Job(Job),
    Sequence(Sequence),
    Need(Need),
}

// Jobs may need each other, so only describe the target.
impl fmt::Debug for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job(job) => f.debug_tuple("Job").field(&job.describe()).finish(),
            Self::Sequence(sequence) => f.debug_tuple("Sequence").field(&sequence.describe()).finish(),
            Self::Need(need) => f.debug_tuple("Need").field(need).finish(),
        }
    }
}

impl PartialEq for JobReference {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Job(a), Self::Job(b)) => a.same_as(b),
            (Self::Sequence(a), Self::Sequence(b)) => a.same_as(b),
            (Self::Need(a), Self::Need(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Job> for JobReference {
    fn from(job: Job) -> Self {
        Self::Job(job)
    }
}

impl From<&Job> for JobReference {
    fn from(job: &Job) -> Self {
        Self::Job(job.clone())
    }
}

impl From<Sequence> for JobReference {
    fn from(sequence: Sequence) -> Self {
        Self::Sequence(sequence)
    }
}

impl From<&Sequence> for JobReference {
    fn from(sequence: &Sequence) -> Self {
        Self::Sequence(sequence.clone())
    }
}

impl From<Need> for JobReference {
    fn from(need: Need) -> Self {
        Self::Need(need)
    }
}

impl From<&str> for JobReference {
    fn from(job: &str) -> Self {
        Self::Need(Need::job(job))
    }
}

/// Push references, skipping ones already present
pub(crate) fn extend_unique(target: &mut Vec<JobReference>, references: &[JobReference]) {
    for reference in references {
        if !target.contains(reference) {
            target.push(reference.clone());
        }
    }
}

/// Maps job handles to the documents they rendered into.
///
/// `handles` and `docs` must come from the same tree, in render order.
struct Lookup<'a> {
    handles: &'a [Job],
    docs: &'a [JobDocument],
    stage_positions: HashMap<&'a str, usize>,
}

impl<'a> Lookup<'a> {
    fn new(handles: &'a [Job], docs: &'a [JobDocument]) -> Self {
        let mut stage_positions = HashMap::new();
        for doc in docs {
            let next = stage_positions.len();
            stage_positions.entry(doc.stage.as_str()).or_insert(next);
        }
        Self {
            handles,
            docs,
            stage_positions,
        }
    }

    fn doc_of(&self, job: &Job, referrer: &JobDocument) -> PipecraftResult<&'a JobDocument> {
        self.handles
            .iter()
            .position(|handle| handle.same_as(job))
            .map(|index| &self.docs[index])
            .ok_or_else(|| PipecraftError::UnresolvedReference {
                referrer: referrer.name.clone(),
                target: job.describe(),
            })
    }

    fn docs_of(
        &self,
        sequence: &Sequence,
        referrer: &JobDocument,
    ) -> PipecraftResult<Vec<&'a JobDocument>> {
        let jobs = sequence.nested_jobs();
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        // an unattached sequence's jobs are not in the tree either
        jobs.iter()
            .map(|job| {
                self.doc_of(job, referrer).map_err(|_| PipecraftError::UnresolvedReference {
                    referrer: referrer.name.clone(),
                    target: sequence.describe(),
                })
            })
            .collect()
    }

    /// Jobs of `sequence` in its last stage, i.e. the ones that finish it
    fn last_jobs_of(
        &self,
        sequence: &Sequence,
        referrer: &JobDocument,
    ) -> PipecraftResult<Vec<&'a JobDocument>> {
        let docs = self.docs_of(sequence, referrer)?;
        let position = |doc: &JobDocument| self.stage_positions.get(doc.stage.as_str()).copied();
        let last = docs.iter().filter_map(|doc| position(*doc)).max();
        Ok(docs
            .into_iter()
            .filter(|doc| position(*doc) == last)
            .collect())
    }

    fn needs(&self, references: &[JobReference], referrer: &JobDocument) -> PipecraftResult<Vec<Need>> {
        let mut needs = Vec::new();
        for reference in references {
            match reference {
                JobReference::Job(job) => needs.push(Need::job(&self.doc_of(job, referrer)?.name)),
                JobReference::Sequence(sequence) => needs.extend(
                    self.last_jobs_of(sequence, referrer)?
                        .into_iter()
                        .map(|doc| Need::job(&doc.name)),
                ),
                JobReference::Need(need) => needs.push(need.clone()),
            }
        }
        needs.sort();
        needs.dedup();
        Ok(needs)
    }

    fn dependencies(
        &self,
        references: &[JobReference],
        referrer: &JobDocument,
    ) -> PipecraftResult<Vec<String>> {
        let mut names = Vec::new();
        for reference in references {
            match reference {
                JobReference::Job(job) => names.push(self.doc_of(job, referrer)?.name.clone()),
                JobReference::Sequence(sequence) => names.extend(
                    self.docs_of(sequence, referrer)?
                        .into_iter()
                        .map(|doc| doc.name.clone()),
                ),
                JobReference::Need(need) => names.push(need.job.clone()),
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Turn the `needs` and `dependencies` references of every document into
/// rendered names.
///
/// `handles` are the jobs the documents were rendered from, in the same
/// order. A reference to a node outside this tree fails with
/// `UnresolvedReference`.
pub(crate) fn resolve_references(docs: &mut [JobDocument], handles: &[Job]) -> PipecraftResult<()> {
    let mut resolved = Vec::with_capacity(docs.len());
    {
        let lookup = Lookup::new(handles, docs);
        for doc in docs.iter() {
            let needs = doc
                .need_refs
                .as_deref()
                .map(|refs| lookup.needs(refs, doc))
                .transpose()?;
            let dependencies = doc
                .dependency_refs
                .as_deref()
                .map(|refs| lookup.dependencies(refs, doc))
                .transpose()?;
            resolved.push((needs, dependencies));
        }
    }

    for (doc, (needs, dependencies)) in docs.iter_mut().zip(resolved) {
        doc.needs = needs;
        doc.dependencies = dependencies;
    }
    Ok(())
}

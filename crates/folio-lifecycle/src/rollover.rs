//! Cycle rollover planning
//!
//! Pure planning over the subject's history: which instances to archive,
//! which templates the new instances use, and the sanitized seed data.
//! Persisting the plan is up to the caller.

use std::collections::BTreeSet;

use folio_model::{Instance, InstanceData, InstanceId, Template};

use crate::error::LifecycleError;
use crate::infer::{infer_long_term_keys, KeyInference};
use crate::policy::InferencePolicy;
use crate::sanitize::{sanitize_seed, SeedData};
use crate::seeding::{choose_templates, SeedTarget, TemplateChoice};

/// Everything needed to open a new cycle for a subject
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverPlan {
    pub target: SeedTarget,
    pub choice: TemplateChoice,
    /// Live instances of earlier cycles to archive
    pub archive: Vec<InstanceId>,
    pub inference: KeyInference,
    pub seed: SeedData,
}

/// Rollover planner
#[derive(Debug, Clone, Default)]
pub struct RolloverPlanner {
    policy: InferencePolicy,
}

impl RolloverPlanner {
    /// Create planner with a policy
    #[inline]
    #[must_use]
    pub fn new(policy: InferencePolicy) -> Self {
        Self { policy }
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &InferencePolicy {
        &self.policy
    }

    /// Plan a rollover
    ///
    /// `history` holds the subject's instances (any order), `candidates`
    /// the instances considered for sibling seeding.
    ///
    /// # Errors
    /// Returns error if key inference fails
    pub fn plan(
        &self,
        target: SeedTarget,
        history: &[Instance],
        candidates: &[Instance],
        templates: &[Template],
        allowlist: &BTreeSet<String>,
    ) -> Result<RolloverPlan, LifecycleError> {
        let mut previous: Vec<&Instance> = history
            .iter()
            .filter(|i| i.subject_id == target.subject && i.cycle != target.cycle)
            .collect();
        previous.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let archive = previous
            .iter()
            .filter(|i| i.is_live())
            .map(|i| i.id)
            .collect();

        let recent: Vec<&InstanceData> = previous.iter().map(|i| &i.data).collect();
        let inference = infer_long_term_keys(recent.iter().copied(), allowlist, &self.policy)?;
        let seed = sanitize_seed(
            recent.iter().copied().take(self.policy.sample_size),
            &inference.long_term,
            &self.policy.blacklist,
        );
        let choice = choose_templates(&target, candidates, templates);

        tracing::info!(
            subject = %target.subject,
            cycle = %target.cycle,
            templates = choice.templates().len(),
            archive = previous.iter().filter(|i| i.is_live()).count(),
            carried = seed.data.len(),
            "planned cycle rollover"
        );

        Ok(RolloverPlan {
            target,
            choice,
            archive,
            inference,
            seed,
        })
    }
}

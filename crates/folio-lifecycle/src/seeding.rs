//! Template choice for a new cycle
//!
//! A live sibling instance (another subject, same level and cycle) whose
//! template still exists and is not archived supplies the choice; otherwise
//! every non-archived template flagged default for the level is used.

use std::collections::HashMap;

use folio_model::{CycleId, Instance, SubjectId, Template, TemplateId};

/// Where the template assignment came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateChoice {
    /// Copied from sibling instances at the same level and cycle
    Sibling(Vec<TemplateId>),
    /// Templates flagged default for the level
    Defaults(Vec<TemplateId>),
    /// Nothing usable
    Unresolved,
}

impl TemplateChoice {
    /// Chosen templates (empty when unresolved)
    #[must_use]
    pub fn templates(&self) -> &[TemplateId] {
        match self {
            Self::Sibling(ids) | Self::Defaults(ids) => ids,
            Self::Unresolved => &[],
        }
    }
}

/// Subject, level and cycle being seeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTarget {
    pub subject: SubjectId,
    pub level: String,
    pub cycle: CycleId,
}

impl SeedTarget {
    /// Create target
    #[must_use]
    pub fn new(subject: SubjectId, level: impl Into<String>, cycle: CycleId) -> Self {
        Self {
            subject,
            level: level.into(),
            cycle,
        }
    }
}

/// Pick templates for a new instance
#[must_use]
pub fn choose_templates(
    target: &SeedTarget,
    candidates: &[Instance],
    templates: &[Template],
) -> TemplateChoice {
    let usable: HashMap<TemplateId, &Template> = templates
        .iter()
        .filter(|t| !t.archived)
        .map(|t| (t.id, t))
        .collect();

    let mut siblings: Vec<&Instance> = candidates
        .iter()
        .filter(|i| {
            i.is_live()
                && i.subject_id != target.subject
                && i.cycle == target.cycle
                && i.level.as_deref() == Some(target.level.as_str())
                && usable.contains_key(&i.template_id)
        })
        .collect();
    siblings.sort_by_key(|i| (i.created_at, i.id));

    let mut chosen: Vec<TemplateId> = Vec::new();
    for sibling in siblings {
        if !chosen.contains(&sibling.template_id) {
            chosen.push(sibling.template_id);
        }
    }
    if !chosen.is_empty() {
        return TemplateChoice::Sibling(chosen);
    }

    let mut defaults: Vec<&Template> = templates
        .iter()
        .filter(|t| !t.archived && t.default_for_levels.contains(&target.level))
        .collect();
    defaults.sort_by_key(|t| (t.created_at, t.id));
    if defaults.is_empty() {
        tracing::warn!(level = %target.level, subject = %target.subject, "no template choice for level");
        TemplateChoice::Unresolved
    } else {
        TemplateChoice::Defaults(defaults.into_iter().map(|t| t.id).collect())
    }
}

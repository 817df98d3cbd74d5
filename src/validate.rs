//! Structural checks over a complete catalog snapshot.
//!
//! The validator never stops at the first problem and never repairs
//! anything; it hands back every issue so the caller can report them at once.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::model::{Catalog, EntityKind, software_key};

/// Classification of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DanglingReference,
    DuplicateId,
    AsymmetricRelation,
    DuplicateSoftwareName,
    InvalidDate,
    InvalidNumericField,
    EmptyId,
    DuplicateEmail,
    DuplicateModuleCode,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueKind::DanglingReference => "dangling reference",
            IssueKind::DuplicateId => "duplicate id",
            IssueKind::AsymmetricRelation => "asymmetric relation",
            IssueKind::DuplicateSoftwareName => "duplicate software name",
            IssueKind::InvalidDate => "invalid date",
            IssueKind::InvalidNumericField => "invalid numeric field",
            IssueKind::EmptyId => "empty id",
            IssueKind::DuplicateEmail => "duplicate email",
            IssueKind::DuplicateModuleCode => "duplicate module code",
        };
        f.write_str(label)
    }
}

/// Points at the record an issue is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// A single invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub entity: EntityRef,
    pub kind: IssueKind,
    pub description: String,
}

impl ValidationIssue {
    pub fn new(entity: EntityRef, kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            entity,
            kind,
            description: description.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.kind, self.entity.kind, self.entity.id, self.description
        )
    }
}

/// Returns every invariant violation found in `catalog`; an empty vector
/// means the catalog is consistent.
pub fn validate(catalog: &Catalog) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    check_ids(
        EntityKind::Instructor,
        catalog.list_instructors().map(|instructor| instructor.id.as_str()),
        &mut issues,
    );
    check_ids(
        EntityKind::Module,
        catalog.list_modules().map(|module| module.id.as_str()),
        &mut issues,
    );

    check_unique_values(
        EntityKind::Instructor,
        IssueKind::DuplicateEmail,
        "email",
        catalog
            .list_instructors()
            .map(|instructor| (instructor.id.as_str(), instructor.email.as_str())),
        &mut issues,
    );
    check_unique_values(
        EntityKind::Module,
        IssueKind::DuplicateModuleCode,
        "code",
        catalog
            .list_modules()
            .map(|module| (module.id.as_str(), module.code.as_str())),
        &mut issues,
    );

    let instructor_modules: HashMap<&str, &BTreeSet<String>> = catalog
        .list_instructors()
        .map(|instructor| (instructor.id.as_str(), &instructor.modules))
        .collect();
    let module_owners: HashMap<&str, Option<&str>> = catalog
        .list_modules()
        .map(|module| (module.id.as_str(), module.instructor.as_deref()))
        .collect();

    for module in catalog.list_modules() {
        let entity = EntityRef::new(EntityKind::Module, &module.id);

        if let Some(owner) = module.instructor.as_deref() {
            match instructor_modules.get(owner) {
                None => issues.push(ValidationIssue::new(
                    entity.clone(),
                    IssueKind::DanglingReference,
                    format!("instructor '{owner}' does not exist"),
                )),
                Some(listed) if !listed.contains(&module.id) => issues.push(ValidationIssue::new(
                    entity.clone(),
                    IssueKind::AsymmetricRelation,
                    format!("instructor '{owner}' does not list this module"),
                )),
                Some(_) => {}
            }
        }

        if module.year == 0 {
            issues.push(ValidationIssue::new(
                entity.clone(),
                IssueKind::InvalidNumericField,
                "year must be a positive integer",
            ));
        }
        if module.semester == 0 {
            issues.push(ValidationIssue::new(
                entity.clone(),
                IssueKind::InvalidNumericField,
                "semester must be a positive integer",
            ));
        }

        let mut seen = HashSet::new();
        for software in &module.software {
            if !seen.insert(software.name.as_str()) {
                issues.push(ValidationIssue::new(
                    EntityRef::new(EntityKind::Software, software_key(&module.id, &software.name)),
                    IssueKind::DuplicateSoftwareName,
                    format!("software '{}' appears more than once", software.name),
                ));
            }
        }
    }

    for instructor in catalog.list_instructors() {
        for module_id in &instructor.modules {
            let entity = EntityRef::new(EntityKind::Instructor, &instructor.id);
            match module_owners.get(module_id.as_str()) {
                None => issues.push(ValidationIssue::new(
                    entity,
                    IssueKind::DanglingReference,
                    format!("module '{module_id}' does not exist"),
                )),
                Some(owner) if *owner != Some(instructor.id.as_str()) => {
                    let declared = owner.unwrap_or("nobody");
                    issues.push(ValidationIssue::new(
                        entity,
                        IssueKind::AsymmetricRelation,
                        format!("module '{module_id}' is assigned to {declared}"),
                    ))
                }
                Some(_) => {}
            }
        }
    }

    issues
}

fn check_ids<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            issues.push(ValidationIssue::new(
                EntityRef::new(kind, id),
                IssueKind::EmptyId,
                format!("{kind} id must not be empty"),
            ));
            continue;
        }
        if !seen.insert(id) {
            issues.push(ValidationIssue::new(
                EntityRef::new(kind, id),
                IssueKind::DuplicateId,
                format!("{kind} id '{id}' is used more than once"),
            ));
        }
    }
}

/// Reports every record after the first that reuses a non-blank `field`
/// value of another record of the same kind.
fn check_unique_values<'a>(
    kind: EntityKind,
    issue_kind: IssueKind,
    field: &str,
    values: impl Iterator<Item = (&'a str, &'a str)>,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for (id, value) in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match owners.get(value) {
            Some(first) => issues.push(ValidationIssue::new(
                EntityRef::new(kind, id),
                issue_kind,
                format!("{field} '{value}' is already used by {kind} '{first}'"),
            )),
            None => {
                owners.insert(value, id);
            }
        }
    }
}

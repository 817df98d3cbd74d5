use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{CatalogError, Result};

/// Identifier of an instructor or module. Kept as a plain string so it reads
/// the same in YAML, in the workbook, and on the command line.
pub type EntityId = String;

/// The three kinds of records held by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Instructor,
    Module,
    Software,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Instructor => write!(f, "instructor"),
            EntityKind::Module => write!(f, "module"),
            EntityKind::Software => write!(f, "software"),
        }
    }
}

/// Builds the identifier used when reporting on a software entry, which is
/// only unique within its module.
pub fn software_key(module_id: &str, name: &str) -> String {
    format!("{module_id}/{name}")
}

/// A member of staff responsible for one or more modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Instructor {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub department: String,
    /// Derived view of the modules whose `instructor` points here.
    pub modules: BTreeSet<EntityId>,
    pub last_review: Option<NaiveDate>,
}

impl Instructor {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// A taught module and the software it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub id: EntityId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub year: u8,
    pub semester: u8,
    /// Authoritative side of the instructor relation.
    pub instructor: Option<EntityId>,
    pub software: Vec<Software>,
}

impl Module {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            code: String::new(),
            name: String::new(),
            description: String::new(),
            year: 1,
            semester: 1,
            instructor: None,
            software: Vec::new(),
        }
    }

    pub fn with_instructor(mut self, instructor: impl Into<EntityId>) -> Self {
        self.instructor = Some(instructor.into());
        self
    }

    /// Looks up a software entry by its exact name.
    pub fn software(&self, name: &str) -> Option<&Software> {
        self.software.iter().find(|software| software.name == name)
    }

    pub fn critical_count(&self) -> usize {
        self.software.iter().filter(|software| software.critical).count()
    }
}

/// A software requirement scoped to a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Software {
    pub name: String,
    pub version: String,
    pub purpose: String,
    pub critical: bool,
    pub notes: String,
    pub last_verified: Option<NaiveDate>,
    /// Instructor id or free-text name of whoever verified the entry.
    pub verified_by: String,
}

impl Software {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// In-memory graph of instructors, modules, and software.
///
/// Both collections keep insertion order. Duplicate ids are representable so
/// that a catalog assembled from external records can be handed to the
/// validator as-is; the mutation API itself never introduces them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    instructors: Vec<Instructor>,
    modules: Vec<Module>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a catalog from raw collections without touching the
    /// instructor relation. Call [`Catalog::derive_instructor_modules`] to
    /// bring the derived view in line with the modules.
    pub fn from_parts(instructors: Vec<Instructor>, modules: Vec<Module>) -> Self {
        Self {
            instructors,
            modules,
        }
    }

    pub fn get_instructor(&self, id: &str) -> Result<&Instructor> {
        self.instructors
            .iter()
            .find(|instructor| instructor.id == id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Instructor, id))
    }

    pub fn get_module(&self, id: &str) -> Result<&Module> {
        self.modules
            .iter()
            .find(|module| module.id == id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Module, id))
    }

    pub fn get_software(&self, module_id: &str, name: &str) -> Result<&Software> {
        self.get_module(module_id)?
            .software(name)
            .ok_or_else(|| software_not_found(module_id, name))
    }

    /// Instructors in insertion order. Each call starts a fresh iterator.
    pub fn list_instructors(&self) -> std::slice::Iter<'_, Instructor> {
        self.instructors.iter()
    }

    /// Modules in insertion order. Each call starts a fresh iterator.
    pub fn list_modules(&self) -> std::slice::Iter<'_, Module> {
        self.modules.iter()
    }

    pub fn instructor_count(&self) -> usize {
        self.instructors.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn software_count(&self) -> usize {
        self.modules.iter().map(|module| module.software.len()).sum()
    }

    /// Full module records taught by an instructor, in catalog order.
    pub fn instructor_modules(&self, id: &str) -> Result<Vec<&Module>> {
        let instructor = self.get_instructor(id)?;
        Ok(self
            .modules
            .iter()
            .filter(|module| instructor.modules.contains(&module.id))
            .collect())
    }

    /// Inserts or replaces an instructor by id.
    ///
    /// The record's `modules` field is not trusted: it is recomputed from the
    /// modules that name this instructor.
    pub fn upsert_instructor(&mut self, mut record: Instructor) {
        record.modules = owned_modules(&self.modules, &record.id);
        match self.instructors.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => self.instructors.push(record),
        }
    }

    /// Inserts or replaces a module by id. The instructor reference is not
    /// checked; a module may name an instructor that is added later.
    pub fn upsert_module(&mut self, record: Module) {
        for instructor in &mut self.instructors {
            instructor.modules.remove(&record.id);
            if record.instructor.as_deref() == Some(instructor.id.as_str()) {
                instructor.modules.insert(record.id.clone());
            }
        }
        match self.modules.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => self.modules.push(record),
        }
    }

    /// Removes an instructor. Fails with `Conflict` while modules still name
    /// them, unless `cascade` is set, in which case those modules lose their
    /// instructor.
    pub fn remove_instructor(&mut self, id: &str, cascade: bool) -> Result<Instructor> {
        let index = self
            .instructors
            .iter()
            .position(|instructor| instructor.id == id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Instructor, id))?;

        let dependents: Vec<&str> = self
            .modules
            .iter()
            .filter(|module| module.instructor.as_deref() == Some(id))
            .map(|module| module.id.as_str())
            .collect();

        if !dependents.is_empty() {
            if !cascade {
                return Err(CatalogError::Conflict(format!(
                    "instructor {id} still teaches: {}",
                    dependents.join(", ")
                )));
            }
            for module in &mut self.modules {
                if module.instructor.as_deref() == Some(id) {
                    module.instructor = None;
                }
            }
        }

        Ok(self.instructors.remove(index))
    }

    /// Removes a module. Fails with `Conflict` while an instructor lists it,
    /// unless `cascade` is set, in which case it is dropped from their lists.
    pub fn remove_module(&mut self, id: &str, cascade: bool) -> Result<Module> {
        let index = self
            .modules
            .iter()
            .position(|module| module.id == id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Module, id))?;

        let dependents: Vec<&str> = self
            .instructors
            .iter()
            .filter(|instructor| instructor.modules.contains(id))
            .map(|instructor| instructor.id.as_str())
            .collect();

        if !dependents.is_empty() {
            if !cascade {
                return Err(CatalogError::Conflict(format!(
                    "module {id} is listed by instructor(s): {}",
                    dependents.join(", ")
                )));
            }
            for instructor in &mut self.instructors {
                instructor.modules.remove(id);
            }
        }

        Ok(self.modules.remove(index))
    }

    /// Appends a software entry to a module. Names are unique per module and
    /// `last_verified` is kept as given.
    pub fn add_software(&mut self, module_id: &str, software: Software) -> Result<()> {
        let module = self.module_mut(module_id)?;
        if module.software(&software.name).is_some() {
            return Err(CatalogError::Conflict(format!(
                "module {module_id} already lists software {}",
                software.name
            )));
        }
        module.software.push(software);
        Ok(())
    }

    /// Replaces the software entry called `name`, keeping its position.
    pub fn update_software(
        &mut self,
        module_id: &str,
        name: &str,
        software: Software,
    ) -> Result<()> {
        let module = self.module_mut(module_id)?;
        let index = module
            .software
            .iter()
            .position(|existing| existing.name == name)
            .ok_or_else(|| software_not_found(module_id, name))?;

        if software.name != name && module.software(&software.name).is_some() {
            return Err(CatalogError::Conflict(format!(
                "module {module_id} already lists software {}",
                software.name
            )));
        }
        module.software[index] = software;
        Ok(())
    }

    pub fn remove_software(&mut self, module_id: &str, name: &str) -> Result<Software> {
        let module = self.module_mut(module_id)?;
        let index = module
            .software
            .iter()
            .position(|existing| existing.name == name)
            .ok_or_else(|| software_not_found(module_id, name))?;
        Ok(module.software.remove(index))
    }

    /// Recomputes every `Instructor::modules` set from `Module::instructor`,
    /// which is the authoritative side of the relation. Returns the ids of
    /// instructors whose set changed.
    pub fn derive_instructor_modules(&mut self) -> Vec<EntityId> {
        let mut changed = Vec::new();
        for instructor in &mut self.instructors {
            let derived = owned_modules(&self.modules, &instructor.id);
            if derived != instructor.modules {
                instructor.modules = derived;
                changed.push(instructor.id.clone());
            }
        }
        changed
    }

    fn module_mut(&mut self, id: &str) -> Result<&mut Module> {
        self.modules
            .iter_mut()
            .find(|module| module.id == id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Module, id))
    }
}

fn software_not_found(module_id: &str, name: &str) -> CatalogError {
    CatalogError::not_found(EntityKind::Software, software_key(module_id, name))
}

fn owned_modules(modules: &[Module], instructor_id: &str) -> BTreeSet<EntityId> {
    modules
        .iter()
        .filter(|module| module.instructor.as_deref() == Some(instructor_id))
        .map(|module| module.id.clone())
        .collect()
}

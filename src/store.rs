//! YAML-backed durable store for the catalog.
//!
//! The file keeps the layout the web tool has always written: `instructors`
//! and `modules` mappings keyed by id, plus any other top-level sections
//! (mail settings, report settings, audit log) which the store carries over
//! untouched on every save.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditEntry;
use crate::error::{CatalogError, Result};
use crate::model::{Catalog, Instructor, Module, Software};

const INSTRUCTORS_SECTION: &str = "instructors";
const MODULES_SECTION: &str = "modules";
const AUDIT_LOG_SECTION: &str = "audit_log";

/// Knobs for how the store writes backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Also keep a `<stem>_<timestamp>.<ext>.backup` copy on every save.
    pub timestamped_backups: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timestamped_backups: true,
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Where the previous contents went, if there were any.
    pub backup: Option<PathBuf>,
}

/// Loads and saves a [`Catalog`] as a YAML file.
#[derive(Debug, Clone)]
pub struct YamlStore {
    path: PathBuf,
    options: StoreOptions,
}

impl YamlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, StoreOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the rolling backup, `<file name>.backup`.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "catalog.yml".into());
        name.push(".backup");
        self.path.with_file_name(name)
    }

    /// Reads the store into a catalog. The instructor relation is re-derived
    /// from the module side; validation is left to the caller.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Catalog> {
        let content = fs::read_to_string(&self.path)?;
        let document = self.parse_document(&content)?;

        let mut instructors = Vec::new();
        for (id, value) in self.section(&document, INSTRUCTORS_SECTION)? {
            let record: InstructorRecord = serde_yaml::from_value(value)
                .map_err(|err| self.corrupt(format!("instructor '{id}': {err}")))?;
            instructors.push(record.into_instructor(id));
        }

        let mut modules = Vec::new();
        for (id, value) in self.section(&document, MODULES_SECTION)? {
            let record: ModuleRecord = serde_yaml::from_value(value)
                .map_err(|err| self.corrupt(format!("module '{id}': {err}")))?;
            modules.push(record.into_module(id));
        }

        let mut catalog = Catalog::from_parts(instructors, modules);
        for id in catalog.derive_instructor_modules() {
            warn!(
                instructor = %id,
                "stored module list disagrees with module assignments; using module side"
            );
        }

        info!(
            instructors = catalog.instructor_count(),
            modules = catalog.module_count(),
            software = catalog.software_count(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Reads the `audit_log` section written by the web tool. Entries that do
    /// not have the expected shape are skipped with a warning; a store without
    /// the section has an empty log.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn audit_log(&self) -> Result<Vec<AuditEntry>> {
        let content = fs::read_to_string(&self.path)?;
        let document = self.parse_document(&content)?;

        let entries = match document.get(AUDIT_LOG_SECTION) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Sequence(entries)) => entries,
            Some(_) => {
                warn!("audit log is not a list; ignoring it");
                return Ok(Vec::new());
            }
        };

        let mut log = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match serde_yaml::from_value::<AuditEntry>(entry.clone()) {
                Ok(entry) => log.push(entry),
                Err(err) => warn!(position, error = %err, "skipping malformed audit entry"),
            }
        }
        debug!(entries = log.len(), "read audit log");
        Ok(log)
    }

    /// Persists the catalog.
    ///
    /// The current file is copied to [`YamlStore::backup_path`] first; if that
    /// copy fails nothing is written. The new contents go to a temporary file
    /// in the same directory which then replaces the store in one rename.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, catalog: &Catalog) -> Result<SaveOutcome> {
        ensure_unique_ids(catalog)?;

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => Some(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        let mut document = match existing.as_deref().map(|content| self.parse_document(content)) {
            Some(Ok(document)) => document,
            Some(Err(err)) => {
                warn!(
                    error = %err,
                    "current store is unreadable; foreign sections will not be kept"
                );
                Mapping::new()
            }
            None => Mapping::new(),
        };

        document.insert(
            Value::from(INSTRUCTORS_SECTION),
            Value::Mapping(instructors_mapping(catalog)?),
        );
        document.insert(
            Value::from(MODULES_SECTION),
            Value::Mapping(modules_mapping(catalog)?),
        );
        let rendered = serde_yaml::to_string(&document)?;

        let backup = match existing {
            Some(_) => Some(self.backup()?),
            None => None,
        };

        self.write_atomically(&rendered)?;
        info!(
            instructors = catalog.instructor_count(),
            modules = catalog.module_count(),
            backup = ?backup,
            "saved catalog"
        );
        Ok(SaveOutcome { backup })
    }

    fn backup(&self) -> Result<PathBuf> {
        let backup_path = self.backup_path();
        copy_for_backup(&self.path, &backup_path)?;

        if self.options.timestamped_backups {
            let stamped = self.timestamped_backup_path();
            copy_for_backup(&self.path, &stamped)?;
            debug!(path = %stamped.display(), "timestamped backup written");
        }

        Ok(backup_path)
    }

    fn timestamped_backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        let extension = self
            .path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yml".to_string());
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.path
            .with_file_name(format!("{stem}_{stamp}.{extension}.backup"))
    }

    fn write_atomically(&self, content: &str) -> Result<()> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(directory)?;

        let mut temp = NamedTempFile::new_in(directory)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    fn parse_document(&self, content: &str) -> Result<Mapping> {
        match serde_yaml::from_str::<Value>(content) {
            Ok(Value::Mapping(document)) => Ok(document),
            Ok(Value::Null) => Err(self.corrupt("store is empty")),
            Ok(_) => Err(self.corrupt("top level is not a mapping")),
            Err(err) => Err(self.corrupt(err.to_string())),
        }
    }

    fn section(&self, document: &Mapping, name: &str) -> Result<Vec<(String, Value)>> {
        let value = document
            .get(name)
            .ok_or_else(|| self.corrupt(format!("missing required section '{name}'")))?;

        let entries = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Mapping(entries) => entries,
            _ => return Err(self.corrupt(format!("section '{name}' is not a mapping"))),
        };

        entries
            .iter()
            .map(|(key, value)| {
                let id = match key {
                    Value::String(id) => id.clone(),
                    Value::Number(id) => id.to_string(),
                    _ => return Err(self.corrupt(format!("section '{name}' has a non-scalar key"))),
                };
                Ok((id, value.clone()))
            })
            .collect()
    }

    fn corrupt(&self, reason: impl Into<String>) -> CatalogError {
        CatalogError::CorruptStore {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

fn copy_for_backup(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|source| CatalogError::BackupFailed {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn ensure_unique_ids(catalog: &Catalog) -> Result<()> {
    let mut seen = HashSet::new();
    if let Some(duplicate) = catalog.list_instructors().find(|i| !seen.insert(i.id.as_str())) {
        return Err(CatalogError::Conflict(format!(
            "instructor id '{}' appears twice and cannot be stored",
            duplicate.id
        )));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = catalog.list_modules().find(|m| !seen.insert(m.id.as_str())) {
        return Err(CatalogError::Conflict(format!(
            "module id '{}' appears twice and cannot be stored",
            duplicate.id
        )));
    }
    Ok(())
}

fn instructors_mapping(catalog: &Catalog) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for instructor in catalog.list_instructors() {
        let record = InstructorRecord::from(instructor);
        mapping.insert(Value::from(instructor.id.as_str()), serde_yaml::to_value(record)?);
    }
    Ok(mapping)
}

fn modules_mapping(catalog: &Catalog) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for module in catalog.list_modules() {
        let record = ModuleRecord::from(module);
        mapping.insert(Value::from(module.id.as_str()), serde_yaml::to_value(record)?);
    }
    Ok(mapping)
}

#[derive(Debug, Serialize, Deserialize)]
struct InstructorRecord {
    #[serde(deserialize_with = "scalar::text")]
    name: String,
    #[serde(deserialize_with = "scalar::text")]
    email: String,
    #[serde(default, deserialize_with = "scalar::text")]
    department: String,
    #[serde(default, deserialize_with = "scalar::or_empty")]
    modules: Vec<String>,
    #[serde(default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    last_review: Option<NaiveDate>,
}

impl InstructorRecord {
    fn into_instructor(self, id: String) -> Instructor {
        Instructor {
            id,
            name: self.name,
            email: self.email,
            department: self.department,
            modules: self.modules.into_iter().collect(),
            last_review: self.last_review,
        }
    }
}

impl From<&Instructor> for InstructorRecord {
    fn from(instructor: &Instructor) -> Self {
        Self {
            name: instructor.name.clone(),
            email: instructor.email.clone(),
            department: instructor.department.clone(),
            modules: instructor.modules.iter().cloned().collect(),
            last_review: instructor.last_review,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModuleRecord {
    #[serde(default, deserialize_with = "scalar::text")]
    code: String,
    #[serde(deserialize_with = "scalar::text")]
    name: String,
    #[serde(default, deserialize_with = "scalar::text")]
    description: String,
    #[serde(default = "first_term", deserialize_with = "scalar::small_int")]
    year: u8,
    #[serde(default = "first_term", deserialize_with = "scalar::small_int")]
    semester: u8,
    #[serde(
        default,
        rename = "instructor_id",
        alias = "instructor",
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    instructor: Option<String>,
    #[serde(default, deserialize_with = "scalar::or_empty")]
    software: Vec<SoftwareRecord>,
}

impl ModuleRecord {
    fn into_module(self, id: String) -> Module {
        Module {
            id,
            code: self.code,
            name: self.name,
            description: self.description,
            year: self.year,
            semester: self.semester,
            instructor: self.instructor,
            software: self.software.into_iter().map(Software::from).collect(),
        }
    }
}

impl From<&Module> for ModuleRecord {
    fn from(module: &Module) -> Self {
        Self {
            code: module.code.clone(),
            name: module.name.clone(),
            description: module.description.clone(),
            year: module.year,
            semester: module.semester,
            instructor: module.instructor.clone(),
            software: module.software.iter().map(SoftwareRecord::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SoftwareRecord {
    #[serde(deserialize_with = "scalar::text")]
    name: String,
    #[serde(default, deserialize_with = "scalar::text")]
    version: String,
    #[serde(default, deserialize_with = "scalar::text")]
    purpose: String,
    #[serde(default, deserialize_with = "scalar::flag")]
    critical: bool,
    #[serde(default, deserialize_with = "scalar::text")]
    notes: String,
    #[serde(default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    last_verified: Option<NaiveDate>,
    #[serde(default, deserialize_with = "scalar::text")]
    verified_by: String,
}

impl From<SoftwareRecord> for Software {
    fn from(record: SoftwareRecord) -> Self {
        Software {
            name: record.name,
            version: record.version,
            purpose: record.purpose,
            critical: record.critical,
            notes: record.notes,
            last_verified: record.last_verified,
            verified_by: record.verified_by,
        }
    }
}

impl From<&Software> for SoftwareRecord {
    fn from(software: &Software) -> Self {
        Self {
            name: software.name.clone(),
            version: software.version.clone(),
            purpose: software.purpose.clone(),
            critical: software.critical,
            notes: software.notes.clone(),
            last_verified: software.last_verified,
            verified_by: software.verified_by.clone(),
        }
    }
}

fn first_term() -> u8 {
    1
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = scalar::text(deserializer)?;
    Ok(Some(text).filter(|text| !text.trim().is_empty()))
}

/// Field readers that accept what people type into the YAML by hand. They
/// apply the same coercions as the workbook import.
pub(crate) mod scalar {
    use serde::{Deserialize, Deserializer, de};
    use serde_yaml::Value;

    use crate::records::{parse_critical, parse_small_int};

    /// Any scalar as display text. Null reads as an empty string.
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            _ => Err(de::Error::custom("expected a scalar value")),
        }
    }

    /// Year or semester, written as a number or as text.
    pub fn small_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let text = text(deserializer)?;
        parse_small_int(&text).map_err(de::Error::custom)
    }

    /// A boolean, or a `Yes`/`No` style word.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(false),
            Value::Bool(flag) => Ok(flag),
            Value::String(text) => Ok(parse_critical(&text)),
            Value::Number(number) => Ok(parse_critical(&number.to_string())),
            _ => Err(de::Error::custom("expected a yes/no value")),
        }
    }

    /// A list that may be left blank.
    pub fn or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Dates are stored as ISO strings; blank strings read as "no date".
mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserializer, Serializer, de};

    use crate::records::{DATE_FORMAT, parse_date};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let text = super::scalar::text(deserializer)?;
        parse_date(&text).map_err(de::Error::custom)
    }
}

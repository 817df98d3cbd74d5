//! Software change history kept by the web tool in the store's `audit_log`
//! section, flattened into one row per changed field for the workbook.

use serde::{Deserialize, Serialize};

use crate::store::scalar;

/// Action recorded when an existing software entry was edited.
pub const UPDATED_ACTION: &str = "updated";

/// One recorded change to a module's software list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditEntry {
    #[serde(default, deserialize_with = "scalar::text")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "scalar::text")]
    pub module_id: String,
    #[serde(default, deserialize_with = "scalar::text")]
    pub software_name: String,
    /// `added`, `updated` or `deleted`.
    #[serde(default, deserialize_with = "scalar::text")]
    pub action: String,
    #[serde(default, deserialize_with = "scalar::text")]
    pub actor: String,
    #[serde(default, deserialize_with = "scalar::or_empty")]
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldChange {
    #[serde(default, deserialize_with = "scalar::text")]
    pub field: String,
    #[serde(default, deserialize_with = "scalar::text")]
    pub old: String,
    #[serde(default, deserialize_with = "scalar::text")]
    pub new: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeLogRow {
    pub timestamp: String,
    pub module_id: String,
    pub software_name: String,
    pub action: String,
    pub actor: String,
    /// Changed field, or `*` when the whole entry was added or removed.
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

/// Expands the audit log into change-log rows. An update yields one row per
/// changed field; any other action yields a single `*` row.
pub fn changelog_rows(entries: &[AuditEntry]) -> Vec<ChangeLogRow> {
    let mut rows = Vec::new();
    for entry in entries {
        let row = |field: &str, old_value: &str, new_value: &str| ChangeLogRow {
            timestamp: entry.timestamp.clone(),
            module_id: entry.module_id.clone(),
            software_name: entry.software_name.clone(),
            action: entry.action.clone(),
            actor: entry.actor.clone(),
            field: field.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        };

        if entry.action == UPDATED_ACTION {
            rows.extend(
                entry
                    .changes
                    .iter()
                    .map(|change| row(&change.field, &change.old, &change.new)),
            );
        } else {
            rows.push(row("*", "", ""));
        }
    }
    rows
}

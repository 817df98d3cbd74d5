//! Human-readable summaries built on the catalog's query surface.

use std::fmt::Write;

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{Catalog, Instructor};
use crate::records::{format_date, join_module_ids};

/// Renders the Markdown inventory summary handed to mail and chat senders.
pub fn summary_report(catalog: &Catalog, generated_at: NaiveDateTime) -> String {
    let mut report = String::from("# Teaching Software Inventory\n\n");
    let _ = writeln!(report, "Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S"));

    report.push_str("## Instructors\n\n");
    for instructor in catalog.list_instructors() {
        let last_review = match instructor.last_review {
            Some(date) => format_date(Some(date)),
            None => "N/A".to_string(),
        };
        let _ = writeln!(report, "- **{}** ({})", instructor.name, instructor.department);
        let _ = writeln!(report, "  - Email: {}", instructor.email);
        let _ = writeln!(report, "  - Modules: {}", join_module_ids(&instructor.modules));
        let _ = writeln!(report, "  - Last review: {last_review}\n");
    }

    report.push_str("## Modules\n\n");
    for module in catalog.list_modules() {
        let _ = writeln!(report, "### {} (ID: {})", module.name, module.id);
        let _ = writeln!(report, "- Year: {}", module.year);
        let _ = writeln!(report, "- Semester: {}", module.semester);
        let _ = writeln!(
            report,
            "- Software: {} items ({} critical)\n",
            module.software.len(),
            module.critical_count()
        );
    }

    report
}

/// Instructors whose software list has not been reviewed within
/// `max_age_days` of `today`, including those never reviewed.
pub fn due_for_review(catalog: &Catalog, today: NaiveDate, max_age_days: i64) -> Vec<&Instructor> {
    catalog
        .list_instructors()
        .filter(|instructor| match instructor.last_review {
            Some(reviewed) => (today - reviewed).num_days() > max_age_days,
            None => true,
        })
        .collect()
}

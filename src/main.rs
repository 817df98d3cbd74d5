use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use teaching_catalog::logging::init_logging;
use teaching_catalog::{
    CatalogError, LiveCatalog, Result, StoreOptions, YamlStore, report, sync, validate,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose) {
        eprintln!("warning: {error}");
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error}");
            for issue in error.issues() {
                eprintln!("  - {issue}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Runs one command. `Ok(false)` means the command completed but found
/// problems worth a non-zero exit status.
fn run(cli: Cli) -> Result<bool> {
    if !cli.store.exists() {
        return Err(CatalogError::MissingInput(cli.store));
    }

    let store = YamlStore::with_options(
        &cli.store,
        StoreOptions {
            timestamped_backups: !cli.no_timestamped_backups,
        },
    );
    let live = LiveCatalog::new(store.load()?);

    match cli.command {
        Command::Validate { json } => {
            let issues = validate(&live.snapshot());
            if json {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else if issues.is_empty() {
                println!("Configuration is valid");
            } else {
                println!("Configuration validation errors:");
                for issue in &issues {
                    println!("  - {issue}");
                }
            }
            Ok(issues.is_empty())
        }
        Command::List { kind, json } => {
            let catalog = live.snapshot();
            match (kind, json) {
                (ListKind::Instructors, true) => {
                    let instructors: Vec<_> = catalog.list_instructors().collect();
                    println!("{}", serde_json::to_string_pretty(&instructors)?);
                }
                (ListKind::Modules, true) => {
                    let modules: Vec<_> = catalog.list_modules().collect();
                    println!("{}", serde_json::to_string_pretty(&modules)?);
                }
                (ListKind::Instructors, false) => {
                    println!("{:<15} {:<30} {:<30} Modules", "ID", "Name", "Email");
                    println!("{}", "-".repeat(95));
                    for instructor in catalog.list_instructors() {
                        let modules: Vec<&str> =
                            instructor.modules.iter().map(String::as_str).collect();
                        println!(
                            "{:<15} {:<30} {:<30} {}",
                            instructor.id,
                            instructor.name,
                            instructor.email,
                            modules.join(", ")
                        );
                    }
                }
                (ListKind::Modules, false) => {
                    println!(
                        "{:<20} {:<30} {:<5} {:<10} Software",
                        "ID", "Name", "Year", "Semester"
                    );
                    println!("{}", "-".repeat(75));
                    for module in catalog.list_modules() {
                        println!(
                            "{:<20} {:<30} {:<5} {:<10} {}",
                            module.id,
                            module.name,
                            module.year,
                            module.semester,
                            module.software.len()
                        );
                    }
                }
            }
            Ok(true)
        }
        Command::Report(args) => {
            let catalog = live.snapshot();
            let now = Local::now().naive_local();
            let text = match args.kind {
                ReportKind::Summary => report::summary_report(&catalog, now),
                ReportKind::Due => report::due_for_review(&catalog, now.date(), args.max_age_days)
                    .into_iter()
                    .map(|instructor| format!("{} <{}>\n", instructor.name, instructor.email))
                    .collect(),
            };
            match args.output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("Report saved to {}", path.display());
                }
                None => print!("{text}"),
            }
            Ok(true)
        }
        Command::Export { output } => {
            let output = output.unwrap_or(cli.workbook);
            let audit = store.audit_log()?;
            sync::export_to_excel(&live.snapshot(), &audit, &output)?;
            println!("Exported to {}", output.display());
            Ok(true)
        }
        Command::Import { input } => {
            let input = input.unwrap_or(cli.workbook);
            let signal = sync::import_from_excel(&store, &live, &input)?;
            println!(
                "Imported {} instructors, {} modules, {} software entries from {}",
                signal.instructors,
                signal.modules,
                signal.software,
                input.display()
            );
            if let Some(backup) = signal.backup {
                println!("Previous store saved to {}", backup.display());
            }
            Ok(true)
        }
        Command::Status { json } => {
            let status = sync::sync_status(&live.snapshot(), &cli.workbook);
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!(
                    "store:    {} instructors, {} modules",
                    status.store.instructors, status.store.modules
                );
                match (&status.workbook_error, status.workbook_exists) {
                    (Some(error), _) => println!("workbook: unreadable ({error})"),
                    (None, false) => {
                        println!("workbook: not found at {}", status.workbook_path.display())
                    }
                    (None, true) => println!(
                        "workbook: {} instructors, {} modules",
                        status.workbook.instructors, status.workbook.modules
                    ),
                }
            }
            Ok(status.in_step())
        }
        Command::Remove { kind, id, cascade } => {
            live.update(|catalog| match kind {
                RemoveKind::Instructor => catalog.remove_instructor(&id, cascade).map(|_| ()),
                RemoveKind::Module => catalog.remove_module(&id, cascade).map(|_| ()),
            })?;
            store.save(&live.snapshot())?;
            println!("Removed {} {id}", kind.label());
            Ok(true)
        }
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Keep the teaching-software catalog and its spreadsheet in step."
)]
struct Cli {
    /// YAML store holding the catalog.
    #[arg(
        long,
        global = true,
        env = "TEACHING_CATALOG_STORE",
        default_value = "config/teaching_software.yml"
    )]
    store: PathBuf,

    /// Exchange workbook used by export, import, and status.
    #[arg(
        long,
        global = true,
        env = "TEACHING_CATALOG_WORKBOOK",
        default_value = "config/teaching_software.xlsx"
    )]
    workbook: PathBuf,

    /// Only keep the rolling `.backup` copy when saving.
    #[arg(long, global = true)]
    no_timestamped_backups: bool,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the store for dangling references, duplicates, and drift.
    Validate {
        #[arg(long)]
        json: bool,
    },
    /// List instructors or modules.
    List {
        #[arg(value_enum)]
        kind: ListKind,
        #[arg(long)]
        json: bool,
    },
    /// Generate a report from the catalog.
    Report(ReportArgs),
    /// Write the catalog to the exchange workbook.
    Export {
        /// Workbook to write instead of `--workbook`.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the catalog with the contents of the exchange workbook.
    Import {
        /// Workbook to read instead of `--workbook`.
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
    /// Compare record counts between the store and the workbook.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Remove an instructor or a module.
    Remove {
        #[arg(value_enum)]
        kind: RemoveKind,
        id: String,
        /// Clear references to the removed record instead of refusing.
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(clap::Args)]
struct ReportArgs {
    #[arg(value_enum)]
    kind: ReportKind,

    /// Review age, in days, after which an instructor is due.
    #[arg(long, default_value_t = 180)]
    max_age_days: i64,

    /// Write the report to a file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ListKind {
    Instructors,
    Modules,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ReportKind {
    Summary,
    Due,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RemoveKind {
    Instructor,
    Module,
}

impl RemoveKind {
    fn label(self) -> &'static str {
        match self {
            RemoveKind::Instructor => "instructor",
            RemoveKind::Module => "module",
        }
    }
}

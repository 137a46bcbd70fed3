//! History CLI commands
//!
//! Lists, shows, undoes and redoes the recorded versions of a trackable.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::audit::AuditRecord;
use crate::config::Settings;
use crate::display::{format_history, format_record_details, format_value};
use crate::error::{HistoryError, HistoryResult};
use crate::models::AssociationChain;
use crate::services::{ChainResolver, HistoryService, VersionSelector};
use crate::storage::Storage;

/// Which versions an undo or redo applies to
#[derive(Args, Debug, Clone, Default)]
pub struct SelectorArgs {
    /// A single version
    #[arg(long, conflicts_with_all = ["from", "to", "last"])]
    pub version: Option<u64>,
    /// First version of an inclusive range
    #[arg(long, requires = "to", conflicts_with = "last")]
    pub from: Option<u64>,
    /// Last version of an inclusive range
    #[arg(long, requires = "from", conflicts_with = "last")]
    pub to: Option<u64>,
    /// The most recent N versions
    #[arg(long)]
    pub last: Option<usize>,
}

impl SelectorArgs {
    /// The selected versions; the latest version when nothing is given
    pub fn to_selector(&self) -> HistoryResult<VersionSelector> {
        match (self.version, self.from, self.to, self.last) {
            (Some(v), None, None, None) => Ok(VersionSelector::Version(v)),
            (None, Some(from), Some(to), None) => Ok(VersionSelector::Range { from, to }),
            (None, None, None, Some(0)) => Err(HistoryError::Validation(
                "--last must be at least 1".into(),
            )),
            (None, None, None, Some(n)) => Ok(VersionSelector::Last(n)),
            (None, None, None, None) => Ok(VersionSelector::Last(1)),
            _ => Err(HistoryError::Validation(
                "Use one of --version, --from/--to or --last".into(),
            )),
        }
    }
}

/// History subcommands
#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List the recorded versions of a document
    #[command(name = "history", alias = "ls")]
    List {
        /// Document path, e.g. Order:1/lineItems:5
        chain: AssociationChain,
    },
    /// Show one version with all of its tracked edits
    Show {
        /// Document path, e.g. Order:1/lineItems:5
        chain: AssociationChain,
        /// Version to show
        version: u64,
    },
    /// Revert recorded versions, newest first
    Undo {
        /// Document path, e.g. Order:1/lineItems:5
        chain: AssociationChain,
        #[command(flatten)]
        selector: SelectorArgs,
        /// Who is performing the undo
        #[arg(short, long)]
        modifier: Option<String>,
    },
    /// Re-apply recorded versions, oldest first
    Redo {
        /// Document path, e.g. Order:1/lineItems:5
        chain: AssociationChain,
        #[command(flatten)]
        selector: SelectorArgs,
        /// Who is performing the redo
        #[arg(short, long)]
        modifier: Option<String>,
    },
    /// Show the most recent records across all documents
    Log {
        /// Only records whose root document has this type
        #[arg(short, long)]
        scope: Option<String>,
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Append audit records from a JSON array file to the history log
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
}

/// Handle a history command
pub fn handle_history_command(
    storage: &Storage,
    settings: &Settings,
    cmd: HistoryCommands,
) -> HistoryResult<()> {
    let service = HistoryService::new(&storage.documents, storage.schema(), &storage.history)
        .with_modifier_field(settings.modifier_field.clone());

    match cmd {
        HistoryCommands::List { chain } => {
            let records = service.history_for(&chain)?;
            let entries = records
                .into_iter()
                .map(|record| {
                    let edits = service.tracked_edits(&record)?;
                    Ok((record, edits))
                })
                .collect::<HistoryResult<Vec<_>>>()?;

            println!("History of {}", chain);
            println!("{}", format_history(&entries));

            match ChainResolver::new(&storage.documents).trackable(&chain)? {
                Some(doc) => {
                    if let Some(version) = doc.get(&settings.version_field) {
                        println!("Live document is at version {}", format_value(version));
                    }
                }
                None => println!("Document no longer exists."),
            }
        }

        HistoryCommands::Show { chain, version } => {
            let record = service.record(&chain, version)?;
            let edits = service.tracked_edits(&record)?;
            print!("{}", format_record_details(&record, &edits));
        }

        HistoryCommands::Undo {
            chain,
            selector,
            modifier,
        } => {
            let modifier = resolve_modifier(modifier, settings);
            let outcomes = service.undo(&chain, modifier.as_ref(), selector.to_selector()?)?;
            storage.save_documents(settings.backup_before_write)?;
            for outcome in outcomes {
                println!("Undo: {}", outcome);
            }
        }

        HistoryCommands::Redo {
            chain,
            selector,
            modifier,
        } => {
            let modifier = resolve_modifier(modifier, settings);
            let outcomes = service.redo(&chain, modifier.as_ref(), selector.to_selector()?)?;
            storage.save_documents(settings.backup_before_write)?;
            for outcome in outcomes {
                println!("Redo: {}", outcome);
            }
        }

        HistoryCommands::Log { scope, limit } => {
            let records = match scope {
                Some(scope) => {
                    let mut records = storage.history.for_scope(&scope)?;
                    let start = records.len().saturating_sub(limit);
                    records.split_off(start)
                }
                None => storage.history.read_recent(limit)?,
            };
            if records.is_empty() {
                println!("No history found.");
            }
            for record in &records {
                println!("{}", record.format_human_readable());
            }
        }

        HistoryCommands::Import { file } => {
            let contents = std::fs::read_to_string(&file)?;
            let records: Vec<AuditRecord> = serde_json::from_str(&contents)?;
            let count = import_records(storage, records)?;
            println!("Imported {} record(s) into {}", count, storage.history.path().display());
        }
    }

    Ok(())
}

/// Modifier from the command line, else the configured default
fn resolve_modifier(cli: Option<String>, settings: &Settings) -> Option<Value> {
    cli.or_else(|| settings.default_modifier.clone())
        .map(Value::String)
}

/// Append records to the history log, assigning versions where missing
///
/// Used to import records produced elsewhere. Chains are checked when the
/// records are parsed; ids, timestamps and scopes missing from the source
/// are filled in at that point too.
pub fn import_records(storage: &Storage, records: Vec<AuditRecord>) -> HistoryResult<usize> {
    let mut imported = Vec::with_capacity(records.len());
    for mut record in records {
        if record.version == 0 {
            let pending = imported
                .iter()
                .filter(|r: &&AuditRecord| r.association_chain == record.association_chain)
                .map(|r| r.version)
                .max();
            record.version = match pending {
                Some(v) => v + 1,
                None => storage.history.next_version(&record.association_chain)?,
            };
        }
        imported.push(record);
    }
    storage.history.log_batch(&imported)?;
    Ok(imported.len())
}

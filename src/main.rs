use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use doc_history::cli::{handle_history_command, HistoryCommands};
use doc_history::config::{paths::HistoryPaths, settings::Settings};
use doc_history::storage::{write_json_atomic, Schema, Storage};

#[derive(Parser)]
#[command(
    name = "dochist",
    version,
    about = "Change history, undo and redo for hierarchical documents",
    long_about = "dochist lists the recorded versions of a document, shows what each \
                  version changed, and undoes or redoes versions against the live \
                  document store, including documents embedded in other documents."
)]
struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    History(HistoryCommands),

    /// Create the settings and schema files
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = HistoryPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level.raised_by(cli.verbose).as_tracing())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::History(cmd)) => {
            let storage = Storage::open(paths)?;
            handle_history_command(&storage, &settings, cmd)?;
        }
        Some(Commands::Init) => {
            println!("Initializing doc-history at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            if !paths.schema_file().exists() {
                write_json_atomic(paths.schema_file(), &Schema::new())?;
                println!("Created empty schema: {}", paths.schema_file().display());
            }
            println!("Initialization complete!");
        }
        Some(Commands::Config) => {
            println!("doc-history Configuration");
            println!("=========================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("History log:      {}", paths.history_log().display());
            println!("Documents file:   {}", paths.documents_file().display());
            println!("Schema file:      {}", paths.schema_file().display());
            println!("Backup directory: {}", paths.backup_dir().display());
            println!();
            println!("Settings:");
            println!("  Modifier field:   {}", settings.modifier_field);
            println!("  Version field:    {}", settings.version_field);
            println!(
                "  Default modifier: {}",
                settings.default_modifier.as_deref().unwrap_or("(none)")
            );
            println!("  Log level:        {:?}", settings.log_level);
            println!("  Backup on write:  {}", settings.backup_before_write);
        }
        None => {
            println!("dochist - change history for hierarchical documents");
            println!();
            println!("Run 'dochist --help' for usage information.");
        }
    }

    Ok(())
}

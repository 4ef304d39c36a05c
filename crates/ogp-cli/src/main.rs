//! OG+ CLI
//!
//! Inspect and edit an OG+ options file with the same preference store the
//! extension uses, and export the TypeScript shapes of the relay messages.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ts_rs::TS;

use ogp_core::{Categories, KvStore, Options, PreferenceStore, RelayReply, RelayRequest};

mod store;

use store::FileStore;

#[derive(Parser)]
#[command(name = "ogp")]
#[command(about = "OG+ options inspector and tools")]
struct Cli {
    /// Options file
    #[arg(short, long, global = true, default_value = "options.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default options if none are stored
    Init,

    /// Print the stored options
    Show,

    /// Mark a category as safe
    Mark {
        category: String,
    },

    /// Unmark a category
    Unmark {
        category: String,
    },

    /// Flip a category's safeness
    Toggle {
        category: String,
    },

    /// Report whether a category is safe
    Check {
        category: String,
    },

    /// Export TypeScript definitions for the options and relay messages
    ExportTypes {
        /// Output directory
        #[arg(short, long, default_value = "bindings")]
        out: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ExportTypes { out } => cmd_export_types(&out),
        command => run(&cli.store, command),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(path: &Path, command: Commands) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {e}"))?;
    let prefs = PreferenceStore::new(FileStore::new(path));
    log::debug!("using options file {}", prefs.backend().path().display());
    runtime.block_on(execute(&prefs, command))
}

async fn execute<S: KvStore>(prefs: &PreferenceStore<S>, command: Commands) -> Result<(), String> {
    let fail = |e: ogp_core::StorageError| e.to_string();
    match command {
        Commands::Init => {
            if prefs.init().await.map_err(fail)? {
                println!("Initialized default options");
            } else {
                println!("Options already initialized");
            }
        }
        Commands::Show => print_options(prefs).await?,
        Commands::Mark { category } => {
            prefs.mark_as_safe(Some(&category)).await.map_err(fail)?;
            print_options(prefs).await?;
        }
        Commands::Unmark { category } => {
            prefs.unmark_as_safe(Some(&category)).await.map_err(fail)?;
            print_options(prefs).await?;
        }
        Commands::Toggle { category } => {
            prefs.toggle_safeness(Some(&category)).await.map_err(fail)?;
            print_options(prefs).await?;
        }
        Commands::Check { category } => {
            let safe = prefs.is_marked_as_safe(&category).await.map_err(fail)?;
            println!("{category}: {}", if safe { "safe" } else { "not safe" });
        }
        Commands::ExportTypes { out } => cmd_export_types(&out)?,
    }
    Ok(())
}

async fn print_options<S: KvStore>(prefs: &PreferenceStore<S>) -> Result<(), String> {
    match prefs.get().await.map_err(|e| e.to_string())? {
        Some(opts) => {
            println!("Safe categories ({}):", opts.safe_count());
            for category in &opts.categories.safe {
                println!("  {category}");
            }
        }
        None => println!("No options stored (run `ogp init`)"),
    }
    Ok(())
}

fn cmd_export_types(out: &Path) -> Result<(), String> {
    std::fs::create_dir_all(out).map_err(|e| format!("Failed to create '{}': {e}", out.display()))?;
    let export = |result: Result<(), ts_rs::ExportError>| result.map_err(|e| format!("Export failed: {e}"));
    export(Options::export_all_to(out))?;
    export(Categories::export_all_to(out))?;
    export(RelayRequest::export_all_to(out))?;
    export(RelayReply::export_all_to(out))?;
    println!("Exported TypeScript definitions to '{}'", out.display());
    Ok(())
}

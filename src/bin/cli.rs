//! HelixKV CLI
//!
//! Command-line interface for manipulating HelixKV store files directly.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use helixkv::{OpenOptions, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// HelixKV CLI
#[derive(Parser, Debug)]
#[command(name = "helixkv-cli")]
#[command(about = "CLI for HelixKV key-value store files")]
struct Args {
    /// Store file (extension selects the backend: .hxt tree, .hxh hash)
    #[arg(short, long)]
    file: String,

    /// Extra open parameters, "key1=value1,key2=value2"
    #[arg(short, long, default_value = "")]
    params: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty store file
    Create,

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Remove a key
    Remove {
        /// The key to remove
        key: String,
    },

    /// List all records
    List,

    /// Search keys with a pattern
    Search {
        /// Search mode (contain, begin, end, regex, edit, ...)
        mode: String,

        /// The pattern to search for
        pattern: String,

        /// Maximum number of results (0 = unlimited)
        #[arg(default_value_t = 0)]
        capacity: usize,
    },

    /// Print diagnostic properties
    Inspect,

    /// Rebuild the store in place
    Rebuild,

    /// Export all records to a flat record file
    ExportFlat {
        /// Destination flat record file
        dest: PathBuf,
    },

    /// Import records from a flat record file
    ImportFlat {
        /// Source flat record file
        src: PathBuf,
    },

    /// Restore a healthy store file from a possibly-broken one
    Restore {
        /// Destination store file
        dest: PathBuf,

        /// Backend class (inferred when omitted)
        #[arg(long, default_value = "")]
        class: String,

        /// Scan limit in bytes (<= 0 = unlimited)
        #[arg(long, default_value_t = -1)]
        end_offset: i64,
    },
}

fn main() {
    // Initialize tracing/logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> helixkv::Result<()> {
    let options = OpenOptions::from_params(&args.params);

    // Restore works on the file itself, without opening it
    if let Commands::Restore {
        dest,
        class,
        end_offset,
    } = &args.command
    {
        return Store::restore_database(
            std::path::Path::new(&args.file),
            dest,
            class,
            *end_offset,
        );
    }

    let writable = !matches!(
        &args.command,
        Commands::Get { .. } | Commands::List | Commands::Search { .. } | Commands::Inspect
    );
    let store = Store::new();
    store.open(&args.file, writable, &options)?;

    let result = execute(&store, &args.command);
    let close_result = store.close();
    result?;
    close_result
}

fn execute(store: &Store, command: &Commands) -> helixkv::Result<()> {
    match command {
        Commands::Create | Commands::Restore { .. } => Ok(()),
        Commands::Get { key } => {
            let value = store.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Commands::Set { key, value } => store.set(key.as_bytes(), value.as_bytes(), true),
        Commands::Remove { key } => store.remove(key.as_bytes()),
        Commands::List => {
            let mut cursor = store.make_cursor();
            cursor.first()?;
            while let Ok((key, value)) = cursor.step() {
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
            Ok(())
        }
        Commands::Search {
            mode,
            pattern,
            capacity,
        } => {
            for key in store.search(mode, pattern.as_bytes(), *capacity)? {
                println!("{}", String::from_utf8_lossy(&key));
            }
            Ok(())
        }
        Commands::Inspect => {
            let mut props: Vec<_> = store.inspect()?.into_iter().collect();
            props.sort();
            for (name, value) in props {
                println!("{}={}", name, value);
            }
            Ok(())
        }
        Commands::Rebuild => store.rebuild(),
        Commands::ExportFlat { dest } => store.export_to_flat_records(dest),
        Commands::ImportFlat { src } => store.import_from_flat_records(src),
    }
}

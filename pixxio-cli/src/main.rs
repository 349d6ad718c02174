use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pixxio_core::project::{project_dir, CONFIG_FILE};
use pixxio_core::secrets::{DEFAULT_ENCRYPTION_KEY, SECRETS_FILE};
use pixxio_core::{
    AssetRecord, AssetSourceOptions, AssetTypeFilter, ClientSecretRepository, CollectionFilter,
    MemoryStringCache, PixxioApi, PixxioAssetSource, PixxioClient, ProxyCache, Query,
    SortDirection, TaggingOutcome,
};

const SOURCE_IDENTIFIER: &str = "pixxio";

#[derive(Parser)]
#[command(author, version, about = "Browse and tag pixx.io assets", long_about = None)]
struct Cli {
    /// Path to the asset source options (defaults to .pixxio/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Account whose refresh token is used
    #[arg(long, global = true, default_value = "shared")]
    account: String,
    /// Log requests and cache activity
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new pixx.io project
    Init,
    /// Manage stored refresh tokens
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
    /// Check that the configured credentials are accepted
    Connect,
    /// Search assets
    Search(SearchArgs),
    /// Show a single asset
    Show {
        identifier: String,
        /// Print the normalized record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List categories
    Categories,
    /// List directories (v1 API only)
    Directories,
    /// Add or remove the in-use tag depending on the usage count
    Tag {
        identifier: String,
        #[arg(long)]
        usage_count: usize,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Store a refresh token, prompting for it when no value is given
    Set {
        account: String,
        value: Option<String>,
    },
    /// Remove the refresh token of an account
    Rm { account: String },
    /// List accounts with a stored refresh token
    Ls,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Full text search term
    term: Option<String>,
    /// All, Image, Video, Audio or Document
    #[arg(long = "type", default_value = "All")]
    type_filter: AssetTypeFilter,
    #[arg(long, conflicts_with = "directory")]
    category: Option<String>,
    #[arg(long)]
    directory: Option<u64>,
    #[arg(long, default_value_t = 0)]
    offset: u32,
    #[arg(long, default_value_t = pixxio_core::query::DEFAULT_LIMIT)]
    limit: u32,
    /// Ordering as `<field>:<asc|desc>`, e.g. `filename:asc`
    #[arg(long)]
    sort: Option<String>,
    /// Only print the number of matches
    #[arg(long)]
    count: bool,
    /// Print normalized records as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let current_path = match env::current_dir() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: Failed to get current directory - {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Init = &cli.command {
        match pixxio_core::initialize_project(&current_path) {
            Ok(_) => println!("Successfully initialized pixx.io project in ./.pixxio"),
            Err(e) => {
                eprintln!("Error: Failed to initialize project - {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = pixxio_core::verify_project_initialized(&current_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, &current_path) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn secrets(base_path: &Path) -> ClientSecretRepository {
    let key = env::var("PIXXIO_SECRETS_KEY").unwrap_or_else(|_| DEFAULT_ENCRYPTION_KEY.to_string());
    ClientSecretRepository::new(project_dir(base_path).join(SECRETS_FILE), &key)
}

fn asset_source(cli: &Cli, base_path: &Path) -> anyhow::Result<PixxioAssetSource> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| project_dir(base_path).join(CONFIG_FILE));
    debug!("Loading asset source options from {}", config_path.display());
    let options = AssetSourceOptions::load(&config_path)
        .with_context(|| format!("Failed to load options from {}", config_path.display()))?;
    Ok(PixxioAssetSource::new(SOURCE_IDENTIFIER, options)?)
}

fn connect(cli: &Cli, base_path: &Path) -> anyhow::Result<(PixxioAssetSource, PixxioClient)> {
    let source = asset_source(cli, base_path)?;
    let client = source
        .connect(&cli.account, &secrets(base_path))
        .with_context(|| format!("Failed to connect to pixx.io as '{}'", cli.account))?;
    Ok((source, client))
}

fn run(cli: &Cli, base_path: &Path) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init => {}
        Commands::Token { action } => {
            let secrets = secrets(base_path);
            match action {
                TokenCommand::Set { account, value } => {
                    secrets
                        .set_refresh_token(account, value.clone())
                        .context("Failed to store refresh token")?;
                    println!("Refresh token for '{}' set successfully.", account);
                }
                TokenCommand::Rm { account } => {
                    secrets.remove(account).context("Failed to remove refresh token")?;
                    println!("Refresh token for '{}' removed.", account);
                }
                TokenCommand::Ls => {
                    let accounts = secrets.list_accounts().context("Failed to read secrets")?;
                    if accounts.is_empty() {
                        println!("No refresh tokens stored.");
                    } else {
                        for account in accounts {
                            println!("- {}", account);
                        }
                    }
                }
            }
        }
        Commands::Connect => {
            let (source, client) = connect(cli, base_path)?;
            println!(
                "{} Connected to {} ({}) as '{}'.",
                "✓".green(),
                source.label(),
                source.options().api_endpoint_uri(),
                cli.account
            );
            let categories = client.list_categories()?;
            println!("{} categories available.", categories.len());
        }
        Commands::Search(args) => {
            let (source, client) = connect(cli, base_path)?;
            let query = build_query(args)?;
            let cache = ProxyCache::new(MemoryStringCache::new());
            let repository = source.repository(&client, &cache);

            if args.count {
                println!("{}", repository.count(&query)?);
                return Ok(());
            }

            let result = repository.find(&query)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result.records)?);
            } else {
                for record in &result.records {
                    print_summary(record);
                }
                println!(
                    "{} of {} total matches shown.",
                    result.records.len(),
                    result.total_count
                );
            }
        }
        Commands::Show { identifier, json } => {
            let (source, client) = connect(cli, base_path)?;
            let cache = ProxyCache::new(MemoryStringCache::new());
            let record = source.repository(&client, &cache).get_asset_proxy(identifier)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_details(&record);
            }
        }
        Commands::Categories => {
            let (_, client) = connect(cli, base_path)?;
            for category in client.list_categories()? {
                println!("{}", display_entry(&category));
            }
        }
        Commands::Directories => {
            let (_, client) = connect(cli, base_path)?;
            for directory in client.list_directories()? {
                println!("{}", display_entry(&directory));
            }
        }
        Commands::Tag {
            identifier,
            usage_count,
        } => {
            let (source, client) = connect(cli, base_path)?;
            let cache = ProxyCache::new(MemoryStringCache::new());
            let record = source.repository(&client, &cache).get_asset_proxy(identifier)?;
            match source.auto_tagger(&client).register_usage(&record, *usage_count)? {
                TaggingOutcome::Disabled => println!("Auto tagging is disabled."),
                TaggingOutcome::Unchanged => println!("Keywords of {} are up to date.", identifier),
                TaggingOutcome::Updated(tags) => println!(
                    "Keywords of {} updated: {}",
                    identifier,
                    tags.to_keyword_string()
                ),
            }
        }
    }
    Ok(())
}

fn build_query(args: &SearchArgs) -> anyhow::Result<Query> {
    let collection = match (&args.category, args.directory) {
        (Some(category), _) => Some(CollectionFilter::Category(category.clone())),
        (None, Some(directory)) => Some(CollectionFilter::Directory(directory)),
        (None, None) => None,
    };
    let mut query = Query::new()
        .with_search_term(args.term.clone().unwrap_or_default())
        .with_type_filter(args.type_filter)
        .with_collection_filter(collection)
        .with_offset(args.offset)
        .with_limit(args.limit);
    if let Some(sort) = &args.sort {
        let (field, direction) = sort.split_once(':').unwrap_or((sort.as_str(), "asc"));
        let direction: SortDirection = direction.parse().map_err(|e: String| anyhow!(e))?;
        query = query.order_by(field, direction);
    }
    Ok(query)
}

fn print_summary(record: &AssetRecord) {
    println!(
        "{}  {}  {}  {}",
        record.identifier.yellow(),
        record.label.bold(),
        record.media_type.dimmed(),
        record.last_modified.format("%Y-%m-%d")
    );
}

fn print_details(record: &AssetRecord) {
    println!("{} {}", "Identifier:".bold(), record.identifier);
    println!("{} {}", "Label:".bold(), record.label);
    println!("{} {}", "Filename:".bold(), record.filename);
    println!("{} {}", "Last modified:".bold(), record.last_modified.to_rfc3339());
    println!("{} {} bytes", "Size:".bold(), record.file_size_bytes);
    println!(
        "{} {} (stored as {})",
        "Media type:".bold(),
        record.media_type,
        record.remote_media_type
    );
    if let (Some(width), Some(height)) = (record.width_px, record.height_px) {
        println!("{} {}x{}", "Dimensions:".bold(), width, height);
    }
    println!("{} {}", "Tags:".bold(), record.tags.as_slice().join(", "));
    for property in ["Title", "CaptionAbstract", "CopyrightNotice"] {
        let value = record.iptc_property(property);
        if !value.is_empty() {
            println!("{} {}", format!("{}:", property).bold(), value);
        }
    }
    let derivatives = [
        ("Thumbnail", &record.derivatives.thumbnail),
        ("Preview", &record.derivatives.preview),
        ("Original", &record.derivatives.original),
    ];
    for (name, uri) in derivatives {
        if let Some(uri) = uri {
            println!("{} {}", format!("{}:", name).bold(), uri);
        }
    }
}

/// `id  name` for category and directory listings.
fn display_entry(entry: &serde_json::Value) -> String {
    let id = match &entry["id"] {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let name = ["name", "path", "title"]
        .iter()
        .find_map(|key| entry[*key].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| match entry {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    if id.is_empty() {
        name
    } else {
        format!("{}  {}", id, name)
    }
}

//! DCAT Catalog CLI
//!
//! Command-line tool for loading vocabularies, importing `data.json` exports
//! and publishing catalogs as JSON-LD.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dcat_catalog::{
    fetch_from_file, import_catalog, import_licences, import_media_types, to_document,
    to_graph_document, to_json_string, CatalogError, Config, FetchOptions, ImportOptions, Store,
    VocabularyReport,
};

#[derive(Parser)]
#[command(name = "dcat-catalog")]
#[command(about = "Import DCAT catalogs and publish them as JSON-LD")]
#[command(version)]
struct Cli {
    /// TOML configuration file (default: built-in settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a data.json export and its downloaded files
    Import(ImportArgs),
    /// Import the EU file types vocabulary
    ImportFiletypes(VocabularyArgs),
    /// Import the EU licences vocabulary
    ImportLicences(VocabularyArgs),
    /// Write catalogs as JSON-LD
    Export(ExportArgs),
    /// Download the files of every distribution in a data.json export
    Fetch(FetchArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Export document (default: data.json)
    #[arg(long)]
    document: Option<PathBuf>,

    /// Folder holding <dataset>/<distribution>/<file> (default: data/)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Folder attached files are copied into (default: media/)
    #[arg(long)]
    media_root: Option<PathBuf>,
}

#[derive(Args)]
struct VocabularyArgs {
    /// Vocabulary XML file
    file: Option<PathBuf>,
}

#[derive(Args)]
struct ExportArgs {
    /// Catalog to export (default: all catalogs)
    #[arg(long)]
    catalog: Option<i64>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct FetchArgs {
    /// Export document (default: data.json)
    #[arg(long)]
    document: Option<PathBuf>,

    /// Download folder (default: data/)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Number of parallel download workers
    #[arg(long)]
    workers: Option<usize>,
}

fn open_store(config: &Config, database: Option<PathBuf>) -> Result<Store, CatalogError> {
    Store::open(database.unwrap_or_else(|| config.database.path.clone()))
}

/// Write output to file or stdout
fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), CatalogError> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("Wrote catalog to {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn print_vocabulary_summary(what: &str, report: &VocabularyReport) {
    eprintln!(
        "Imported {} {} ({} already present, {} deprecated, {} skipped as malformed)",
        report.created,
        what,
        report.existing,
        report.skipped_deprecated,
        report.issues.len()
    );
}

fn run_import(config: &Config, store: &Store, args: ImportArgs) -> Result<(), CatalogError> {
    let options = ImportOptions {
        document: args.document.unwrap_or_else(|| config.import.document.clone()),
        data_root: args.data_root.unwrap_or_else(|| config.import.data_root.clone()),
        media_root: args.media_root.unwrap_or_else(|| config.media.root.clone()),
    };
    let report = import_catalog(store, &options)?;

    eprintln!(
        "Imported catalog {}: {} datasets, {} distributions, {} files ({} warnings, {} errors)",
        report.catalog_id,
        report.datasets,
        report.distributions,
        report.files_attached,
        report.issues.warnings(),
        report.issues.errors()
    );
    Ok(())
}

fn run_import_filetypes(
    config: &Config,
    store: &Store,
    args: VocabularyArgs,
) -> Result<(), CatalogError> {
    let path = args.file.unwrap_or_else(|| config.vocabulary.filetypes.clone());
    if !path.is_file() {
        eprintln!(
            "{} does not exist. Download it from {}",
            path.display(),
            dcat_catalog::vocabulary::media_types::SOURCE_URL
        );
    }
    let report = import_media_types(store, &path)?;
    print_vocabulary_summary("file types", &report);
    Ok(())
}

fn run_import_licences(
    config: &Config,
    store: &Store,
    args: VocabularyArgs,
) -> Result<(), CatalogError> {
    let path = args.file.unwrap_or_else(|| config.vocabulary.licences.clone());
    if !path.is_file() {
        eprintln!(
            "{} does not exist. Download it from {}",
            path.display(),
            dcat_catalog::vocabulary::licences::SOURCE_URL
        );
    }
    let report = import_licences(store, &path)?;
    print_vocabulary_summary("licences", &report);
    Ok(())
}

fn run_export(config: &Config, store: &Store, args: ExportArgs) -> Result<(), CatalogError> {
    let urls = config.site_urls()?;

    let ids = match args.catalog {
        Some(id) => vec![id],
        None => store.catalog_ids()?,
    };
    let graphs = ids
        .into_iter()
        .map(|id| store.load_catalog_graph(id))
        .collect::<Result<Vec<_>, _>>()?;

    // A single catalog is the document itself, several go under @graph
    let doc = match graphs.as_slice() {
        [graph] => to_document(graph, &urls),
        graphs => to_graph_document(graphs, &urls),
    };

    let output = to_json_string(&doc, args.pretty)?;
    write_output(&output, args.output.as_ref())
}

fn run_fetch(config: &Config, args: FetchArgs) -> Result<(), CatalogError> {
    let document = args.document.unwrap_or_else(|| config.import.document.clone());
    let options = FetchOptions {
        data_root: args.data_root.unwrap_or_else(|| config.import.data_root.clone()),
        workers: args.workers.unwrap_or(config.fetch.workers),
        connect_timeout: config.fetch.connect_timeout(),
        tries: config.fetch.tries,
    };
    let report = fetch_from_file(&document, &options)?;

    eprintln!(
        "Downloaded {} files for {} datasets ({} already present, {} failed)",
        report.downloaded,
        report.datasets,
        report.already_present,
        report.failures.len()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<(), CatalogError> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    // Fetching works on the export alone and never opens the database
    match cli.command {
        Commands::Fetch(args) => run_fetch(&config, args),
        Commands::Import(args) => run_import(&config, &open_store(&config, cli.database)?, args),
        Commands::ImportFiletypes(args) => {
            run_import_filetypes(&config, &open_store(&config, cli.database)?, args)
        }
        Commands::ImportLicences(args) => {
            run_import_licences(&config, &open_store(&config, cli.database)?, args)
        }
        Commands::Export(args) => run_export(&config, &open_store(&config, cli.database)?, args),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

//! `graphit` command line front end

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::{Args, Parser, Subcommand};
use graphit_core::{PlotKind, Prefix, Table};
use graphit_data::{codec, format, DataConfig, Session, SourceKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphit")]
#[command(
    about = "Import data sources into a columnar cache and configure plots",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store root directory (overrides GRAPHIT_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store layout
    Init,

    /// Register a source file
    Add(AddArgs),

    /// Forget a source and delete its cached data
    Remove { name: String },

    /// Point a source at a new origin file
    Reassociate { name: String, origin: PathBuf },

    /// Refresh every source into the cache
    Update,

    /// List generators and registered sources
    Sources,

    /// List cached artifacts
    Artifacts,

    /// Print a cached artifact
    Show {
        name: String,

        /// Rows to print
        #[arg(long, default_value_t = 20)]
        rows: usize,
    },

    /// Outer join two flat artifacts into modified_data
    Merge {
        left: String,
        right: String,

        /// Column to join on
        #[arg(long)]
        on: String,
    },

    /// Reshape a flat artifact and save the result
    Format(FormatArgs),

    /// Manage plot maps
    #[command(subcommand)]
    Plot(PlotCommand),
}

#[derive(Args)]
struct AddArgs {
    path: PathBuf,

    /// Classify as an isometric surface
    #[arg(long, conflicts_with = "iso_tri")]
    iso: bool,

    /// Classify as a triangulated isometric surface
    #[arg(long)]
    iso_tri: bool,
}

impl AddArgs {
    fn prefix(&self) -> Prefix {
        match (self.iso, self.iso_tri) {
            (_, true) => Prefix::IsometricTriangulated,
            (true, false) => Prefix::Isometric,
            (false, false) => Prefix::None,
        }
    }
}

#[derive(Args)]
struct FormatArgs {
    name: String,

    /// Artifact to write; defaults to overwriting the input
    #[arg(long)]
    save: Option<String>,

    /// Keep only the first N rows
    #[arg(long)]
    limit: Option<usize>,

    /// Apply the limit to this column only
    #[arg(long, requires = "limit")]
    column: Option<String>,

    /// Sort by this column
    #[arg(long)]
    sort: Option<String>,

    #[arg(long, conflicts_with = "remove_index")]
    add_index: bool,

    #[arg(long)]
    remove_index: bool,
}

#[derive(Subcommand)]
enum PlotCommand {
    /// List plot maps
    List,

    /// Create an empty plot map
    New,

    /// Delete a plot map
    Delete { id: String },

    /// Bind data and coordinates to a plot map
    Bind {
        id: String,

        /// Cached artifact to snapshot
        #[arg(long)]
        data: String,

        /// Plot type, e.g. "Standard Plot"
        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        x: Option<String>,
        #[arg(long)]
        y: Option<String>,
        #[arg(long)]
        z: Option<String>,

        #[arg(long)]
        title: Option<String>,
    },

    /// Plot types available for an artifact name
    Kinds { data: String },

    /// Validate a plot map and print the series it would draw
    Render { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.root {
        Some(root) => DataConfig::load(root),
        None => DataConfig::from_env(),
    }
    .context("Failed to load store configuration")?;

    let session = Session::open(config).context("Failed to open data store")?;
    let outcome = run(&session, cli.command).await;

    session.settle().await;
    session.shutdown();
    outcome
}

async fn run(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            info!("Store ready at {}", session.paths().root.display());
        }
        Commands::Add(args) => {
            let name = session
                .add_source(&args.path, args.prefix())
                .with_context(|| format!("Failed to add {}", args.path.display()))?;
            println!("{}", name);
        }
        Commands::Remove { name } => {
            if !session.remove_source(&name)? {
                println!("{} was not registered", name);
            }
        }
        Commands::Reassociate { name, origin } => {
            session
                .reassociate(&name, &origin)
                .with_context(|| format!("Failed to reassociate {}", name))?;
        }
        Commands::Update => {
            let mut handle = session.start_update()?;
            while let Some(event) = handle.next_event().await {
                println!("{}", event);
            }
            let report = handle.finish().await?;
            info!(
                "{} refreshed, {} invalid, {} failed",
                report.refreshed.len(),
                report.invalid.len(),
                report.failed.len()
            );
        }
        Commands::Sources => {
            for (name, kind) in session.sources()? {
                match kind {
                    SourceKind::Internal(_) => println!("{}\tinternal", name),
                    SourceKind::External { origin_path, encoding } => println!(
                        "{}\t{}\t{}",
                        name,
                        origin_path.display(),
                        encoding.as_deref().unwrap_or("-")
                    ),
                }
            }
        }
        Commands::Artifacts => {
            for name in session.catalog().list()?.into_iter().filter(|n| !n.is_empty()) {
                println!("{}", name);
            }
        }
        Commands::Show { name, rows } => {
            let table = session.catalog().load(&name)?;
            print_table(&table, rows)?;
        }
        Commands::Merge { left, right, on } => {
            let catalog = session.catalog();
            let merged = catalog
                .merge(&catalog.load(&left)?, &catalog.load(&right)?, &on)
                .with_context(|| format!("{} and {} cannot be merged on '{}'", left, right, on))?;
            print_table(&merged, 20)?;
        }
        Commands::Format(args) => {
            let mut table = session.catalog().load(&args.name)?;
            if let Some(column) = &args.sort {
                table = format::sort_by(&table, column)?;
            }
            if let Some(n) = args.limit {
                table = format::limit(&table, args.column.as_deref(), n)?;
            }
            if args.add_index {
                table = format::add_index(&table)?;
            }
            if args.remove_index {
                table = format::remove_index(&table)?;
            }
            let target = args.save.unwrap_or(args.name);
            session.catalog().save(&target, &table)?;
            println!("{}", target);
        }
        Commands::Plot(command) => run_plot(session, command)?,
    }
    Ok(())
}

fn run_plot(session: &Session, command: PlotCommand) -> Result<()> {
    let plots = session.plots();
    match command {
        PlotCommand::List => {
            for map in plots.load_all()? {
                println!("{}\t{}\t{}\t{}", map.id, map.title, map.graph_name, map.data_name);
            }
        }
        PlotCommand::New => {
            let map = plots.create()?;
            plots.save(&map)?;
            println!("{}", map.id);
        }
        PlotCommand::Delete { id } => {
            if !plots.delete(&id)? {
                println!("No plot map {}", id);
            }
        }
        PlotCommand::Bind {
            id,
            data,
            kind,
            x,
            y,
            z,
            title,
        } => {
            let mut map = plots.load(&id)?;
            let table = session.catalog().load(&data)?;
            map.set_data(&data, table);
            if let Some(kind) = kind {
                let kind: PlotKind = kind.parse()?;
                if !PlotKind::available_for(&data).contains(&kind) {
                    bail!("{} does not apply to {}", kind, data);
                }
                map.graph_name = kind.name().to_string();
            }
            let coords = [
                (&mut map.x_coord, x),
                (&mut map.y_coord, y),
                (&mut map.z_coord, z),
            ];
            for (coord, value) in coords {
                if let Some(value) = value {
                    *coord = value;
                }
            }
            if let Some(title) = title {
                map.title = title;
            }
            plots.save(&map)?;
        }
        PlotCommand::Kinds { data } => {
            for kind in PlotKind::available_for(&data) {
                println!("{}", kind);
            }
        }
        PlotCommand::Render { id } => {
            let map = plots.load(&id)?;
            let command = map.render()?;
            println!("{}: {}", command.kind, command.title);
            for (axis, series) in [("x", &command.x), ("y", &command.y), ("z", &command.z)] {
                if let Some(series) = series {
                    println!(
                        "  {} = {} {} ({} values)",
                        axis,
                        series.column,
                        series.shape,
                        series.values.len()
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_table(table: &Table, rows: usize) -> Result<()> {
    if !table.is_flat() {
        for (name, data) in table.columns() {
            println!("{}: {} {}", name, data.scalar_type(), data.shape());
        }
    }
    let batch = codec::record_batch(table)?;
    let shown = batch.slice(0, rows.min(batch.num_rows()));
    println!("{}", pretty_format_batches(&[shown])?);
    Ok(())
}

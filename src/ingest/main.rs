//! Flat-file region loader.
//!
//! Reads delimited files of named region geometries and commits each file as
//! one all-or-nothing batch into the region store.

mod batch;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hoodmap::geometry::GeometryFormat;
use hoodmap::{RegionStore, SledRegionStore};

use crate::batch::run_batch;
use crate::config::{Config, SourceConfig};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Load named region geometries into the region store")]
struct Args {
    /// TOML file listing sources to load
    #[arg(short, long, conflicts_with = "file")]
    config: Option<PathBuf>,

    /// Region store directory (overrides the config's db_path)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Single flat file to load
    #[arg(short, long, requires_all = ["city", "state"])]
    file: Option<PathBuf>,

    /// Name recorded for the single file (defaults to its file name)
    #[arg(long)]
    name: Option<String>,

    /// City applied to every row of the single file
    #[arg(long)]
    city: Option<String>,

    /// State applied to every row of the single file
    #[arg(long)]
    state: Option<String>,

    /// Zero-based column holding the region name
    #[arg(long, default_value = "0")]
    name_column: usize,

    /// Zero-based column holding the geometry
    #[arg(long, default_value = "1")]
    geometry_column: usize,

    /// Geometry encoding of the single file
    #[arg(long, value_enum, default_value_t = GeometryFormat::Wkt)]
    format: GeometryFormat,

    /// Skip the first row of the single file
    #[arg(long)]
    skip_header: bool,

    /// Title-case region names from the single file
    #[arg(long)]
    title_case: bool,

    /// Field delimiter of the single file
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Print the sources already recorded in the store and exit
    #[arg(long)]
    list: bool,

    /// Hide progress spinners
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Hoodmap Ingest");

    let config = args
        .config
        .as_ref()
        .map(Config::load_from_file)
        .transpose()?;

    let db_path = match (&args.db, &config) {
        (Some(db), _) => db.clone(),
        (None, Some(config)) => config.global.db_path.clone(),
        (None, None) => anyhow::bail!("Either --db or --config is required"),
    };

    info!("Opening region store at {}", db_path.display());
    let store = SledRegionStore::open(&db_path)
        .with_context(|| format!("Failed to open region store at {}", db_path.display()))?;
    info!("Region store holds {} regions", store.len()?);

    if args.list {
        for stamp in store.sources()? {
            println!(
                "{}\t{} regions\t{:016x}\t{}\t{}",
                stamp.name,
                stamp.regions,
                stamp.checksum,
                stamp.batch_id,
                stamp.ingested_at.to_rfc3339()
            );
        }
        return Ok(());
    }

    let sources = match (config, single_source(&args)?) {
        (Some(config), None) => config.sources,
        (None, Some(source)) => vec![source],
        _ => anyhow::bail!("Nothing to load: pass --config or --file"),
    };

    run_batch(&store, &sources, !args.quiet)
}

fn single_source(args: &Args) -> Result<Option<SourceConfig>> {
    let Some(path) = &args.file else {
        return Ok(None);
    };

    let name = match &args.name {
        Some(name) => name.clone(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Cannot derive a source name from {}", path.display()))?,
    };

    Ok(Some(SourceConfig {
        name,
        path: path.clone(),
        city: args.city.clone().unwrap_or_default(),
        state: args.state.clone().unwrap_or_default(),
        name_column: args.name_column,
        geometry_column: args.geometry_column,
        format: args.format,
        skip_header: args.skip_header,
        title_case: args.title_case,
        delimiter: args.delimiter,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_source_from_flags() {
        let args = Args::parse_from([
            "ingest",
            "--db",
            "/tmp/regions",
            "--file",
            "flat-files/chicago-illinois.csv",
            "--city",
            "Chicago",
            "--state",
            "IL",
            "--format",
            "geojson",
            "--skip-header",
        ]);
        let source = single_source(&args).unwrap().unwrap();
        assert_eq!(source.name, "chicago-illinois.csv");
        assert_eq!(source.format, GeometryFormat::GeoJson);
        assert_eq!(source.geometry_column, 1);
        assert!(source.skip_header);
        assert!(source.job().is_ok());
    }

    #[test]
    fn test_file_requires_city_and_state() {
        assert!(Args::try_parse_from(["ingest", "--file", "x.csv", "--city", "Chicago"]).is_err());
    }
}

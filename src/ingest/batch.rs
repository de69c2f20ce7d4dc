use crate::config::SourceConfig;
use anyhow::{Context, Result};
use hoodmap::pipeline::{checksum_path, ingest_source, IngestReport};
use hoodmap::SledRegionStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

/// What happened to one source in a batch.
#[derive(Debug)]
pub enum SourceOutcome {
    Ingested(IngestReport),
    /// Same checksum as the recorded run
    UpToDate,
    /// Recorded under this name with different content. There is no
    /// replace path, so the source is left alone.
    Changed { recorded: u64, current: u64 },
}

/// Load each source in order. A failing source aborts only its own run; the
/// batch continues and reports the failures at the end.
pub fn run_batch(store: &SledRegionStore, sources: &[SourceConfig], progress: bool) -> Result<()> {
    info!("Starting batch import for {} sources", sources.len());

    let mut failed = Vec::new();
    let mut created = 0usize;

    for source in sources {
        match run_source(store, source, progress) {
            Ok(SourceOutcome::Ingested(report)) => {
                info!(
                    "Source {} complete: {} regions (batch {}, checksum {:016x})",
                    report.source, report.regions, report.batch_id, report.checksum
                );
                created += report.regions;
            }
            Ok(SourceOutcome::UpToDate) => {
                info!("Source {} is up to date (hash match). Skipping.", source.name);
            }
            Ok(SourceOutcome::Changed { recorded, current }) => {
                warn!(
                    "Source {} changed since it was loaded ({:016x} -> {:016x}); regions cannot be replaced, skipping",
                    source.name, recorded, current
                );
            }
            Err(e) => {
                error!("Ingest failed for {}: {:?}", source.name, e);
                failed.push(source.name.clone());
            }
        }
    }

    info!(
        "Batch finished: {} regions created, {} regions in store",
        created,
        store.snapshot().len()
    );

    if !failed.is_empty() {
        anyhow::bail!("{} source(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn run_source(store: &SledRegionStore, source: &SourceConfig, progress: bool) -> Result<SourceOutcome> {
    info!("Processing source: {}", source.name);

    if let Some(stamp) = store.source_stamp(&source.name)? {
        let current = checksum_path(&source.path)
            .with_context(|| format!("Failed to read {}", source.path.display()))?;
        if current == stamp.checksum {
            return Ok(SourceOutcome::UpToDate);
        }
        return Ok(SourceOutcome::Changed {
            recorded: stamp.checksum,
            current,
        });
    }

    let mut job = source.job()?;
    let pb = if progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg} {pos} records ({per_sec})")?,
        );
        pb.set_message(source.name.clone());
        job = job.with_progress(pb.clone());
        Some(pb)
    } else {
        None
    };

    let result = ingest_source(store, &source.name, &source.path, &job);

    if let Some(pb) = pb {
        match &result {
            Ok(_) => pb.finish_with_message(format!("{} done", source.name)),
            Err(_) => pb.abandon_with_message(format!("{} failed", source.name)),
        }
    }

    Ok(SourceOutcome::Ingested(result.with_context(|| {
        format!("Source '{}' ({})", source.name, source.path.display())
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoodmap::geometry::GeometryFormat;
    use hoodmap::RegionStore;
    use std::path::Path;

    fn source(name: &str, path: &Path) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            path: path.to_path_buf(),
            city: "East Baton Rouge".to_string(),
            state: "LA".to_string(),
            name_column: 0,
            geometry_column: 1,
            format: GeometryFormat::Wkt,
            skip_header: true,
            title_case: true,
            delimiter: ',',
        }
    }

    const BODY: &str = "name,geom\nmid city,\"MULTIPOLYGON(((0 0,0 1,1 1,1 0,0 0)))\"\n";

    #[test]
    fn test_second_run_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ebr.csv");
        std::fs::write(&path, BODY).unwrap();
        let store = SledRegionStore::open(dir.path().join("db")).unwrap();
        let src = source("ebr", &path);

        let first = run_source(&store, &src, false).unwrap();
        assert!(matches!(first, SourceOutcome::Ingested(ref r) if r.regions == 1));
        assert!(matches!(
            run_source(&store, &src, false).unwrap(),
            SourceOutcome::UpToDate
        ));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.all().unwrap()[0].name(), "Mid City");
    }

    #[test]
    fn test_changed_source_is_not_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ebr.csv");
        std::fs::write(&path, BODY).unwrap();
        let store = SledRegionStore::open(dir.path().join("db")).unwrap();
        let src = source("ebr", &path);
        run_source(&store, &src, false).unwrap();

        std::fs::write(&path, format!("{}garden district,\"MULTIPOLYGON(((2 2,2 3,3 3,3 2,2 2)))\"\n", BODY)).unwrap();
        assert!(matches!(
            run_source(&store, &src, false).unwrap(),
            SourceOutcome::Changed { .. }
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_batch_reports_failures_but_loads_others() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.csv");
        std::fs::write(&good, BODY).unwrap();
        let store = SledRegionStore::open(dir.path().join("db")).unwrap();

        let sources = vec![
            source("missing", &dir.path().join("missing.csv")),
            source("good", &good),
        ];
        assert!(run_batch(&store, &sources, false).is_err());
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.source_stamp("missing").unwrap().is_none());
    }
}

//! Flat-file ingestion.
//!
//! A run reads every record of one source, decodes each geometry, and only
//! then hands the whole batch to the store. A bad record anywhere aborts the
//! run before anything is written.

mod source;

use chrono::Utc;
use csv::{ReaderBuilder, StringRecord};
use indicatif::ProgressBar;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{IngestError, RegionError};
use crate::geometry::{GeometryFormat, GeometryParser};
use crate::models::NewRegion;
use crate::store::{RegionStore, SledRegionStore, SourceStamp};

pub use source::{checksum_path, open_source, ChecksumReader};

/// Zero-based column positions of the fields a source provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub geometry: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Discard the first record unconditionally
    pub skip_header_row: bool,
    /// Normalize names with [`title_case`]
    pub title_case: bool,
    pub delimiter: u8,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            skip_header_row: false,
            title_case: false,
            delimiter: b',',
        }
    }
}

/// Everything needed to turn one source into regions.
pub struct IngestJob {
    columns: ColumnMap,
    city: String,
    state: String,
    options: IngestOptions,
    parser: Box<dyn GeometryParser>,
    progress: Option<ProgressBar>,
}

impl IngestJob {
    pub fn new(
        columns: ColumnMap,
        city: impl Into<String>,
        state: impl Into<String>,
        format: GeometryFormat,
        options: IngestOptions,
    ) -> Result<Self, RegionError> {
        Self::with_parser(columns, city, state, format.parser(), options)
    }

    /// Build a job around any parser implementation.
    pub fn with_parser(
        columns: ColumnMap,
        city: impl Into<String>,
        state: impl Into<String>,
        parser: Box<dyn GeometryParser>,
        options: IngestOptions,
    ) -> Result<Self, RegionError> {
        let city = city.into();
        let state = state.into();
        if city.trim().is_empty() {
            return Err(RegionError::EmptyField { field: "city" });
        }
        if state.trim().is_empty() {
            return Err(RegionError::EmptyField { field: "state" });
        }

        Ok(Self {
            columns,
            city,
            state,
            options,
            parser,
            progress: None,
        })
    }

    /// Tick the bar once per record read.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn format(&self) -> GeometryFormat {
        self.parser.format()
    }
}

/// Summary of a committed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub regions: usize,
    pub batch_id: Uuid,
    pub checksum: u64,
}

/// Decode every record of a source into regions without storing anything.
pub fn read_regions<R: Read>(source: R, job: &IngestJob) -> Result<Vec<NewRegion>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(job.options.delimiter)
        .from_reader(source);

    let mut record = StringRecord::new();
    let mut number: u64 = 0;

    if job.options.skip_header_row && reader.read_record(&mut record)? {
        number += 1;
        debug!("Skipped header row: {:?}", record);
    }

    let mut regions = Vec::new();
    while reader.read_record(&mut record)? {
        number += 1;
        if let Some(pb) = &job.progress {
            pb.inc(1);
        }

        let name = field(&record, job.columns.name, number, "name")?;
        let raw = field(&record, job.columns.geometry, number, "geometry")?;

        let name = if job.options.title_case {
            title_case(name)
        } else {
            name.to_string()
        };

        let geometry = job
            .parser
            .parse(raw)
            .map_err(|source| IngestError::GeometryParse {
                record: number,
                source,
            })?;

        debug!(
            "Record {}: {} ({} polygons)",
            number,
            name,
            geometry.0.len()
        );
        regions.push(NewRegion::new(name, &job.city, &job.state, geometry)?);
    }

    Ok(regions)
}

/// Read a whole source and commit its regions as one batch.
///
/// Returns the number of regions created.
pub fn ingest<R, S>(store: &S, source: R, job: &IngestJob) -> Result<usize, IngestError>
where
    R: Read,
    S: RegionStore + ?Sized,
{
    let regions = read_regions(source, job)?;
    let count = regions.len();
    store.insert_batch(regions)?;
    info!("Ingested {} regions for {}, {}", count, job.city, job.state);
    Ok(count)
}

/// [`ingest`] from a file path.
pub fn ingest_path<S>(store: &S, path: &Path, job: &IngestJob) -> Result<usize, IngestError>
where
    S: RegionStore + ?Sized,
{
    ingest(store, open_source(path)?, job)
}

/// Ingest a named source into the durable store, recording its stamp in the
/// same transaction as its regions.
pub fn ingest_source(
    store: &SledRegionStore,
    name: &str,
    path: &Path,
    job: &IngestJob,
) -> Result<IngestReport, IngestError> {
    let batch_id = Uuid::new_v4();
    info!("Ingesting source {} from {} (batch {})", name, path.display(), batch_id);

    let mut reader = ChecksumReader::new(open_source(path)?);
    let regions = read_regions(&mut reader, job)?;
    let checksum = reader.checksum();

    let stamp = SourceStamp {
        name: name.to_string(),
        checksum,
        regions: regions.len(),
        batch_id,
        ingested_at: Utc::now(),
    };
    store.commit_source(regions, Some(&stamp))?;

    info!("Committed {} regions from {}", stamp.regions, name);
    Ok(IngestReport {
        source: stamp.name,
        regions: stamp.regions,
        batch_id,
        checksum,
    })
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    number: u64,
    column: &'static str,
) -> Result<&'r str, IngestError> {
    match record.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(IngestError::RecordIncomplete {
            record: number,
            column,
            index,
        }),
    }
}

/// Upper-case the first letter of each word and lower-case the rest.
///
/// Words are broken by anything that is not a letter, digit, or apostrophe,
/// so `"west-ridge"` becomes `"West-Ridge"` and `"o'hare"` becomes `"O'hare"`.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;

    for c in value.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = !matches!(c, '\'' | '\u{2019}');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;
    use crate::store::MemoryRegionStore;

    const SQUARE: &str = "\"MULTIPOLYGON(((0 0,0 10,10 10,10 0,0 0)))\"";

    fn job(options: IngestOptions) -> IngestJob {
        IngestJob::new(
            ColumnMap {
                name: 0,
                geometry: 1,
            },
            "Chicago",
            "IL",
            GeometryFormat::Wkt,
            options,
        )
        .unwrap()
    }

    fn square_at(offset: u32) -> String {
        let (a, b) = (offset, offset + 1);
        format!(
            "\"MULTIPOLYGON((({a} {a},{a} {b},{b} {b},{b} {a},{a} {a})))\"",
            a = a,
            b = b
        )
    }

    fn pt(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("uptown"), "Uptown");
        assert_eq!(title_case("WEST TOWN"), "West Town");
        assert_eq!(title_case("west-ridge"), "West-Ridge");
        assert_eq!(title_case("o'hare"), "O'hare");
        assert_eq!(title_case("édgewater  beach"), "Édgewater  Beach");
    }

    #[test]
    fn test_downtown_scenario() {
        let store = MemoryRegionStore::new();
        let csv = format!("Downtown,{}\n", SQUARE);
        let count = ingest(&store, csv.as_bytes(), &job(IngestOptions::default())).unwrap();
        assert_eq!(count, 1);

        let hit = store.find_containing(pt(5.0, 5.0)).unwrap().unwrap();
        assert_eq!(hit.name(), "Downtown");
        assert_eq!(hit.city(), "Chicago");
        assert_eq!(hit.state(), "IL");
        assert!(store.find_containing(pt(20.0, 20.0)).unwrap().is_none());
    }

    #[test]
    fn test_skip_header_and_title_case() {
        let store = MemoryRegionStore::new();
        let csv = format!(
            "community,the_geom\nuptown,{}\nlincoln park,{}\nLOOP,{}\n",
            square_at(0),
            square_at(2),
            square_at(4)
        );
        let options = IngestOptions {
            skip_header_row: true,
            title_case: true,
            ..IngestOptions::default()
        };
        let count = ingest(&store, csv.as_bytes(), &job(options)).unwrap();
        assert_eq!(count, 3);

        let names: Vec<String> = store
            .all()
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["Uptown", "Lincoln Park", "Loop"]);
    }

    #[test]
    fn test_header_kept_when_not_skipped() {
        let csv = format!("community,the_geom\nuptown,{}\n", square_at(0));
        let err = read_regions(csv.as_bytes(), &job(IngestOptions::default())).unwrap_err();
        assert!(matches!(err, IngestError::GeometryParse { record: 1, .. }));
    }

    #[test]
    fn test_malformed_record_commits_nothing() {
        let store = MemoryRegionStore::new();
        let mut csv = String::new();
        for i in 0..10u32 {
            if i == 2 {
                csv.push_str("Broken,\"MULTIPOLYGON(((0 0,0 1,1 1\"\n");
            } else {
                csv.push_str(&format!("Area {},{}\n", i, square_at(i * 2)));
            }
        }

        let err = ingest(&store, csv.as_bytes(), &job(IngestOptions::default())).unwrap_err();
        assert!(matches!(err, IngestError::GeometryParse { record: 3, .. }));
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.find_containing(pt(0.5, 0.5)).unwrap().is_none());
    }

    #[test]
    fn test_non_ascii_geometry_is_a_parse_error() {
        let store = MemoryRegionStore::new();
        let csv = "Loop,MULTÉPOLYGON(((0 0,0 1,1 1,1 0,0 0)))\n";
        let err = ingest(&store, csv.as_bytes(), &job(IngestOptions::default())).unwrap_err();
        assert!(matches!(err, IngestError::GeometryParse { record: 1, .. }));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_missing_and_blank_columns() {
        let short = "Uptown\n";
        let err = read_regions(short.as_bytes(), &job(IngestOptions::default())).unwrap_err();
        assert!(matches!(
            err,
            IngestError::RecordIncomplete {
                record: 1,
                column: "geometry",
                index: 1
            }
        ));

        let blank = format!("  ,{}\n", SQUARE);
        let err = read_regions(blank.as_bytes(), &job(IngestOptions::default())).unwrap_err();
        assert!(matches!(
            err,
            IngestError::RecordIncomplete { column: "name", .. }
        ));
    }

    #[test]
    fn test_custom_columns_delimiter_and_geojson() {
        let csv = "1;{\"type\":\"Polygon\",\"coordinates\":[[[0,0],[0,3],[3,3],[3,0],[0,0]]]};Hamden\n";
        let job = IngestJob::new(
            ColumnMap {
                name: 2,
                geometry: 1,
            },
            "Baltimore",
            "MD",
            GeometryFormat::GeoJson,
            IngestOptions {
                delimiter: b';',
                ..IngestOptions::default()
            },
        )
        .unwrap();

        let store = MemoryRegionStore::new();
        assert_eq!(ingest(&store, csv.as_bytes(), &job).unwrap(), 1);
        assert_eq!(
            store.find_containing(pt(1.0, 1.0)).unwrap().unwrap().name(),
            "Hamden"
        );
    }

    #[test]
    fn test_job_rejects_blank_city() {
        let result = IngestJob::new(
            ColumnMap {
                name: 0,
                geometry: 1,
            },
            " ",
            "IL",
            GeometryFormat::Wkt,
            IngestOptions::default(),
        );
        assert!(matches!(
            result,
            Err(RegionError::EmptyField { field: "city" })
        ));
    }

    #[test]
    fn test_ingest_path_missing_source() {
        let store = MemoryRegionStore::new();
        let err = ingest_path(
            &store,
            Path::new("/no/such/source.csv"),
            &job(IngestOptions::default()),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::SourceNotFound { .. }));
    }

    #[test]
    fn test_ingest_source_records_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chicago-illinois.csv");
        let body = format!("name,geom\nuptown,{}\nloop,{}\n", square_at(0), square_at(2));
        std::fs::write(&path, &body).unwrap();

        let store = SledRegionStore::open(dir.path().join("db")).unwrap();
        let options = IngestOptions {
            skip_header_row: true,
            title_case: true,
            ..IngestOptions::default()
        };
        let report = ingest_source(&store, "chicago-illinois", &path, &job(options)).unwrap();

        assert_eq!(report.regions, 2);
        assert_eq!(report.checksum, checksum_path(&path).unwrap());

        let stamp = store.source_stamp("chicago-illinois").unwrap().unwrap();
        assert_eq!(stamp.batch_id, report.batch_id);
        assert_eq!(stamp.regions, 2);
        assert_eq!(
            store.find_containing(pt(2.5, 2.5)).unwrap().unwrap().name(),
            "Loop"
        );
    }

    #[test]
    fn test_failed_source_leaves_durable_store_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        let body = format!("uptown,{}\nbroken,\"MULTIPOLYGON(((0 0)))\"\n", square_at(0));
        std::fs::write(&path, &body).unwrap();

        let db_path = dir.path().join("db");
        {
            let store = SledRegionStore::open(&db_path).unwrap();
            let err = ingest_source(&store, "bad", &path, &job(IngestOptions::default()))
                .unwrap_err();
            assert!(matches!(err, IngestError::GeometryParse { record: 2, .. }));
        }

        let store = SledRegionStore::reopen(&db_path);
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.source_stamp("bad").unwrap().is_none());
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use hoodmap::geometry::GeometryFormat;
use hoodmap::pipeline::{ColumnMap, IngestJob, IngestOptions};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalConfig {
    pub db_path: PathBuf,
}

/// One flat file and the constants that apply to all of its rows.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub name_column: usize,
    #[serde(default = "default_geometry_column")]
    pub geometry_column: usize,
    #[serde(default)]
    pub format: GeometryFormat,
    #[serde(default)]
    pub skip_header: bool,
    #[serde(default)]
    pub title_case: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_geometry_column() -> usize {
    1
}

fn default_delimiter() -> char {
    ','
}

impl Config {
    /// Load a config file. Relative paths inside it are taken relative to
    /// the file's own directory.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let mut config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.global.db_path = base.join(&config.global.db_path);
        for source in &mut config.sources {
            source.path = base.join(&source.path);
        }
        Ok(config)
    }
}

impl SourceConfig {
    pub fn job(&self) -> Result<IngestJob> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| format!("Delimiter {:?} is not a single ASCII byte", self.delimiter))?;

        let job = IngestJob::new(
            ColumnMap {
                name: self.name_column,
                geometry: self.geometry_column,
            },
            &self.city,
            &self.state,
            self.format,
            IngestOptions {
                skip_header_row: self.skip_header,
                title_case: self.title_case,
                delimiter,
            },
        )
        .with_context(|| format!("Invalid source '{}'", self.name))?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.toml");
        fs::write(
            &path,
            r#"
[global]
db_path = "data/regions.db"

[[sources]]
name = "chicago-illinois"
path = "flat-files/chicago-illinois.csv"
city = "Chicago"
state = "IL"
skip_header = true

[[sources]]
name = "baltimore-maryland"
path = "/srv/flat-files/baltimore.csv.gz"
city = "Baltimore"
state = "MD"
name_column = 2
geometry_column = 0
format = "geojson"
title_case = true
delimiter = ";"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.global.db_path, dir.path().join("data/regions.db"));

        let chicago = &config.sources[0];
        assert_eq!(chicago.path, dir.path().join("flat-files/chicago-illinois.csv"));
        assert_eq!(chicago.geometry_column, 1);
        assert_eq!(chicago.format, GeometryFormat::Wkt);
        assert!(chicago.skip_header && !chicago.title_case);

        let baltimore = &config.sources[1];
        assert_eq!(baltimore.path, PathBuf::from("/srv/flat-files/baltimore.csv.gz"));
        assert_eq!(baltimore.format, GeometryFormat::GeoJson);
        assert_eq!(baltimore.delimiter, ';');
        assert_eq!(baltimore.job().unwrap().format(), GeometryFormat::GeoJson);
    }

    #[test]
    fn test_rejects_non_ascii_delimiter() {
        let source = SourceConfig {
            name: "x".to_string(),
            path: PathBuf::from("x.csv"),
            city: "Chicago".to_string(),
            state: "IL".to_string(),
            name_column: 0,
            geometry_column: 1,
            format: GeometryFormat::Wkt,
            skip_header: false,
            title_case: false,
            delimiter: '§',
        };
        assert!(source.job().is_err());
    }
}

use crate::collect::global_variables::{
    COPERNICUS_API_URL, DEFAULT_CLOUD_MAX, SENTINEL2_PRODUCT_TYPE,
};
use crate::error::{Result, VegsatError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toml::Value;

/// Fully-resolved pipeline configuration.
///
/// Built once from a TOML document, environment placeholders substituted,
/// validated, and immutable afterwards. All downstream stages borrow it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub credentials: Credentials,
    pub query: QueryConfig,
    #[serde(default)]
    pub spatial: SpatialConfig,
    pub inputs: InputsConfig,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_product_type")]
    pub product_type: String,
    pub platform_name: Option<String>,
    #[serde(default = "default_cloud_max")]
    pub cloud_max: f64,
    pub date_range: DateRangeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeConfig {
    pub start_year: i32,
    pub end_year: i32,
    /// Inclusive month pair: `[5, 8]` restricts each year to May through August.
    #[serde(default = "default_months")]
    pub months: [u32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpatialConfig {
    #[serde(default = "default_epsg")]
    pub sr_input_epsg: i32,
    #[serde(default = "default_epsg")]
    pub sr_output_epsg: i32,
    /// Area of interest as a WKT polygon. Takes precedence over `geojson_path`
    /// and over building the area from survey points.
    pub wkt_area: Option<String>,
    /// GeoJSON file whose first feature supplies the area of interest.
    pub geojson_path: Option<PathBuf>,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        SpatialConfig {
            sr_input_epsg: default_epsg(),
            sr_output_epsg: default_epsg(),
            wkt_area: None,
            geojson_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputsConfig {
    /// Emlid-formatted CSV of ground-survey points.
    pub emlid_csv: PathBuf,
    #[serde(default = "default_lat_field")]
    pub lat_field: String,
    #[serde(default = "default_lon_field")]
    pub lon_field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputsConfig {
    pub download_dir: PathBuf,
    /// Directory holding vector outputs (the feature store).
    pub gdb_path: PathBuf,
    /// Feature-class name for the study-area geometry inside `gdb_path`.
    #[serde(default = "default_study_areas_fc")]
    pub study_areas_fc: String,
    pub raster_output_dir: PathBuf,
}

impl OutputsConfig {
    /// Path of the study-area feature class (a GeoJSON store under `gdb_path`).
    pub fn study_area_path(&self) -> PathBuf {
        self.gdb_path.join(format!("{}.geojson", self.study_areas_fc))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_rgb_bands")]
    pub rgb_bands: Vec<String>,
    #[serde(default = "default_nir_bands")]
    pub nir_bands: Vec<String>,
    /// When set, only the first N products in catalog response order are
    /// downloaded.
    pub limit_products: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            rgb_bands: default_rgb_bands(),
            nir_bands: default_nir_bands(),
            limit_products: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file_path: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file_path: None,
            format: default_log_format(),
        }
    }
}

fn default_api_url() -> String {
    COPERNICUS_API_URL.to_string()
}

fn default_product_type() -> String {
    SENTINEL2_PRODUCT_TYPE.to_string()
}

fn default_cloud_max() -> f64 {
    DEFAULT_CLOUD_MAX
}

fn default_months() -> [u32; 2] {
    [5, 8]
}

fn default_epsg() -> i32 {
    4326
}

fn default_lat_field() -> String {
    "lat".to_string()
}

fn default_lon_field() -> String {
    "lon".to_string()
}

fn default_study_areas_fc() -> String {
    "study_areas".to_string()
}

fn default_rgb_bands() -> Vec<String> {
    vec!["B04".to_string(), "B03".to_string(), "B02".to_string()]
}

fn default_nir_bands() -> Vec<String> {
    vec!["B08".to_string(), "B04".to_string(), "B03".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Config {
    /// Load, resolve and validate a configuration document.
    ///
    /// The environment is snapshotted here, once, and handed to the pure
    /// substitution pass; nothing else in the crate reads the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VegsatError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path)?;
        let value: Value = raw.parse().map_err(|e: toml::de::Error| VegsatError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let env: HashMap<String, String> = std::env::vars().collect();
        let resolved = resolve_placeholders(value, &env);

        let config: Config =
            resolved
                .try_into()
                .map_err(|e: toml::de::Error| VegsatError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded and resolved");
        Ok(config)
    }

    /// Reject structurally valid but semantically broken values up front,
    /// naming the offending key, instead of failing deep inside a stage.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.api_url.trim().is_empty() {
            return Err(VegsatError::ConfigInvalid {
                key: "credentials.api_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let range = &self.query.date_range;
        if range.start_year > range.end_year {
            return Err(VegsatError::ConfigInvalid {
                key: "query.date_range.start_year".to_string(),
                reason: format!(
                    "start_year {} is after end_year {}",
                    range.start_year, range.end_year
                ),
            });
        }
        let [first, last] = range.months;
        if !(1..=12).contains(&first) || !(1..=12).contains(&last) || first > last {
            return Err(VegsatError::ConfigInvalid {
                key: "query.date_range.months".to_string(),
                reason: format!("expected an ordered pair within 1..=12, got [{first}, {last}]"),
            });
        }
        if !(0.0..=100.0).contains(&self.query.cloud_max) {
            return Err(VegsatError::ConfigInvalid {
                key: "query.cloud_max".to_string(),
                reason: format!("{} is not a percentage", self.query.cloud_max),
            });
        }
        if self.processing.rgb_bands.is_empty() {
            return Err(VegsatError::ConfigInvalid {
                key: "processing.rgb_bands".to_string(),
                reason: "band list must not be empty".to_string(),
            });
        }
        if self.processing.nir_bands.is_empty() {
            return Err(VegsatError::ConfigInvalid {
                key: "processing.nir_bands".to_string(),
                reason: "band list must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Substitute `${NAME}` placeholders throughout a parsed TOML tree.
///
/// Pure function of (tree, environment snapshot): recurses into tables and
/// arrays, rewrites string leaves only, leaves other scalars untouched.
/// Resolving an already-resolved tree is a no-op.
pub fn resolve_placeholders(value: Value, env: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(&s, env)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| resolve_placeholders(item, env))
                .collect(),
        ),
        Value::Table(table) => Value::Table(
            table
                .into_iter()
                .map(|(key, item)| (key, resolve_placeholders(item, env)))
                .collect(),
        ),
        other => other,
    }
}

/// Replace every `${NAME}` with the environment's value for NAME, or the
/// empty string when unset. An unterminated `${` consumes the remainder of
/// the string, like an unresolved reference.
fn interpolate(input: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                if let Some(value) = env.get(name) {
                    out.push_str(value);
                }
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

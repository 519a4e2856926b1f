use crate::collect::catalog::{CatalogClient, ProductFilter};
use crate::collect::download::{download_products, DownloadReport};
use crate::config::Config;
use crate::error::Result;
use crate::geometric::composite::CompositeBuilder;
use crate::geometric::study_area::{self, StudyAreaBuilder};
use std::path::{Path, PathBuf};

/// Outcome of one full pipeline run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Products matched by the catalog query, after `limit_products`.
    pub queried: usize,
    pub download: DownloadReport,
    pub composites: Vec<PathBuf>,
    /// (product id, reason) for each composite that failed.
    pub composite_failures: Vec<(String, String)>,
}

impl RunSummary {
    /// A run succeeds unless a per-item stage lost every item. Zero matched
    /// products is a success (nothing to do), not a failure.
    pub fn is_success(&self) -> bool {
        if self.download.all_failed() {
            return false;
        }
        !self.composites.is_empty() || self.composite_failures.is_empty()
    }
}

/// Run the four pipeline stages from a configuration document: resolve the
/// configuration, build or load the study area, query the catalog, download
/// the products and composite the configured band sets.
pub fn run(config_path: &Path) -> Result<RunSummary> {
    let config = Config::load(config_path)?;
    crate::logging::init(&config.logging)?;
    tracing::info!(path = %config_path.display(), "configuration resolved");

    let wkt_area = resolve_area(&config)?;
    run_with_area(&config, &wkt_area)
}

/// Programmatic entry point for callers that already hold a polygon. The
/// study-area stage is skipped entirely.
pub fn run_with_area(config: &Config, wkt_area: &str) -> Result<RunSummary> {
    let client = CatalogClient::connect(&config.credentials)?;
    let filter = ProductFilter::from_config(&config.query, wkt_area.to_string())?;

    let mut products = client.query(&filter)?;
    if let Some(limit) = config.processing.limit_products {
        // First N in catalog response order.
        products.truncate(limit);
    }
    if products.is_empty() {
        tracing::warn!("no products matched the query");
        return Ok(RunSummary::default());
    }
    tracing::info!(count = products.len(), "products selected for download");

    let download = download_products(&client, &products, &config.outputs.download_dir)?;

    let mut composites = Vec::new();
    let mut composite_failures = Vec::new();
    let band_sets = [
        ("rgb", &config.processing.rgb_bands),
        ("nir", &config.processing.nir_bands),
    ];
    for product in &download.downloaded {
        for &(purpose, bands) in &band_sets {
            let builder = CompositeBuilder::new(
                &product.path,
                bands,
                &config.outputs.raster_output_dir,
            );
            match builder.run(purpose, None) {
                Ok(path) => composites.push(path),
                Err(error) => {
                    tracing::warn!(
                        product = %product.id,
                        purpose,
                        %error,
                        "composite failed"
                    );
                    composite_failures.push((product.id.clone(), error.to_string()));
                }
            }
        }
    }

    let summary = RunSummary {
        queried: products.len(),
        download,
        composites,
        composite_failures,
    };
    report(&summary);
    Ok(summary)
}

/// Area of interest, by priority: an explicit WKT polygon, a GeoJSON file,
/// or the study area built from survey points.
fn resolve_area(config: &Config) -> Result<String> {
    if let Some(wkt) = &config.spatial.wkt_area {
        if !wkt.trim().is_empty() {
            tracing::info!("using configured WKT area");
            return Ok(wkt.clone());
        }
    }
    if let Some(path) = &config.spatial.geojson_path {
        tracing::info!(path = %path.display(), "loading area of interest from GeoJSON");
        return study_area::wkt_from_geojson_file(path);
    }
    let out_path = config.outputs.study_area_path();
    let area = StudyAreaBuilder::from_config(&config.inputs, &config.spatial, &out_path).run()?;
    Ok(area.wkt())
}

fn report(summary: &RunSummary) {
    for product in &summary.download.downloaded {
        tracing::info!(product = %product.id, path = %product.path.display(), "downloaded");
    }
    for failure in &summary.download.failures {
        tracing::error!(product = %failure.id, reason = %failure.reason, "download failed");
    }
    for path in &summary.composites {
        tracing::info!(path = %path.display(), "composite ready");
    }
    for (id, reason) in &summary.composite_failures {
        tracing::error!(product = %id, %reason, "composite failed");
    }
    tracing::info!(
        queried = summary.queried,
        downloaded = summary.download.downloaded.len(),
        download_failures = summary.download.failures.len(),
        composites = summary.composites.len(),
        composite_failures = summary.composite_failures.len(),
        "pipeline finished"
    );
}

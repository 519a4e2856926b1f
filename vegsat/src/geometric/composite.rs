use crate::error::{Result, VegsatError};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use std::fs;
use std::path::{Path, PathBuf};

/// Ordered band stack for one downloaded product.
///
/// Band order is semantically meaningful (B04-B03-B02 is true color, the
/// swap to B08-B04-B03 is near-infrared false color) and is preserved
/// exactly in the output raster.
pub struct CompositeBuilder {
    product_dir: PathBuf,
    bands: Vec<String>,
    output_dir: PathBuf,
}

impl CompositeBuilder {
    pub fn new(product_dir: &Path, bands: &[String], output_dir: &Path) -> Self {
        CompositeBuilder {
            product_dir: product_dir.to_path_buf(),
            bands: bands.to_vec(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Locate every band file, stack them in the configured order and write
    /// one multi-band GeoTIFF. `purpose` feeds the default output name
    /// (`<product>_<purpose>.tif`) unless `filename` overrides it.
    ///
    /// All bands are located before any output is created, so a missing band
    /// leaves no partial file behind.
    pub fn run(&self, purpose: &str, filename: Option<&str>) -> Result<PathBuf> {
        let driver = DriverManager::get_driver_by_name("GTiff").map_err(|_| {
            VegsatError::MissingDependency {
                capability: "GDAL GTiff driver".to_string(),
            }
        })?;

        let band_files = self.locate_band_files()?;
        tracing::debug!(
            product = %self.product_dir.display(),
            bands = ?self.bands,
            "compositing bands"
        );

        let first = Dataset::open(&band_files[0])?;
        let (width, height) = first.raster_size();
        let geo_transform = first.geo_transform()?;
        let spatial_ref = first.spatial_ref().ok();

        let out_path = self.output_path(purpose, filename);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut output = driver.create_with_band_type::<u16, _>(
            &out_path,
            width as isize,
            height as isize,
            self.bands.len() as isize,
        )?;
        output.set_geo_transform(&geo_transform)?;
        if let Some(srs) = &spatial_ref {
            output.set_spatial_ref(srs)?;
        }

        for (index, band_file) in band_files.iter().enumerate() {
            let dataset = if index == 0 {
                // Reuse the already-open first band.
                None
            } else {
                Some(Dataset::open(band_file)?)
            };
            let source = dataset.as_ref().unwrap_or(&first);

            let (source_width, source_height) = source.raster_size();
            if (source_width, source_height) != (width, height) {
                return Err(VegsatError::Raster {
                    reason: format!(
                        "band {} is {}x{} but band {} is {}x{}; bands of one composite must share a grid",
                        self.bands[index],
                        source_width,
                        source_height,
                        self.bands[0],
                        width,
                        height
                    ),
                });
            }

            let source_band = source.rasterband(1)?;
            let buffer: Buffer<u16> =
                source_band.read_as::<u16>((0, 0), (width, height), (width, height), None)?;

            let mut target_band = output.rasterband((index + 1) as isize)?;
            target_band.write((0, 0), (width, height), &buffer)?;
            if let Some(no_data) = source_band.no_data_value() {
                target_band.set_no_data_value(Some(no_data))?;
            }
        }

        tracing::info!(path = %out_path.display(), "composite written");
        Ok(out_path)
    }

    /// Resolve each configured band identifier to a raster file before
    /// touching any output. A missing band aborts this composite only.
    fn locate_band_files(&self) -> Result<Vec<PathBuf>> {
        self.bands
            .iter()
            .map(|band| {
                find_band_file(&self.product_dir, band)?.ok_or_else(|| {
                    VegsatError::BandNotFound {
                        band: band.clone(),
                        dir: self.product_dir.clone(),
                    }
                })
            })
            .collect()
    }

    fn output_path(&self, purpose: &str, filename: Option<&str>) -> PathBuf {
        let name = match filename {
            Some(name) => name.to_string(),
            None => {
                let product = self
                    .product_dir
                    .file_name()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_else(|| "product".to_string());
                format!("{product}_{purpose}.tif")
            }
        };
        self.output_dir.join(name)
    }
}

/// Search the product directory tree for a raster file whose name contains
/// the band identifier (e.g. `*_B04_10m.jp2`).
fn find_band_file(dir: &Path, band: &str) -> Result<Option<PathBuf>> {
    let needle = band.to_ascii_uppercase();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&current)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let upper = name.to_ascii_uppercase();
            let is_raster = upper.ends_with(".JP2")
                || upper.ends_with(".TIF")
                || upper.ends_with(".TIFF");
            if is_raster && upper.contains(&needle) {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}

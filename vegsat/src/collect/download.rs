use crate::collect::catalog::{CatalogClient, ProductRecord};
use crate::error::{Result, VegsatError};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

/// One extracted product archive on local storage. Never mutated after
/// extraction completes.
#[derive(Debug, Clone)]
pub struct DownloadedProduct {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DownloadFailure {
    pub id: String,
    pub reason: String,
}

/// Result-per-item accumulation for the download stage. Lets callers
/// distinguish "zero products matched" from "all products failed".
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: Vec<DownloadedProduct>,
    pub failures: Vec<DownloadFailure>,
}

impl DownloadReport {
    pub fn all_failed(&self) -> bool {
        self.downloaded.is_empty() && !self.failures.is_empty()
    }

    /// Fold per-product outcomes, keyed by product id, into a report.
    pub fn collect<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<DownloadedProduct>)>,
    {
        let mut report = DownloadReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(product) => report.downloaded.push(product),
                Err(error) => {
                    let reason = match error {
                        VegsatError::Download { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    tracing::warn!(product = %id, %reason, "product download failed");
                    report.failures.push(DownloadFailure { id, reason });
                }
            }
        }
        report
    }
}

/// Download every product into `download_dir`, one at a time in input order.
/// A failing product is recorded in the report and the remaining products
/// still run; only a failure to create the download directory itself is
/// stage-fatal.
pub fn download_products(
    client: &CatalogClient,
    records: &[ProductRecord],
    download_dir: &Path,
) -> Result<DownloadReport> {
    fs::create_dir_all(download_dir)?;

    let progress = if records.len() > 1 {
        let bar = ProgressBar::new(records.len() as u64);
        bar.set_style(progress_style());
        bar.set_message("Products");
        Some(bar)
    } else {
        None
    };

    let mut outcomes = Vec::with_capacity(records.len());
    for record in records {
        let outcome = download_one(client, record, download_dir);
        if let Some(bar) = &progress {
            bar.inc(1);
        }
        outcomes.push((record.id.clone(), outcome));
    }
    if let Some(bar) = progress {
        bar.finish_with_message("downloads complete");
    }

    let report = DownloadReport::collect(outcomes);
    tracing::info!(
        downloaded = report.downloaded.len(),
        failed = report.failures.len(),
        "download stage finished"
    );
    Ok(report)
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Fetch one product archive, write it under the download directory and
/// extract it into a per-product directory. Every failure mode is reported
/// as a Download error naming the product.
fn download_one(
    client: &CatalogClient,
    record: &ProductRecord,
    download_dir: &Path,
) -> Result<DownloadedProduct> {
    let fail = |reason: String| VegsatError::Download {
        id: record.id.clone(),
        reason,
    };

    tracing::info!(product = %record.id, name = %record.name, "downloading product");

    let mut response = client
        .fetch_product(&record.id)
        .map_err(|e| fail(e.to_string()))?;

    let archive_path = download_dir.join(format!("{}.zip", record.id));
    let product_dir = download_dir.join(&record.id);

    {
        let mut file = fs::File::create(&archive_path)
            .map_err(|e| fail(format!("cannot create {}: {e}", archive_path.display())))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|e| fail(format!("transfer interrupted: {e}")))?;
    }

    extract_archive(&archive_path, &product_dir).map_err(|e| fail(e.to_string()))?;
    // The extracted directory is the product of record; the archive is spent.
    let _ = fs::remove_file(&archive_path);

    tracing::debug!(product = %record.id, path = %product_dir.display(), "product extracted");
    Ok(DownloadedProduct {
        id: record.id.clone(),
        name: record.name.clone(),
        path: product_dir,
    })
}

fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;
    archive.extract(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ok_product(id: &str) -> (String, Result<DownloadedProduct>) {
        (
            id.to_string(),
            Ok(DownloadedProduct {
                id: id.to_string(),
                name: format!("S2A_{id}"),
                path: PathBuf::from(format!("/tmp/{id}")),
            }),
        )
    }

    fn failed_product(id: &str, reason: &str) -> (String, Result<DownloadedProduct>) {
        (
            id.to_string(),
            Err(VegsatError::Download {
                id: id.to_string(),
                reason: reason.to_string(),
            }),
        )
    }

    #[test]
    fn one_failure_among_n_reports_n_minus_one_paths() {
        let report = DownloadReport::collect(vec![
            ok_product("a"),
            ok_product("b"),
            failed_product("c", "timeout"),
            ok_product("d"),
        ]);

        assert_eq!(report.downloaded.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "c");
        assert_eq!(report.failures[0].reason, "timeout");
        assert!(!report.all_failed());
    }

    #[test]
    fn all_failed_only_when_every_item_failed() {
        let empty = DownloadReport::collect(Vec::new());
        assert!(!empty.all_failed());

        let lost = DownloadReport::collect(vec![
            failed_product("a", "404"),
            failed_product("b", "timeout"),
        ]);
        assert!(lost.all_failed());
    }

    #[test]
    fn non_download_errors_are_still_collected_per_item() {
        let io_error = VegsatError::Io(std::io::Error::other("disk full"));
        let report = DownloadReport::collect(vec![("x".to_string(), Err(io_error))]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "x");
        assert!(report.failures[0].reason.contains("disk full"));
    }

    #[test]
    fn extract_archive_unpacks_into_destination() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("product.zip");

        let file = fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("GRANULE/IMG_DATA/T32_B04_10m.jp2", Default::default())
            .unwrap();
        writer.write_all(b"not really a jp2").unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("product");
        extract_archive(&archive_path, &dest).unwrap();
        assert!(dest.join("GRANULE/IMG_DATA/T32_B04_10m.jp2").is_file());
    }
}

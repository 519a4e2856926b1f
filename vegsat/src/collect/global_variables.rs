//! Catalog defaults and the Sentinel-2 band reference table.

/// Sentinel-2 Level-2A surface reflectance (the product type recommended for
/// vegetation work).
pub const SENTINEL2_PRODUCT_TYPE: &str = "S2MSI2A";

pub const SENTINEL2_PLATFORM: &str = "Sentinel-2";

/// Cloud-cover ceiling (percent) applied when the configuration leaves it
/// unset.
pub const DEFAULT_CLOUD_MAX: f64 = 5.0;

pub const COPERNICUS_API_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1";

/// Sentinel-2 band identifiers with description and native resolution.
pub const S2_BANDS: &[(&str, &str)] = &[
    ("B01", "Aerosols (60m)"),
    ("B02", "Blue (10m)"),
    ("B03", "Green (10m)"),
    ("B04", "Red (10m)"),
    ("B05", "Red Edge 1 (20m)"),
    ("B06", "Red Edge 2 (20m)"),
    ("B07", "Red Edge 3 (20m)"),
    ("B08", "NIR (10m)"),
    ("B8A", "NIR narrow (20m)"),
    ("B09", "Water vapour (60m)"),
    ("B10", "Cirrus (60m)"),
    ("B11", "SWIR1 (20m)"),
    ("B12", "SWIR2 (20m)"),
];

pub fn band_description(band: &str) -> Option<&'static str> {
    S2_BANDS
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(band))
        .map(|(_, description)| *description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_description_is_case_insensitive() {
        assert_eq!(band_description("b04"), Some("Red (10m)"));
        assert_eq!(band_description("B8A"), Some("NIR narrow (20m)"));
        assert_eq!(band_description("B99"), None);
    }
}

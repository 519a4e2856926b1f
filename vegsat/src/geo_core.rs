use crate::error::{Result, VegsatError};
use geo::Point;
use proj::Proj;

/// CRS bookkeeping shared by the study-area and composite stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoCore {
    pub epsg: i32,
}

impl GeoCore {
    pub fn new(epsg: i32) -> Self {
        GeoCore { epsg }
    }

    /// WGS84, the CRS survey receivers report in.
    pub fn wgs84() -> Self {
        GeoCore::new(4326)
    }

    /// `urn:ogc:def:crs:EPSG::<code>` identifier for feature metadata.
    pub fn crs_urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg)
    }

    /// Build a reusable transformation between two EPSG codes.
    pub fn transformation(from_epsg: i32, to_epsg: i32) -> Result<Proj> {
        Proj::new_known_crs(
            &format!("EPSG:{from_epsg}"),
            &format!("EPSG:{to_epsg}"),
            None,
        )
        .map_err(|e| {
            VegsatError::Projection(format!(
                "cannot build transformation EPSG:{from_epsg} -> EPSG:{to_epsg}: {e}"
            ))
        })
    }

    /// Transform one coordinate pair between two EPSG codes.
    pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
        let proj = Self::transformation(from_epsg, to_epsg)?;
        proj.convert((x, y)).map_err(|e| {
            VegsatError::Projection(format!(
                "failed to transform ({x}, {y}) from EPSG:{from_epsg} to EPSG:{to_epsg}: {e}"
            ))
        })
    }

    pub fn transform_point(from_epsg: i32, to_epsg: i32, point: Point<f64>) -> Result<Point<f64>> {
        let (x, y) = Self::transform_coords(from_epsg, to_epsg, point.x(), point.y())?;
        Ok(Point::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_default() {
        assert_eq!(GeoCore::wgs84().epsg, 4326);
    }

    #[test]
    fn crs_urn_names_the_code() {
        assert_eq!(GeoCore::new(32633).crs_urn(), "urn:ogc:def:crs:EPSG::32633");
    }

    #[test]
    fn transform_coords_yields_finite_values() {
        // Requires proj data on the machine; skip silently when unavailable.
        if let Ok((x, y)) = GeoCore::transform_coords(4326, 3857, 13.4, 52.5) {
            assert!(x.is_finite());
            assert!(y.is_finite());
        }
    }
}

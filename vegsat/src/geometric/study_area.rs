use crate::config::{InputsConfig, SpatialConfig};
use crate::error::{Result, VegsatError};
use crate::geo_core::GeoCore;
use geo::{ConvexHull, Geometry, MultiPoint, Point, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{json, Map};
use std::path::{Path, PathBuf};
use wkt::ToWkt;

/// Study area assembled from ground-survey points, expressed in the
/// configured output CRS.
#[derive(Debug, Clone)]
pub struct StudyArea {
    pub geometry: StudyAreaGeometry,
    pub geo_core: GeoCore,
}

#[derive(Debug, Clone)]
pub enum StudyAreaGeometry {
    Polygon(Polygon<f64>),
    /// Fallback when fewer than three distinct points were surveyed.
    MultiPoint(MultiPoint<f64>),
}

impl StudyArea {
    /// The area geometry as well-known text, ready for a catalog query.
    pub fn wkt(&self) -> String {
        match &self.geometry {
            StudyAreaGeometry::Polygon(polygon) => polygon.wkt_string(),
            StudyAreaGeometry::MultiPoint(points) => points.wkt_string(),
        }
    }
}

/// Builds a study-area feature class from an Emlid-style survey CSV.
pub struct StudyAreaBuilder {
    csv_path: PathBuf,
    lat_field: String,
    lon_field: String,
    input_epsg: i32,
    output_epsg: i32,
    out_path: PathBuf,
}

impl StudyAreaBuilder {
    pub fn from_config(inputs: &InputsConfig, spatial: &SpatialConfig, out_path: &Path) -> Self {
        StudyAreaBuilder {
            csv_path: inputs.emlid_csv.clone(),
            lat_field: inputs.lat_field.clone(),
            lon_field: inputs.lon_field.clone(),
            input_epsg: spatial.sr_input_epsg,
            output_epsg: spatial.sr_output_epsg,
            out_path: out_path.to_path_buf(),
        }
    }

    /// Read the survey records, reproject when input and output CRS differ,
    /// aggregate to one geometry and persist it as a GeoJSON feature class
    /// whose CRS metadata names the output EPSG code.
    pub fn run(&self) -> Result<StudyArea> {
        let points = self.read_points()?;
        tracing::info!(
            count = points.len(),
            path = %self.csv_path.display(),
            "survey points loaded"
        );

        let points = if self.input_epsg != self.output_epsg {
            self.reproject(points)?
        } else {
            points
        };

        let geometry = aggregate(points);
        let geo_core = GeoCore::new(self.output_epsg);
        let area = StudyArea { geometry, geo_core };
        self.write_feature_class(&area)?;
        tracing::info!(path = %self.out_path.display(), "study-area feature class written");
        Ok(area)
    }

    fn read_points(&self) -> Result<Vec<Point<f64>>> {
        if !self.csv_path.exists() {
            return Err(VegsatError::InputNotFound {
                path: self.csv_path.clone(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.csv_path)
            .map_err(|e| VegsatError::InvalidRecord {
                line: 0,
                path: self.csv_path.clone(),
                reason: e.to_string(),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| VegsatError::InvalidRecord {
                line: 0,
                path: self.csv_path.clone(),
                reason: e.to_string(),
            })?
            .clone();

        let field_index = |field: &str| -> Result<usize> {
            headers
                .iter()
                .position(|header| header == field)
                .ok_or_else(|| VegsatError::FieldMissing {
                    field: field.to_string(),
                    path: self.csv_path.clone(),
                })
        };
        let lat_index = field_index(&self.lat_field)?;
        let lon_index = field_index(&self.lon_field)?;

        let mut points = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| VegsatError::InvalidRecord {
                line: 0,
                path: self.csv_path.clone(),
                reason: e.to_string(),
            })?;
            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();

            let parse = |index: usize, field: &str| -> Result<f64> {
                record
                    .get(index)
                    .ok_or_else(|| VegsatError::FieldMissing {
                        field: field.to_string(),
                        path: self.csv_path.clone(),
                    })?
                    .parse::<f64>()
                    .map_err(|e| VegsatError::InvalidRecord {
                        line,
                        path: self.csv_path.clone(),
                        reason: format!("{field}: {e}"),
                    })
            };
            let lat = parse(lat_index, &self.lat_field)?;
            let lon = parse(lon_index, &self.lon_field)?;
            points.push(Point::new(lon, lat));
        }
        Ok(points)
    }

    fn reproject(&self, points: Vec<Point<f64>>) -> Result<Vec<Point<f64>>> {
        let proj = GeoCore::transformation(self.input_epsg, self.output_epsg)?;
        points
            .into_iter()
            .map(|point| {
                let (x, y) = proj.convert((point.x(), point.y())).map_err(|e| {
                    VegsatError::Projection(format!(
                        "failed to reproject ({}, {}): {e}",
                        point.x(),
                        point.y()
                    ))
                })?;
                Ok(Point::new(x, y))
            })
            .collect()
    }

    fn write_feature_class(&self, area: &StudyArea) -> Result<()> {
        if let Some(parent) = self.out_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let geometry = match &area.geometry {
            StudyAreaGeometry::Polygon(polygon) => {
                geojson::Geometry::new(geojson::Value::from(polygon))
            }
            StudyAreaGeometry::MultiPoint(points) => {
                geojson::Geometry::new(geojson::Value::from(points))
            }
        };

        let feature = Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        };

        let mut foreign_members = Map::new();
        foreign_members.insert(
            "crs".to_string(),
            json!({
                "type": "name",
                "properties": { "name": area.geo_core.crs_urn() }
            }),
        );

        let collection = GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: Some(foreign_members),
        });

        std::fs::write(&self.out_path, collection.to_string())?;
        Ok(())
    }
}

/// Collapse the surveyed points into a single geometry: a convex hull when
/// three or more distinct positions exist, a multipoint otherwise.
fn aggregate(points: Vec<Point<f64>>) -> StudyAreaGeometry {
    let mut distinct: Vec<(u64, u64)> = points
        .iter()
        .map(|point| (point.x().to_bits(), point.y().to_bits()))
        .collect();
    distinct.sort_unstable();
    distinct.dedup();

    let multi = MultiPoint::from(points);
    if distinct.len() >= 3 {
        StudyAreaGeometry::Polygon(multi.convex_hull())
    } else {
        StudyAreaGeometry::MultiPoint(multi)
    }
}

/// Area of interest from an existing GeoJSON document: the first feature's
/// geometry, rendered as WKT. Used when the configuration points at a
/// pre-built polygon instead of survey points.
pub fn wkt_from_geojson_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(VegsatError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path)?;
    let geojson: GeoJson = raw.parse().map_err(|e: geojson::Error| VegsatError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let geometry = match geojson {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .find_map(|feature| feature.geometry),
    }
    .ok_or_else(|| VegsatError::Parse {
        path: path.to_path_buf(),
        reason: "document contains no geometry".to_string(),
    })?;

    let geometry: Geometry<f64> =
        geometry
            .try_into()
            .map_err(|e: geojson::Error| VegsatError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
    Ok(geometry.wkt_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputsConfig, SpatialConfig};
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    fn builder(csv_path: &Path, out_path: &Path) -> StudyAreaBuilder {
        let inputs = InputsConfig {
            emlid_csv: csv_path.to_path_buf(),
            lat_field: "lat".to_string(),
            lon_field: "lon".to_string(),
        };
        StudyAreaBuilder::from_config(&inputs, &SpatialConfig::default(), out_path)
    }

    #[test]
    fn missing_input_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = builder(&dir.path().join("nope.csv"), &dir.path().join("out.geojson"))
            .run()
            .unwrap_err();
        assert!(matches!(err, VegsatError::InputNotFound { .. }));
    }

    #[test]
    fn missing_declared_field_is_field_missing() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "points.csv",
            "name,latitude,longitude\np1,46.18,-1.15\n",
        );
        let err = builder(&csv, &dir.path().join("out.geojson"))
            .run()
            .unwrap_err();
        match err {
            VegsatError::FieldMissing { field, .. } => assert_eq!(field, "lat"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unparsable_coordinate_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), "points.csv", "lat,lon\n46.18,-1.15\noops,-1.14\n");
        let err = builder(&csv, &dir.path().join("out.geojson"))
            .run()
            .unwrap_err();
        match err {
            VegsatError::InvalidRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn three_or_more_points_become_a_hull_polygon() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "points.csv",
            "lat,lon\n0.0,0.0\n0.0,1.0\n1.0,1.0\n1.0,0.0\n0.5,0.5\n",
        );
        let area = builder(&csv, &dir.path().join("out.geojson")).run().unwrap();
        match &area.geometry {
            StudyAreaGeometry::Polygon(polygon) => {
                // The interior point is not a hull vertex.
                assert_eq!(polygon.exterior().coords().count(), 5);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
        assert!(area.wkt().starts_with("POLYGON"));
    }

    #[test]
    fn two_points_fall_back_to_multipoint() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), "points.csv", "lat,lon\n0.0,0.0\n1.0,1.0\n");
        let area = builder(&csv, &dir.path().join("out.geojson")).run().unwrap();
        assert!(matches!(area.geometry, StudyAreaGeometry::MultiPoint(_)));
        assert!(area.wkt().starts_with("MULTIPOINT"));
    }

    #[test]
    fn feature_class_names_the_output_crs() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "points.csv",
            "lat,lon\n0.0,0.0\n0.0,1.0\n1.0,0.0\n",
        );
        let out = dir.path().join("features/study_areas.geojson");
        builder(&csv, &out).run().unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("urn:ogc:def:crs:EPSG::4326"));
        assert!(written.contains("FeatureCollection"));
    }

    #[test]
    fn configurable_field_names_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "points.csv",
            "Latitude,Longitude\n0.0,0.0\n0.0,1.0\n1.0,0.0\n",
        );
        let inputs = InputsConfig {
            emlid_csv: csv,
            lat_field: "Latitude".to_string(),
            lon_field: "Longitude".to_string(),
        };
        let out = dir.path().join("out.geojson");
        let area = StudyAreaBuilder::from_config(&inputs, &SpatialConfig::default(), &out)
            .run()
            .unwrap();
        assert!(matches!(area.geometry, StudyAreaGeometry::Polygon(_)));
    }

    #[test]
    fn wkt_from_geojson_file_reads_first_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
                "geometry":{"type":"Polygon","coordinates":[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]}}]}"#,
        )
        .unwrap();
        let wkt = wkt_from_geojson_file(&path).unwrap();
        assert!(wkt.starts_with("POLYGON"));
    }

    #[test]
    fn wkt_from_geojson_file_missing_is_input_not_found() {
        let err = wkt_from_geojson_file(Path::new("no/area.geojson")).unwrap_err();
        assert!(matches!(err, VegsatError::InputNotFound { .. }));
    }
}

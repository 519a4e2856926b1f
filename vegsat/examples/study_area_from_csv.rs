use anyhow::Result;
use std::path::Path;
use vegsat::config::{InputsConfig, SpatialConfig};
use vegsat::geometric::study_area::StudyAreaBuilder;

/// Example: building a study-area polygon from an Emlid survey CSV.
fn main() -> Result<()> {
    println!("=== Example: Study area from survey points ===\n");

    let inputs = InputsConfig {
        emlid_csv: "data/emlid_points.csv".into(),
        lat_field: "lat".to_string(),
        lon_field: "lon".to_string(),
    };
    let spatial = SpatialConfig::default(); // WGS84 in, WGS84 out

    let out_path = Path::new("data/features/study_areas.geojson");
    let area = StudyAreaBuilder::from_config(&inputs, &spatial, out_path).run()?;

    println!("Study area written to: {}", out_path.display());
    println!("Query polygon (WKT): {}", area.wkt());

    Ok(())
}

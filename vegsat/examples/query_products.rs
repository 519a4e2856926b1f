use anyhow::Result;
use vegsat::collect::catalog::{CatalogClient, ProductFilter};
use vegsat::config::Config;

/// Example: querying the catalog for low-cloud summer acquisitions over a
/// fixed polygon. Requires COPERNICUS_USER / COPERNICUS_PASSWORD in the
/// environment.
fn main() -> Result<()> {
    println!("=== Example: Catalog query ===\n");

    let config = Config::load("config/vegsat.toml")?;

    let wkt_area =
        "POLYGON((-1.1527 46.1816, -1.1399 46.1816, -1.1399 46.1870, -1.1527 46.1870, -1.1527 46.1816))";

    let client = CatalogClient::connect(&config.credentials)?;
    let filter = ProductFilter::from_config(&config.query, wkt_area.to_string())?;
    let products = client.query(&filter)?;

    println!("Found {} product(s):", products.len());
    for product in &products {
        println!(
            "  {}  {}  cloud {:.1}%  {}",
            product.sensing_date.format("%Y-%m-%d"),
            product.name,
            product.cloud_cover,
            product.id
        );
    }

    Ok(())
}

use anyhow::Result;
use std::path::Path;
use vegsat::geometric::composite::CompositeBuilder;

/// Example: stacking bands from an already-downloaded product directory into
/// true-color and near-infrared false-color composites.
fn main() -> Result<()> {
    println!("=== Example: Band composites ===\n");

    let product_dir = Path::new("data/downloads/7bd8b965-1606-4724-b744-2e58c8c9f4d0");
    let output_dir = Path::new("data/composites");

    // True color: red, green, blue.
    let rgb = ["B04", "B03", "B02"].map(String::from);
    let path = CompositeBuilder::new(product_dir, &rgb, output_dir).run("rgb", None)?;
    println!("RGB composite: {}", path.display());

    // False color: the near-infrared band takes the red channel.
    let nir = ["B08", "B04", "B03"].map(String::from);
    let path = CompositeBuilder::new(product_dir, &nir, output_dir).run("nir", None)?;
    println!("NIR composite: {}", path.display());

    Ok(())
}

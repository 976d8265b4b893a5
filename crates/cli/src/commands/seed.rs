//! Seed the catalog and the olfactory note dictionary.
//!
//! The catalog file is YAML:
//!
//! ```yaml
//! products:
//!   - name: Oud Royal
//!     brand: Maison Rayha
//!     price: "129.00"
//!     gender: mixte
//!     notesFond: [Oud, Ambre]
//!     stock: 12
//! featured: [Oud Royal]
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use rayha_core::ProductId;
use rayha_core::money::format_eur;
use rayha_core::catalog::ProductInput;
use rayha_storefront::db::{OlfactoryNoteRepository, ProductRepository};
use rayha_storefront::models::OlfactoryNoteInput;

use super::connect;

#[derive(Debug, Deserialize)]
struct SeedCatalog {
    products: Vec<ProductInput>,
    /// Product names, in display order.
    #[serde(default)]
    featured: Vec<String>,
}

/// Load products from a YAML catalog.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product is
/// invalid, or a database operation fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Parse and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedCatalog = serde_yaml::from_str(&content)?;
    let products = seed
        .products
        .into_iter()
        .map(ProductInput::normalize)
        .collect::<Result<Vec<_>, _>>()?;

    info!(products = products.len(), "Parsed catalog");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut by_name: HashMap<String, ProductId> = repo
        .list()
        .await?
        .into_iter()
        .map(|p| (p.name, p.id))
        .collect();

    let mut inserted = 0;
    let mut skipped = 0;
    for input in &products {
        if by_name.contains_key(&input.name) {
            skipped += 1;
            continue;
        }
        let product = repo.create(input).await?;
        info!(name = %product.name, price = %format_eur(product.price), "Product added");
        by_name.insert(product.name, product.id);
        inserted += 1;
    }

    if !seed.featured.is_empty() {
        let mut seen = HashSet::new();
        let mut featured = Vec::with_capacity(seed.featured.len());
        for name in &seed.featured {
            match by_name.get(name) {
                Some(id) if seen.insert(*id) => featured.push(*id),
                Some(_) => {}
                None => warn!(name = %name, "Featured product not in catalog, skipped"),
            }
        }
        repo.set_featured(&featured).await?;
        info!("  Featured products: {}", featured.len());
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");

    Ok(())
}

/// Import the default olfactory note dictionary.
///
/// # Errors
///
/// Returns an error if the database connection or an insert fails.
pub async fn notes() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;
    let notes = OlfactoryNoteInput::defaults();
    let imported = OlfactoryNoteRepository::new(&pool).import(&notes).await?;

    info!("Olfactory notes imported: {imported} of {}", notes.len());
    Ok(())
}

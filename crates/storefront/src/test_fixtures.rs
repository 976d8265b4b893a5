//! Shared builders for unit tests.

use chrono::DateTime;
use rust_decimal::Decimal;

use rayha_core::catalog::Product;
use rayha_core::olfactory::OlfactoryFamily;
use rayha_core::{Gender, ProductId};

/// An in-stock 89 € fragrance.
pub fn product(id: i32, name: &str) -> Product {
    let created = DateTime::from_timestamp(1_780_000_000, 0).unwrap_or_default();
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        brand: "Maison Rayha".to_owned(),
        price: Decimal::new(8900, 2),
        image_url: None,
        scent: Some("Oriental".to_owned()),
        category: Some("Eau de parfum".to_owned()),
        concentration: Some("EDP".to_owned()),
        gender: Gender::Mixte,
        families: vec![OlfactoryFamily::Oriental],
        description: None,
        notes_tete: vec!["Safran".to_owned()],
        notes_coeur: vec!["Rose de Taïf".to_owned()],
        notes_fond: vec!["Oud".to_owned()],
        volume: Some("50 ml".to_owned()),
        stock: 10,
        monthly_sales: 0,
        is_featured: false,
        featured_order: None,
        created_at: created,
        updated_at: created,
    }
}

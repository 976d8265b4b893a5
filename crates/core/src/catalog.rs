//! Products, catalog filtering and curated orderings.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartLine;
use crate::inventory::clamp_non_negative;
use crate::olfactory::{NotePyramid, OlfactoryFamily, classify};
use crate::types::{Gender, ProductId};

/// A fragrance in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub scent: Option<String>,
    pub category: Option<String>,
    pub concentration: Option<String>,
    pub gender: Gender,
    pub families: Vec<OlfactoryFamily>,
    pub description: Option<String>,
    pub notes_tete: Vec<String>,
    pub notes_coeur: Vec<String>,
    pub notes_fond: Vec<String>,
    pub volume: Option<String>,
    pub stock: i32,
    pub monthly_sales: i32,
    pub is_featured: bool,
    pub featured_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn notes(&self) -> NotePyramid<'_> {
        NotePyramid {
            tete: &self.notes_tete,
            coeur: &self.notes_coeur,
            fond: &self.notes_fond,
        }
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Snapshot of the product as a cart line.
    #[must_use]
    pub fn to_cart_line(&self, quantity: u32) -> CartLine {
        CartLine {
            product_id: self.id,
            name: self.name.clone(),
            brand: self.brand.clone(),
            unit_price: self.price,
            image_url: self.image_url.clone(),
            scent: self.scent.clone(),
            category: self.category.clone(),
            quantity,
        }
    }
}

/// Back-office input for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub brand: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub scent: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub concentration: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub families: Vec<OlfactoryFamily>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes_tete: Vec<String>,
    #[serde(default)]
    pub notes_coeur: Vec<String>,
    #[serde(default)]
    pub notes_fond: Vec<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub monthly_sales: i32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductInputError {
    #[error("Le nom du produit est obligatoire")]
    MissingName,
    #[error("La marque est obligatoire")]
    MissingBrand,
    #[error("Le prix ne peut pas être négatif")]
    NegativePrice,
}

impl ProductInput {
    /// Trim text fields, clamp counters and fill in families from the notes
    /// when none were chosen.
    ///
    /// # Errors
    ///
    /// Returns a [`ProductInputError`] when name or brand is blank or the
    /// price is negative.
    pub fn normalize(mut self) -> Result<Self, ProductInputError> {
        self.name = self.name.trim().to_owned();
        self.brand = self.brand.trim().to_owned();
        if self.name.is_empty() {
            return Err(ProductInputError::MissingName);
        }
        if self.brand.is_empty() {
            return Err(ProductInputError::MissingBrand);
        }
        if self.price < Decimal::ZERO {
            return Err(ProductInputError::NegativePrice);
        }

        for notes in [&mut self.notes_tete, &mut self.notes_coeur, &mut self.notes_fond] {
            let cleaned: Vec<String> = notes
                .iter()
                .map(|n| n.trim().to_owned())
                .filter(|n| !n.is_empty())
                .collect();
            *notes = cleaned;
        }

        self.stock = clamp_non_negative(self.stock);
        self.monthly_sales = clamp_non_negative(self.monthly_sales);

        if self.families.is_empty() {
            self.families = classify(NotePyramid {
                tete: &self.notes_tete,
                coeur: &self.notes_coeur,
                fond: &self.notes_fond,
            });
        }
        let mut seen = HashSet::new();
        self.families.retain(|f| seen.insert(*f));
        Ok(self)
    }
}

/// Query-string filters of the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    /// Exact scent, case-insensitive.
    pub scent: Option<String>,
    /// Substring of the category, case-insensitive.
    pub category: Option<String>,
    pub gender: Option<Gender>,
    pub family: Option<OlfactoryFamily>,
    /// Free text matched against name, brand and notes.
    pub q: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

impl ProductFilter {
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(scent) = non_blank(self.scent.as_deref())
            && product.scent.as_deref().map(str::to_lowercase) != Some(scent)
        {
            return false;
        }
        if let Some(category) = non_blank(self.category.as_deref())
            && !product
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&category))
        {
            return false;
        }
        if let Some(gender) = self.gender
            && product.gender != gender
        {
            return false;
        }
        if let Some(family) = self.family
            && !product.families.contains(&family)
        {
            return false;
        }
        let Some(q) = non_blank(self.q.as_deref()) else {
            return true;
        };
        [&product.name, &product.brand]
            .into_iter()
            .chain(&product.notes_tete)
            .chain(&product.notes_coeur)
            .chain(&product.notes_fond)
            .any(|text| text.to_lowercase().contains(&q))
    }

    /// Keep the matching products, preserving order.
    #[must_use]
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        products.into_iter().filter(|p| self.matches(p)).collect()
    }
}

/// Direction of a reorder in a curated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Clean up a featured selection: drop ids that are not in the catalog and
/// keep only the first occurrence of each.
#[must_use]
pub fn normalize_featured(ids: &[ProductId], valid: &HashSet<ProductId>) -> Vec<ProductId> {
    let mut seen = HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| valid.contains(id) && seen.insert(*id))
        .collect()
}

/// Swap the entry identified by `target` with its neighbour.
///
/// Returns `false`, leaving the list untouched, when the entry is missing or
/// already at that end.
pub fn move_item<T, K: PartialEq>(
    items: &mut [T],
    key: impl Fn(&T) -> K,
    target: &K,
    direction: Direction,
) -> bool {
    let Some(index) = items.iter().position(|item| key(item) == *target) else {
        return false;
    };
    let other = match direction {
        Direction::Up if index > 0 => index - 1,
        Direction::Down if index + 1 < items.len() => index + 1,
        _ => return false,
    };
    items.swap(index, other);
    true
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(id: i32, name: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            brand: "Maison Rayha".to_owned(),
            price: Decimal::new(8900, 2),
            image_url: None,
            scent: Some("Boisé".to_owned()),
            category: Some("Eau de parfum".to_owned()),
            concentration: Some("EDP".to_owned()),
            gender: Gender::Mixte,
            families: vec![OlfactoryFamily::Boise],
            description: None,
            notes_tete: vec!["Bergamote".to_owned()],
            notes_coeur: vec!["Iris de Toscane".to_owned()],
            notes_fond: vec!["Cèdre de l'Atlas".to_owned()],
            volume: Some("100 ml".to_owned()),
            stock: 5,
            monthly_sales: 0,
            is_featured: false,
            featured_order: None,
            created_at: DateTime::from_timestamp(1_780_000_000, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(1_780_000_000, 0).unwrap_or_default(),
        }
    }

    fn input() -> ProductInput {
        ProductInput {
            name: "  Nuit d'Ambre ".to_owned(),
            brand: "Rayha".to_owned(),
            price: Decimal::from(120),
            image_url: None,
            scent: None,
            category: None,
            concentration: None,
            gender: Gender::Femme,
            families: Vec::new(),
            description: None,
            notes_tete: vec![" Poivre rose ".to_owned(), String::new()],
            notes_coeur: Vec::new(),
            notes_fond: vec!["Ambre gris".to_owned()],
            volume: None,
            stock: -3,
            monthly_sales: 4,
        }
    }

    #[test]
    fn test_scent_filter_is_exact_and_case_insensitive() {
        let p = product(1, "Cèdre Noir");
        let mut filter = ProductFilter {
            scent: Some("boisé".to_owned()),
            ..ProductFilter::default()
        };
        assert!(filter.matches(&p));

        filter.scent = Some("bois".to_owned());
        assert!(!filter.matches(&p));
    }

    #[test]
    fn test_category_filter_is_substring() {
        let p = product(1, "Cèdre Noir");
        let filter = ProductFilter {
            category: Some("PARFUM".to_owned()),
            ..ProductFilter::default()
        };
        assert!(filter.matches(&p));
    }

    #[test]
    fn test_free_text_searches_notes() {
        let p = product(1, "Cèdre Noir");
        let hit = ProductFilter {
            q: Some("iris".to_owned()),
            ..ProductFilter::default()
        };
        let miss = ProductFilter {
            q: Some("vanille".to_owned()),
            ..ProductFilter::default()
        };
        assert!(hit.matches(&p));
        assert!(!miss.matches(&p));
    }

    #[test]
    fn test_gender_and_family_filters() {
        let p = product(1, "Cèdre Noir");
        let filter = ProductFilter {
            gender: Some(Gender::Homme),
            ..ProductFilter::default()
        };
        assert!(!filter.matches(&p));

        let filter = ProductFilter {
            family: Some(OlfactoryFamily::Boise),
            ..ProductFilter::default()
        };
        assert_eq!(filter.apply(vec![p.clone()]), vec![p]);
    }

    #[test]
    fn test_blank_filters_match_everything() {
        let filter = ProductFilter {
            scent: Some("  ".to_owned()),
            q: Some(String::new()),
            ..ProductFilter::default()
        };
        assert!(filter.matches(&product(1, "Cèdre Noir")));
    }

    #[test]
    fn test_input_normalization() {
        let normalized = input().normalize();
        let Ok(normalized) = normalized else {
            panic!("input should be valid");
        };
        assert_eq!(normalized.name, "Nuit d'Ambre");
        assert_eq!(normalized.notes_tete, vec!["Poivre rose".to_owned()]);
        assert_eq!(normalized.stock, 0);
        assert_eq!(
            normalized.families,
            vec![
                OlfactoryFamily::Floral,
                OlfactoryFamily::Oriental,
                OlfactoryFamily::Epice,
            ]
        );
    }

    #[test]
    fn test_input_rejects_blank_name_and_negative_price() {
        let mut blank = input();
        blank.name = " ".to_owned();
        assert_eq!(blank.normalize(), Err(ProductInputError::MissingName));

        let mut negative = input();
        negative.price = Decimal::new(-1, 2);
        assert_eq!(negative.normalize(), Err(ProductInputError::NegativePrice));
    }

    #[test]
    fn test_normalize_featured() {
        let valid: HashSet<ProductId> = [1, 2, 3].into_iter().map(ProductId::new).collect();
        let ids: Vec<ProductId> = [3, 9, 1, 3].into_iter().map(ProductId::new).collect();
        assert_eq!(
            normalize_featured(&ids, &valid),
            vec![ProductId::new(3), ProductId::new(1)]
        );
    }

    #[test]
    fn test_move_item() {
        let mut ids = vec![1, 2, 3];
        assert!(move_item(&mut ids, |i| *i, &2, Direction::Up));
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(!move_item(&mut ids, |i| *i, &2, Direction::Up));
        assert!(move_item(&mut ids, |i| *i, &1, Direction::Down));
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(!move_item(&mut ids, |i| *i, &1, Direction::Down));
        assert!(!move_item(&mut ids, |i| *i, &7, Direction::Down));
    }
}

//! Olfactory notes and layering duos.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rayha_core::catalog::Product;
use rayha_core::olfactory::{DEFAULT_NOTES, NotePyramid, OlfactoryFamily, best_family};
use rayha_core::{LayeringDuoId, OlfactoryNoteId, ProductId, Pyramid};

/// A note of the back-office dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OlfactoryNote {
    pub id: OlfactoryNoteId,
    pub label: String,
    pub pyramid: Pyramid,
    pub family: Option<OlfactoryFamily>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating, editing or importing a note.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OlfactoryNoteInput {
    pub label: String,
    pub pyramid: Pyramid,
    #[serde(default)]
    pub family: Option<OlfactoryFamily>,
}

impl OlfactoryNoteInput {
    /// Trim the label. Returns `None` when nothing is left.
    #[must_use]
    pub fn normalize(mut self) -> Option<Self> {
        self.label = self.label.trim().to_owned();
        (!self.label.is_empty()).then_some(self)
    }

    /// Fill in the family from the label when none was chosen.
    ///
    /// Labels no family rule recognizes stay unclassified.
    #[must_use]
    pub fn with_inferred_family(mut self) -> Self {
        if self.family.is_none() {
            let note = [self.label.clone()];
            let mut notes = NotePyramid::default();
            match self.pyramid {
                Pyramid::Tete => notes.tete = &note,
                Pyramid::Coeur => notes.coeur = &note,
                Pyramid::Fond => notes.fond = &note,
            }
            self.family = best_family(notes, &[]);
        }
        self
    }

    /// The default note dictionary, classified.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        DEFAULT_NOTES
            .iter()
            .map(|(pyramid, label)| {
                Self {
                    label: (*label).to_owned(),
                    pyramid: *pyramid,
                    family: None,
                }
                .with_inferred_family()
            })
            .collect()
    }
}

/// Two fragrances sold together to be worn layered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeringDuo {
    pub id: LayeringDuoId,
    pub name: String,
    pub description: Option<String>,
    pub product_id_a: ProductId,
    pub product_id_b: ProductId,
    pub is_active: bool,
    pub sort_order: i32,
    /// Bundle price. When unset the duo costs the sum of both products.
    pub custom_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or editing a duo.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeringDuoInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub product_id_a: ProductId,
    pub product_id_b: ProductId,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub custom_price: Option<Decimal>,
}

const fn default_active() -> bool {
    true
}

/// A duo with both products resolved, as shown on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeringDuoView {
    #[serde(flatten)]
    pub duo: LayeringDuo,
    pub product_a: Product,
    pub product_b: Product,
    pub price: Decimal,
}

impl LayeringDuoView {
    #[must_use]
    pub fn new(duo: LayeringDuo, product_a: Product, product_b: Product) -> Self {
        let price = duo
            .custom_price
            .unwrap_or(product_a.price + product_b.price);
        Self {
            duo,
            product_a,
            product_b,
            price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(label: &str, family: Option<OlfactoryFamily>) -> OlfactoryNoteInput {
        OlfactoryNoteInput {
            label: label.to_owned(),
            pyramid: Pyramid::Fond,
            family,
        }
    }

    #[test]
    fn test_normalize_trims_and_rejects_blank() {
        assert_eq!(input("  Vanille ", None).normalize().map(|n| n.label), Some("Vanille".to_owned()));
        assert_eq!(input("   ", None).normalize(), None);
    }

    #[test]
    fn test_inferred_family_keeps_explicit_choice() {
        let note = input("Vanille", Some(OlfactoryFamily::Oriental)).with_inferred_family();
        assert_eq!(note.family, Some(OlfactoryFamily::Oriental));
    }

    #[test]
    fn test_inferred_family_from_keyword() {
        let note = input("Bois de santal", None).with_inferred_family();
        assert_eq!(note.family, Some(OlfactoryFamily::Boise));
    }

    #[test]
    fn test_default_notes_are_classified() {
        let notes = OlfactoryNoteInput::defaults();
        assert_eq!(notes.len(), DEFAULT_NOTES.len());
        let neroli = notes.iter().find(|n| n.label == "Néroli");
        assert_eq!(neroli.and_then(|n| n.family), Some(OlfactoryFamily::Floral));
    }

    #[test]
    fn test_inferred_family_unknown_label() {
        let note = input("Xyzzy", None).with_inferred_family();
        assert_eq!(note.family, None);
    }
}

//! Olfactory families and note classification.
//!
//! Notes are free text typed by the back-office ("Rose de Mai", "Vétiver de
//! Haïti", ...). A family matches a note when one of its keywords appears in
//! the lowercased note.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Pyramid;

/// Olfactory family of a fragrance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OlfactoryFamily {
    #[serde(rename = "Floral")]
    Floral,
    #[serde(rename = "Boisé")]
    Boise,
    #[serde(rename = "Gourmand")]
    Gourmand,
    #[serde(rename = "Oriental")]
    Oriental,
    #[serde(rename = "Épicé")]
    Epice,
    #[serde(rename = "Cuiré")]
    Cuire,
    #[serde(rename = "Frais/Aquatique")]
    FraisAquatique,
}

impl OlfactoryFamily {
    /// Display label, also the value stored in `products.families`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Floral => "Floral",
            Self::Boise => "Boisé",
            Self::Gourmand => "Gourmand",
            Self::Oriental => "Oriental",
            Self::Epice => "Épicé",
            Self::Cuire => "Cuiré",
            Self::FraisAquatique => "Frais/Aquatique",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        FAMILY_RULES
            .iter()
            .find(|(family, _)| *family == self)
            .map_or(&[], |(_, keywords)| keywords)
    }

    fn matches(self, note: &str) -> bool {
        self.keywords().iter().any(|k| note.contains(k))
    }
}

impl fmt::Display for OlfactoryFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OlfactoryFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FAMILY_RULES
            .iter()
            .map(|(family, _)| *family)
            .find(|family| family.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown olfactory family: {s}"))
    }
}

/// Families in tie-break order, with their keywords.
const FAMILY_RULES: [(OlfactoryFamily, &[&str]); 7] = [
    (
        OlfactoryFamily::Floral,
        &[
            "rose", "jasmin", "iris", "tuberose", "tubéreuse", "pivoine", "magnolia", "freesia",
            "fleur d'oranger", "ylang", "géranium", "geranium", "gardénia", "gardenia",
            "violette", "cyclamen", "muguet", "fleur de lys", "néroli", "neroli",
        ],
    ),
    (
        OlfactoryFamily::Boise,
        &[
            "santal", "cèdre", "cedre", "vétiver", "vetiver", "oud", "patchouli",
            "mousse de chêne", "mousse_chene", "bois",
        ],
    ),
    (
        OlfactoryFamily::Gourmand,
        &[
            "vanille", "caramel", "chocolat", "praliné", "praline", "miel", "fève tonka",
            "tonka", "café", "cafe", "noix de coco",
        ],
    ),
    (
        OlfactoryFamily::Oriental,
        &["ambre", "encens", "myrrhe", "benjoin", "musc", "ciste", "labdanum"],
    ),
    (
        OlfactoryFamily::Epice,
        &["poivre", "cannelle", "cardamome", "safran", "girofle", "muscade", "gingembre"],
    ),
    (
        OlfactoryFamily::Cuire,
        &["cuir", "daim", "tabac", "suede", "castorium", "civette"],
    ),
    (
        OlfactoryFamily::FraisAquatique,
        &[
            "marin", "calone", "menthe", "aldéhyde", "aldehyde", "pomme verte", "pomme_verte",
            "citron", "bergamote", "mandarine", "pamplemousse", "lime", "yuzu", "verveine",
            "citronnelle", "lavande", "rhubarbe",
        ],
    ),
];

/// The three levels of a fragrance's notes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotePyramid<'a> {
    pub tete: &'a [String],
    pub coeur: &'a [String],
    pub fond: &'a [String],
}

impl NotePyramid<'_> {
    fn weighted(&self) -> Vec<(String, u32)> {
        let level = |notes: &[String], pyramid: Pyramid| {
            notes
                .iter()
                .map(move |n| (n.to_lowercase(), pyramid.weight()))
                .collect::<Vec<_>>()
        };
        let mut all = level(self.fond, Pyramid::Fond);
        all.extend(level(self.coeur, Pyramid::Coeur));
        all.extend(level(self.tete, Pyramid::Tete));
        all
    }

    fn is_empty(&self) -> bool {
        self.tete.is_empty() && self.coeur.is_empty() && self.fond.is_empty()
    }
}

/// Every family present in the notes, in tie-break order.
///
/// Falls back to [`OlfactoryFamily::Floral`] when nothing matches.
#[must_use]
pub fn classify(notes: NotePyramid<'_>) -> Vec<OlfactoryFamily> {
    let lowered: Vec<String> = notes.weighted().into_iter().map(|(n, _)| n).collect();
    let families: Vec<OlfactoryFamily> = FAMILY_RULES
        .iter()
        .map(|(family, _)| *family)
        .filter(|family| lowered.iter().any(|n| family.matches(n)))
        .collect();
    if families.is_empty() {
        vec![OlfactoryFamily::Floral]
    } else {
        families
    }
}

/// Families sorted by score, highest first. Ties keep rule order.
///
/// Each matching note adds its pyramid weight (fond 3, cœur 2, tête 1). A
/// family already declared on the product gets a half-point bonus. Scores are
/// kept doubled so the bonus stays integral.
fn ranked(notes: &NotePyramid<'_>, existing: &[OlfactoryFamily]) -> Vec<(OlfactoryFamily, u32)> {
    let weighted = notes.weighted();
    let mut scores: Vec<(OlfactoryFamily, u32)> = FAMILY_RULES
        .iter()
        .map(|(family, _)| {
            let notes_score: u32 = weighted
                .iter()
                .filter(|(note, _)| family.matches(note))
                .map(|(_, weight)| weight * 2)
                .sum();
            let bonus = u32::from(existing.contains(family));
            (*family, notes_score + bonus)
        })
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1));
    scores
}

/// The single most representative family.
///
/// A product declared with exactly one family keeps it. Otherwise the notes
/// are scored. Returns `None` only when there are no notes and no declared
/// family.
#[must_use]
pub fn best_family(
    notes: NotePyramid<'_>,
    existing: &[OlfactoryFamily],
) -> Option<OlfactoryFamily> {
    if let [only] = existing {
        return Some(*only);
    }
    if notes.is_empty() {
        return existing.first().copied();
    }
    match ranked(&notes, existing).first() {
        Some(&(family, score)) if score > 0 => Some(family),
        _ => existing.first().copied(),
    }
}

/// Up to `max` families by score, falling back to the declared families or
/// Floral.
#[must_use]
pub fn top_families(
    notes: NotePyramid<'_>,
    existing: &[OlfactoryFamily],
    max: usize,
) -> Vec<OlfactoryFamily> {
    if notes.is_empty() {
        return existing.iter().copied().take(max).collect();
    }
    let result: Vec<OlfactoryFamily> = ranked(&notes, existing)
        .into_iter()
        .filter(|(_, score)| *score > 0)
        .map(|(family, _)| family)
        .take(max)
        .collect();
    if !result.is_empty() {
        return result;
    }
    if existing.is_empty() {
        vec![OlfactoryFamily::Floral]
    } else {
        existing.iter().copied().take(max).collect()
    }
}

/// Notes imported by "import defaults" in the back-office.
pub const DEFAULT_NOTES: &[(Pyramid, &str)] = &[
    (Pyramid::Tete, "Citron"),
    (Pyramid::Tete, "Bergamote"),
    (Pyramid::Tete, "Mandarine"),
    (Pyramid::Tete, "Pamplemousse"),
    (Pyramid::Tete, "Orange sanguine"),
    (Pyramid::Tete, "Yuzu"),
    (Pyramid::Tete, "Verveine"),
    (Pyramid::Tete, "Baies de genièvre"),
    (Pyramid::Tete, "Poivre rose"),
    (Pyramid::Tete, "Menthe poivrée"),
    (Pyramid::Tete, "Lavande"),
    (Pyramid::Tete, "Néroli"),
    (Pyramid::Tete, "Pomme verte"),
    (Pyramid::Tete, "Framboise"),
    (Pyramid::Tete, "Cassis"),
    (Pyramid::Tete, "Aldéhydes"),
    (Pyramid::Tete, "Accord marin"),
    (Pyramid::Tete, "Rhubarbe"),
    (Pyramid::Coeur, "Rose de Mai"),
    (Pyramid::Coeur, "Rose Damascena"),
    (Pyramid::Coeur, "Jasmin Sambac"),
    (Pyramid::Coeur, "Iris de Toscane"),
    (Pyramid::Coeur, "Tubéreuse"),
    (Pyramid::Coeur, "Fleur d'oranger"),
    (Pyramid::Coeur, "Ylang-Ylang"),
    (Pyramid::Coeur, "Géranium"),
    (Pyramid::Coeur, "Pivoine"),
    (Pyramid::Coeur, "Violette"),
    (Pyramid::Coeur, "Cannelle"),
    (Pyramid::Coeur, "Cardamome"),
    (Pyramid::Coeur, "Safran"),
    (Pyramid::Coeur, "Gingembre"),
    (Pyramid::Coeur, "Thé vert"),
    (Pyramid::Fond, "Bois de Santal"),
    (Pyramid::Fond, "Cèdre de l'Atlas"),
    (Pyramid::Fond, "Patchouli"),
    (Pyramid::Fond, "Vétiver de Haïti"),
    (Pyramid::Fond, "Oud"),
    (Pyramid::Fond, "Musc blanc"),
    (Pyramid::Fond, "Ambre gris"),
    (Pyramid::Fond, "Vanille Bourbon"),
    (Pyramid::Fond, "Fève Tonka"),
    (Pyramid::Fond, "Benjoin"),
    (Pyramid::Fond, "Mousse de chêne"),
    (Pyramid::Fond, "Cuir"),
    (Pyramid::Fond, "Tabac blond"),
    (Pyramid::Fond, "Encens"),
    (Pyramid::Fond, "Caramel"),
    (Pyramid::Fond, "Café"),
    (Pyramid::Fond, "Miel"),
];

//! Keyword routing of questions to disease categories.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    AcuteKidneyInjury,
    ChronicKidneyDisease,
    NephroticSyndrome,
    Glomerulonephritis,
    ElectrolyteDisorder,
    Unknown,
}

impl Category {
    /// Every category that owns a document collection, in routing priority order.
    pub const KNOWN: [Self; 5] = [
        Self::AcuteKidneyInjury,
        Self::ChronicKidneyDisease,
        Self::NephroticSyndrome,
        Self::Glomerulonephritis,
        Self::ElectrolyteDisorder,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcuteKidneyInjury => "AcuteKidneyInjury",
            Self::ChronicKidneyDisease => "ChronicKidneyDisease",
            Self::NephroticSyndrome => "NephroticSyndrome",
            Self::Glomerulonephritis => "Glomerulonephritis",
            Self::ElectrolyteDisorder => "ElectrolyteDisorder",
            Self::Unknown => "Unknown",
        }
    }

    /// Short name used in storage names and on the command line. `None` for `Unknown`.
    #[must_use]
    pub fn slug(self) -> Option<&'static str> {
        match self {
            Self::AcuteKidneyInjury => Some("aki"),
            Self::ChronicKidneyDisease => Some("ckd"),
            Self::NephroticSyndrome => Some("ns"),
            Self::Glomerulonephritis => Some("gn"),
            Self::ElectrolyteDisorder => Some("electrolyte"),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::KNOWN
            .into_iter()
            .find(|c| c.slug().is_some_and(|s| s.eq_ignore_ascii_case(slug)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts a slug (`aki`) or the full name (`AcuteKidneyInjury`), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::from_slug(s)
            .or_else(|| {
                Self::KNOWN
                    .into_iter()
                    .find(|c| c.as_str().eq_ignore_ascii_case(s))
            })
            .ok_or_else(|| {
                let slugs: Vec<&str> = Self::KNOWN.iter().filter_map(|c| c.slug()).collect();
                format!("unknown category {s:?}, expected one of: {}", slugs.join(", "))
            })
    }
}

const DEFAULT_TRIGGERS: [(Category, &[&str]); 5] = [
    (Category::AcuteKidneyInjury, &["급성", "aki"]),
    (Category::ChronicKidneyDisease, &["만성", "ckd"]),
    (Category::NephroticSyndrome, &["신증후군", "nephrotic"]),
    (Category::Glomerulonephritis, &["사구체", "glomerulo"]),
    (Category::ElectrolyteDisorder, &["전해질", "electrolyte"]),
];

static DEFAULT_TABLE: LazyLock<KeywordTable> = LazyLock::new(KeywordTable::default);

/// Ordered (category, triggers) pairs. Earlier entries win when several match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<(Category, Vec<String>)>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_TRIGGERS
                .iter()
                .map(|(c, triggers)| (*c, triggers.iter().map(|t| (*t).to_owned()).collect())),
        )
    }
}

impl KeywordTable {
    /// Build a table from entries in priority order.
    ///
    /// Triggers are lower-cased; empty triggers are dropped since they would match everything.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (Category, Vec<String>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(category, triggers)| (category, normalize(triggers)))
            .collect();
        Self { entries }
    }

    /// Append triggers to an existing entry without changing its priority.
    ///
    /// Returns `false` when the table has no entry for `category`.
    pub fn extend(&mut self, category: Category, triggers: impl IntoIterator<Item = String>) -> bool {
        let Some((_, existing)) = self.entries.iter_mut().find(|(c, _)| *c == category) else {
            return false;
        };
        for trigger in normalize(triggers) {
            if !existing.contains(&trigger) {
                existing.push(trigger);
            }
        }
        true
    }

    #[must_use]
    pub fn entries(&self) -> &[(Category, Vec<String>)] {
        &self.entries
    }

    #[must_use]
    pub fn triggers(&self, category: Category) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(&[], |(_, t)| t.as_slice())
    }

    #[must_use]
    pub fn route(&self, question: &str) -> Category {
        let question = question.to_lowercase();
        self.entries
            .iter()
            .find(|(_, triggers)| triggers.iter().any(|t| question.contains(t.as_str())))
            .map_or(Category::Unknown, |(category, _)| *category)
    }
}

fn normalize(triggers: impl IntoIterator<Item = String>) -> Vec<String> {
    triggers
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Route with the built-in keyword table.
#[must_use]
pub fn route(question: &str) -> Category {
    DEFAULT_TABLE.route(question)
}

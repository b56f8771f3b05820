//! Rule-based scoring of renal lab values.
//!
//! Each scored field has exactly one threshold rule. A triggered rule adds its
//! weight to the total and produces one [`Finding`]; findings keep the order of
//! [`RULES`]. Fields without a rule are carried in the panel but never scored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Shown when no rule triggered.
pub const INSUFFICIENT_DATA: &str = "insufficient data, add more fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LabField {
    Creatinine,
    Egfr,
    Albumin,
    Proteinuria,
    Bun,
    Na,
    K,
    Cl,
    Co2,
    Ca,
    Phosphorus,
    Hb,
    Pth,
    VitaminD,
    Alp,
    Ldh,
}

impl LabField {
    pub const ALL: [Self; 16] = [
        Self::Creatinine,
        Self::Egfr,
        Self::Albumin,
        Self::Proteinuria,
        Self::Bun,
        Self::Na,
        Self::K,
        Self::Cl,
        Self::Co2,
        Self::Ca,
        Self::Phosphorus,
        Self::Hb,
        Self::Pth,
        Self::VitaminD,
        Self::Alp,
        Self::Ldh,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Creatinine => "Creatinine",
            Self::Egfr => "eGFR",
            Self::Albumin => "Albumin",
            Self::Proteinuria => "Proteinuria",
            Self::Bun => "BUN",
            Self::Na => "Na",
            Self::K => "K",
            Self::Cl => "Cl",
            Self::Co2 => "CO2",
            Self::Ca => "Ca",
            Self::Phosphorus => "Phosphorus",
            Self::Hb => "Hb",
            Self::Pth => "PTH",
            Self::VitaminD => "VitaminD",
            Self::Alp => "ALP",
            Self::Ldh => "LDH",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Creatinine | Self::Bun | Self::Ca | Self::Phosphorus => "mg/dL",
            Self::Egfr => "mL/min/1.73m²",
            Self::Albumin | Self::Hb => "g/dL",
            Self::Proteinuria => "g/day",
            Self::Na | Self::K | Self::Cl | Self::Co2 => "mEq/L",
            Self::Pth => "pg/mL",
            Self::VitaminD => "ng/mL",
            Self::Alp | Self::Ldh => "U/L",
        }
    }

    /// Case-insensitive lookup by display name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn rule(self) -> Option<&'static LabRule> {
        RULES.iter().find(|r| r.field == self)
    }
}

impl fmt::Display for LabField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Above(f64),
    Below(f64),
    Outside { low: f64, high: f64 },
}

impl Threshold {
    /// Strict comparison: a value equal to a bound never triggers.
    #[must_use]
    pub fn is_triggered(self, value: f64) -> bool {
        match self {
            Self::Above(limit) => value > limit,
            Self::Below(limit) => value < limit,
            Self::Outside { low, high } => value < low || value > high,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above(limit) => write!(f, "> {limit}"),
            Self::Below(limit) => write!(f, "< {limit}"),
            Self::Outside { low, high } => write!(f, "outside {low}-{high}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabRule {
    pub field: LabField,
    pub threshold: Threshold,
    pub weight: u32,
    pub meaning: &'static str,
}

pub const RULES: [LabRule; 9] = [
    LabRule {
        field: LabField::Creatinine,
        threshold: Threshold::Above(1.2),
        weight: 20,
        meaning: "elevated creatinine suggests reduced kidney function",
    },
    LabRule {
        field: LabField::Egfr,
        threshold: Threshold::Below(60.0),
        weight: 20,
        meaning: "reduced filtration rate is consistent with chronic kidney disease",
    },
    LabRule {
        field: LabField::Albumin,
        threshold: Threshold::Below(3.0),
        weight: 10,
        meaning: "low albumin may accompany nephrotic syndrome",
    },
    LabRule {
        field: LabField::Proteinuria,
        threshold: Threshold::Above(1.0),
        weight: 10,
        meaning: "significant proteinuria suggests glomerular injury",
    },
    LabRule {
        field: LabField::Bun,
        threshold: Threshold::Above(20.0),
        weight: 10,
        meaning: "elevated urea nitrogen may reflect reduced clearance",
    },
    LabRule {
        field: LabField::Na,
        threshold: Threshold::Outside {
            low: 135.0,
            high: 145.0,
        },
        weight: 10,
        meaning: "sodium imbalance",
    },
    LabRule {
        field: LabField::K,
        threshold: Threshold::Outside {
            low: 3.5,
            high: 5.0,
        },
        weight: 10,
        meaning: "potassium imbalance",
    },
    LabRule {
        field: LabField::Ca,
        threshold: Threshold::Outside {
            low: 8.5,
            high: 10.5,
        },
        weight: 5,
        meaning: "calcium imbalance",
    },
    LabRule {
        field: LabField::Phosphorus,
        threshold: Threshold::Above(4.5),
        weight: 5,
        meaning: "high phosphorus is common in advanced kidney disease",
    },
];

/// Entered lab values. Absent fields are simply not present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabPanel {
    values: BTreeMap<LabField, f64>,
}

impl LabPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: LabField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: LabField, value: f64) {
        self.values.insert(field, value);
    }

    #[must_use]
    pub fn get(&self, field: LabField) -> Option<f64> {
        self.values.get(&field).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse raw `(name, text)` pairs as entered on a form.
    ///
    /// Blank text means the field was left empty and is skipped. Every pair is
    /// checked, and all offending pairs are reported together. A repeated field
    /// keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::InvalidInput`] listing each unknown field name and
    /// each value that is not a finite number.
    pub fn from_raw<I, K, V>(pairs: I) -> Result<Self, LabError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut panel = Self::new();
        let mut invalid = Vec::new();

        for (name, text) in pairs {
            let (name, text) = (name.as_ref().trim(), text.as_ref().trim());
            if text.is_empty() {
                continue;
            }
            let Some(field) = LabField::parse(name) else {
                invalid.push(InvalidField {
                    name: name.to_owned(),
                    value: text.to_owned(),
                    reason: InvalidReason::UnknownField,
                });
                continue;
            };
            match text.parse::<f64>() {
                Ok(value) if value.is_finite() => panel.set(field, value),
                _ => invalid.push(InvalidField {
                    name: field.name().to_owned(),
                    value: text.to_owned(),
                    reason: InvalidReason::NotANumber,
                }),
            }
        }

        if invalid.is_empty() {
            Ok(panel)
        } else {
            Err(LabError::InvalidInput(invalid))
        }
    }
}

impl FromIterator<(LabField, f64)> for LabPanel {
    fn from_iter<T: IntoIterator<Item = (LabField, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    UnknownField,
    NotANumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidField {
    pub name: String,
    pub value: String,
    pub reason: InvalidReason,
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            InvalidReason::UnknownField => write!(f, "{}: unknown lab field", self.name),
            InvalidReason::NotANumber => {
                write!(f, "{}: {:?} is not a number", self.name, self.value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabError {
    #[error("invalid lab input: {}", join_fields(.0))]
    InvalidInput(Vec<InvalidField>),
}

impl LabError {
    #[must_use]
    pub fn fields(&self) -> &[InvalidField] {
        match self {
            Self::InvalidInput(fields) => fields,
        }
    }
}

fn join_fields(fields: &[InvalidField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub field: LabField,
    pub value: f64,
    pub weight: u32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Unremarkable,
    Borderline,
    Suspected,
}

impl Severity {
    #[must_use]
    pub fn summary(self) -> &'static str {
        match self {
            Self::Unremarkable => "no clear disease association for the entered values",
            Self::Borderline => "some values are abnormal; further testing may be needed",
            Self::Suspected => "kidney disease is suspected; detailed diagnostic work-up recommended",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unremarkable => "Unremarkable",
            Self::Borderline => "Borderline",
            Self::Suspected => "Suspected",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub findings: Vec<Finding>,
    pub total: u32,
    /// Set only when no rule triggered.
    pub advisory: Option<&'static str>,
}

impl ScoreReport {
    /// Band by the number of triggered findings.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self.findings.len() {
            0 => Severity::Unremarkable,
            1 => Severity::Borderline,
            _ => Severity::Suspected,
        }
    }
}

#[must_use]
pub fn evaluate(panel: &LabPanel) -> ScoreReport {
    let findings: Vec<Finding> = RULES
        .iter()
        .filter_map(|rule| {
            let value = panel.get(rule.field)?;
            rule.threshold.is_triggered(value).then(|| Finding {
                field: rule.field,
                value,
                weight: rule.weight,
                message: format!(
                    "{} {value} {} ({}): {}",
                    rule.field,
                    rule.field.unit(),
                    rule.threshold,
                    rule.meaning
                ),
            })
        })
        .collect();

    let total = findings.iter().map(|f| f.weight).sum();
    let advisory = findings.is_empty().then_some(INSUFFICIENT_DATA);
    tracing::debug!(fields = panel.len(), findings = findings.len(), total, "lab panel scored");

    ScoreReport {
        findings,
        total,
        advisory,
    }
}

/// Parse raw form pairs and score them.
///
/// # Errors
///
/// See [`LabPanel::from_raw`].
pub fn evaluate_raw<I, K, V>(pairs: I) -> Result<ScoreReport, LabError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    LabPanel::from_raw(pairs).map(|panel| evaluate(&panel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(report: &ScoreReport) -> Vec<LabField> {
        report.findings.iter().map(|f| f.field).collect()
    }

    #[test]
    fn empty_panel_gives_advisory() {
        let report = evaluate(&LabPanel::new());
        assert_eq!(report.total, 0);
        assert!(report.findings.is_empty());
        assert_eq!(report.advisory, Some(INSUFFICIENT_DATA));
        assert_eq!(report.severity(), Severity::Unremarkable);
    }

    #[test]
    fn single_creatinine_finding() {
        let report = evaluate(&LabPanel::new().with(LabField::Creatinine, 1.3));
        assert_eq!(report.total, 20);
        assert_eq!(fields(&report), vec![LabField::Creatinine]);
        assert!(report.advisory.is_none());
        assert_eq!(report.severity(), Severity::Borderline);
    }

    #[test]
    fn findings_follow_rule_order() {
        let panel = LabPanel::new()
            .with(LabField::Na, 150.0)
            .with(LabField::Egfr, 55.0)
            .with(LabField::Creatinine, 1.3);
        let report = evaluate(&panel);
        assert_eq!(report.total, 50);
        assert_eq!(
            fields(&report),
            vec![LabField::Creatinine, LabField::Egfr, LabField::Na]
        );
        assert_eq!(report.severity(), Severity::Suspected);
    }

    #[test]
    fn comparisons_are_strict() {
        let at_bounds = LabPanel::new()
            .with(LabField::Creatinine, 1.2)
            .with(LabField::Egfr, 60.0)
            .with(LabField::Albumin, 3.0)
            .with(LabField::Proteinuria, 1.0)
            .with(LabField::Bun, 20.0)
            .with(LabField::Na, 135.0)
            .with(LabField::K, 5.0)
            .with(LabField::Ca, 10.5)
            .with(LabField::Phosphorus, 4.5);
        let report = evaluate(&at_bounds);
        assert_eq!(report.total, 0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn egfr_sixty_does_not_trigger() {
        assert_eq!(evaluate(&LabPanel::new().with(LabField::Egfr, 60.0)).total, 0);
    }

    #[test]
    fn two_sided_rules_trigger_on_both_sides() {
        for (field, low, high) in [
            (LabField::Na, 134.9, 145.1),
            (LabField::K, 3.4, 5.1),
            (LabField::Ca, 8.4, 10.6),
        ] {
            assert_eq!(evaluate(&LabPanel::new().with(field, low)).findings.len(), 1);
            assert_eq!(evaluate(&LabPanel::new().with(field, high)).findings.len(), 1);
        }
    }

    #[test]
    fn every_rule_triggered_sums_weights() {
        let panel = LabPanel::new()
            .with(LabField::Creatinine, 3.0)
            .with(LabField::Egfr, 20.0)
            .with(LabField::Albumin, 2.0)
            .with(LabField::Proteinuria, 4.0)
            .with(LabField::Bun, 60.0)
            .with(LabField::Na, 120.0)
            .with(LabField::K, 6.5)
            .with(LabField::Ca, 7.0)
            .with(LabField::Phosphorus, 7.0);
        let report = evaluate(&panel);
        assert_eq!(report.total, 100);
        assert_eq!(fields(&report), RULES.iter().map(|r| r.field).collect::<Vec<_>>());
    }

    #[test]
    fn unscored_fields_are_carried_but_ignored() {
        let panel = LabPanel::new()
            .with(LabField::Hb, 7.0)
            .with(LabField::Pth, 900.0)
            .with(LabField::Ldh, 2000.0);
        assert_eq!(panel.len(), 3);
        assert_eq!(evaluate(&panel).total, 0);
        assert!(LabField::Hb.rule().is_none());
        assert!(LabField::Creatinine.rule().is_some());
    }

    #[test]
    fn out_of_range_values_are_scored() {
        let report = evaluate(&LabPanel::new().with(LabField::Creatinine, -5.0).with(LabField::Bun, 1e6));
        assert_eq!(fields(&report), vec![LabField::Bun]);
    }

    #[test]
    fn evaluate_is_idempotent() {
        let panel = LabPanel::new()
            .with(LabField::K, 6.0)
            .with(LabField::Albumin, 2.5);
        assert_eq!(evaluate(&panel), evaluate(&panel));
    }

    #[test]
    fn finding_message_names_field_value_unit_threshold() {
        let report = evaluate(&LabPanel::new().with(LabField::Creatinine, 1.3));
        let message = &report.findings[0].message;
        assert!(message.starts_with("Creatinine 1.3 mg/dL (> 1.2)"), "{message}");
    }

    #[test]
    fn field_names_parse_case_insensitively() {
        assert_eq!(LabField::parse("egfr"), Some(LabField::Egfr));
        assert_eq!(LabField::parse(" BUN "), Some(LabField::Bun));
        assert_eq!(LabField::parse("vitamind"), Some(LabField::VitaminD));
        assert_eq!(LabField::parse("glucose"), None);
        for field in LabField::ALL {
            assert_eq!(LabField::parse(field.name()), Some(field));
        }
    }

    #[test]
    fn from_raw_skips_blank_values() {
        let panel = LabPanel::from_raw([("Creatinine", "1.3"), ("eGFR", ""), ("Na", "  ")]).unwrap();
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.get(LabField::Creatinine), Some(1.3));
        assert_eq!(panel.get(LabField::Egfr), None);
    }

    #[test]
    fn from_raw_collects_every_invalid_field() {
        let err = LabPanel::from_raw([
            ("Creatinine", "abc"),
            ("eGFR", "55"),
            ("Glucose", "90"),
            ("K", "NaN"),
            ("Na", "inf"),
        ])
        .unwrap_err();
        let names: Vec<&str> = err.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Creatinine", "Glucose", "K", "Na"]);
        assert_eq!(err.fields()[1].reason, InvalidReason::UnknownField);
        assert_eq!(err.fields()[0].reason, InvalidReason::NotANumber);

        let text = err.to_string();
        assert!(text.contains("Creatinine"));
        assert!(text.contains("Glucose: unknown lab field"));
    }

    #[test]
    fn repeated_field_keeps_last_value() {
        let panel = LabPanel::from_raw([("K", "4.0"), ("k", "6.0")]).unwrap();
        assert_eq!(panel.get(LabField::K), Some(6.0));
    }

    #[test]
    fn evaluate_raw_scores_parsed_panel() {
        let report = evaluate_raw([("creatinine", "1.3"), ("egfr", "55"), ("na", "150")]).unwrap();
        assert_eq!(report.total, 50);
        assert!(evaluate_raw([("Creatinine", "high")]).is_err());
    }

    #[test]
    fn severity_summaries() {
        assert!(Severity::Suspected.summary().contains("suspected"));
        assert_eq!(Severity::Borderline.to_string(), "Borderline");
    }

    mod proptest_lab {
        use super::*;
        use proptest::prelude::*;

        fn panel_strategy() -> impl Strategy<Value = LabPanel> {
            prop::collection::vec(
                (prop::sample::select(LabField::ALL.to_vec()), -1000.0f64..1000.0),
                0..24,
            )
            .prop_map(|values| values.into_iter().collect())
        }

        proptest! {
            #[test]
            fn total_is_sum_of_finding_weights(panel in panel_strategy()) {
                let report = evaluate(&panel);
                prop_assert_eq!(report.total, report.findings.iter().map(|f| f.weight).sum::<u32>());
                prop_assert!(report.total <= 100);
                prop_assert_eq!(report.advisory.is_some(), report.findings.is_empty());
            }

            #[test]
            fn findings_never_out_of_rule_order(panel in panel_strategy()) {
                let report = evaluate(&panel);
                let positions: Vec<usize> = report
                    .findings
                    .iter()
                    .filter_map(|f| RULES.iter().position(|r| r.field == f.field))
                    .collect();
                prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            }

            #[test]
            fn evaluation_is_repeatable(panel in panel_strategy()) {
                prop_assert_eq!(evaluate(&panel), evaluate(&panel));
            }
        }
    }
}

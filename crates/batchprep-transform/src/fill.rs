//! Missing-cell filling with constant or name-derived defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use batchprep_model::{Batch, Value};

/// A column-name rule: matching columns get `fill` for missing cells.
///
/// Matching is case-insensitive; a rule matches if any `contains` fragment
/// occurs in the name or the name ends with any `ends_with` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRule {
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub ends_with: Vec<String>,
    pub fill: String,
}

impl NameRule {
    pub fn matches(&self, column: &str) -> bool {
        let name = column.to_lowercase();
        self.contains
            .iter()
            .any(|fragment| name.contains(&fragment.to_lowercase()))
            || self
                .ends_with
                .iter()
                .any(|suffix| name.ends_with(&suffix.to_lowercase()))
    }
}

/// Identifier, date, flag, state, and ZIP defaults; first match wins.
pub fn default_name_rules() -> Vec<NameRule> {
    let rule = |contains: &[&str], ends_with: &[&str], fill: &str| NameRule {
        contains: contains.iter().map(|s| (*s).to_string()).collect(),
        ends_with: ends_with.iter().map(|s| (*s).to_string()).collect(),
        fill: fill.to_string(),
    };
    vec![
        rule(&["number"], &["id"], "-1"),
        rule(&["date"], &[], "1900-01-01"),
        rule(&["flag"], &[], "N"),
        rule(&["state"], &[], "NA"),
        rule(&["zip"], &[], "00000"),
    ]
}

fn default_fallback() -> String {
    "Unknown".to_string()
}

/// How the fill value for a column is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FillPolicy {
    /// Same token for every column.
    Constant { token: String },
    /// First matching [`NameRule`], else `fallback`.
    ByColumnName {
        #[serde(default = "default_name_rules")]
        rules: Vec<NameRule>,
        #[serde(default = "default_fallback")]
        fallback: String,
    },
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self::ByColumnName {
            rules: default_name_rules(),
            fallback: default_fallback(),
        }
    }
}

impl FillPolicy {
    /// The token used for missing cells of `column`.
    pub fn fill_for(&self, column: &str) -> &str {
        match self {
            Self::Constant { token } => token,
            Self::ByColumnName { rules, fallback } => rules
                .iter()
                .find(|rule| rule.matches(column))
                .map_or(fallback.as_str(), |rule| rule.fill.as_str()),
        }
    }
}

/// Replaces [`Value::Missing`] cells with policy-chosen text.
#[derive(Debug, Clone, Default)]
pub struct MissingFiller {
    policy: FillPolicy,
    /// Restrict filling to these columns; `None` means every column.
    only: Option<Vec<String>>,
    exclude: Vec<String>,
}

impl MissingFiller {
    pub fn new(policy: FillPolicy) -> Self {
        Self {
            policy,
            only: None,
            exclude: Vec::new(),
        }
    }

    /// Fill every missing cell with `token`.
    pub fn constant(token: impl Into<String>) -> Self {
        Self::new(FillPolicy::Constant {
            token: token.into(),
        })
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Option<Vec<String>>) -> Self {
        self.only = columns;
        self
    }

    #[must_use]
    pub fn with_excluded(mut self, columns: Vec<String>) -> Self {
        self.exclude = columns;
        self
    }

    pub fn policy(&self) -> &FillPolicy {
        &self.policy
    }

    /// Fills missing cells in place; returns filled-cell counts per column.
    pub fn fill(&self, batch: &mut Batch) -> BTreeMap<String, usize> {
        let targets: Vec<(usize, String, Value)> = batch
            .schema()
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| {
                self.only.as_ref().is_none_or(|only| only.contains(name))
                    && !self.exclude.contains(name)
            })
            .map(|(position, name)| {
                let fill = Value::text(self.policy.fill_for(name));
                (position, name.clone(), fill)
            })
            .collect();

        let mut filled = BTreeMap::new();
        for row in batch.rows_mut() {
            for (position, name, fill) in &targets {
                if let Some(cell) = row.get_mut(*position)
                    && cell.is_missing()
                {
                    *cell = fill.clone();
                    *filled.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_by_name() {
        let policy = FillPolicy::default();
        assert_eq!(policy.fill_for("disasterNumber"), "-1");
        assert_eq!(policy.fill_for("registrationId"), "-1");
        assert_eq!(policy.fill_for("declarationDate"), "1900-01-01");
        assert_eq!(policy.fill_for("primaryResidenceFlag"), "N");
        assert_eq!(policy.fill_for("damagedStateAbbreviation"), "NA");
        assert_eq!(policy.fill_for("damagedZipCode"), "00000");
        assert_eq!(policy.fill_for("residenceType"), "Unknown");
    }

    #[test]
    fn test_constant_fill_counts_cells() {
        let mut batch = Batch::from_str_rows(
            &["county", "ownRent"],
            &[&["", "Owner"], &["", ""], &["Harris", "Renter"]],
        )
        .unwrap();
        let filled = MissingFiller::constant("?").fill(&mut batch);
        assert_eq!(filled.get("county"), Some(&2));
        assert_eq!(filled.get("ownRent"), Some(&1));
        assert_eq!(batch.rows()[1].values(), &[Value::text("?"), Value::text("?")]);
    }

    #[test]
    fn test_excluded_and_restricted_columns() {
        let mut batch = Batch::from_str_rows(&["a", "b", "c"], &[&["", "", ""]]).unwrap();
        let filled = MissingFiller::constant("x")
            .with_columns(Some(vec!["a".to_string(), "b".to_string()]))
            .with_excluded(vec!["b".to_string()])
            .fill(&mut batch);
        assert_eq!(filled.len(), 1);
        assert_eq!(
            batch.rows()[0].values(),
            &[Value::text("x"), Value::Missing, Value::Missing]
        );
    }

    #[test]
    fn test_present_values_untouched() {
        let mut batch = Batch::from_str_rows(&["state"], &[&["TX"]]).unwrap();
        let filled = MissingFiller::default().fill(&mut batch);
        assert!(filled.is_empty());
        assert_eq!(batch.rows()[0].values(), &[Value::text("TX")]);
    }
}

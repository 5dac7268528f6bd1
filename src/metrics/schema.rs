use serde::{Deserialize, Serialize};
use std::fmt;

use super::report::{ClassScores, ClassificationReport};
use crate::error::{EvalError, Result};
use crate::labels::Label;

/// Which classes (and therefore which result columns) a run reports.
/// Selected once from configuration; every row of a run shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaMode {
    TwoClassMciNc,
    TwoClassCiNc,
    ThreeClass,
    AveragesOnly,
}

impl SchemaMode {
    /// `ci_nc` only matters for two-class runs
    pub fn from_config(n_classes: u32, ci_nc: bool) -> Self {
        match (n_classes, ci_nc) {
            (2, false) => Self::TwoClassMciNc,
            (2, true) => Self::TwoClassCiNc,
            (3, _) => Self::ThreeClass,
            _ => Self::AveragesOnly,
        }
    }

    /// Classes that get their own block of columns, in column order
    pub fn reported_classes(&self) -> &'static [Label] {
        match self {
            Self::TwoClassMciNc => &[Label::Mci, Label::Nc],
            Self::TwoClassCiNc => &[Label::Ci, Label::Nc],
            Self::ThreeClass => &[Label::Mci, Label::Nc, Label::Dm],
            Self::AveragesOnly => &[],
        }
    }

    /// Column names of a summary row for this schema
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for label in self.reported_classes() {
            for metric in ["recall", "precision", "f1-score", "support"] {
                columns.push(format!("{}_{}", label, metric));
            }
        }
        columns.extend(Averages::COLUMNS.iter().map(|c| c.to_string()));
        columns
    }
}

impl fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TwoClassMciNc => "two-class-mci-nc",
            Self::TwoClassCiNc => "two-class-ci-nc",
            Self::ThreeClass => "three-class",
            Self::AveragesOnly => "averages-only",
        };
        f.write_str(name)
    }
}

/// Summary scores present in every schema
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    /// Unweighted average recall
    pub uar: f64,
    pub f1_macro: f64,
    pub f1_weighted: f64,
}

impl Averages {
    pub const COLUMNS: [&'static str; 3] = ["uar", "f1_score_macro", "f1_score_weighted"];

    fn from_report(report: &ClassificationReport) -> Self {
        Self {
            uar: report.uar,
            f1_macro: report.macro_f1,
            f1_weighted: report.weighted_f1,
        }
    }
}

/// One prompt's metrics, shaped by the run's [`SchemaMode`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "kebab-case")]
pub enum MetricSummary {
    TwoClassMciNc {
        mci: ClassScores,
        nc: ClassScores,
        averages: Averages,
    },
    TwoClassCiNc {
        ci: ClassScores,
        nc: ClassScores,
        averages: Averages,
    },
    ThreeClass {
        mci: ClassScores,
        nc: ClassScores,
        dm: ClassScores,
        averages: Averages,
    },
    AveragesOnly {
        averages: Averages,
    },
}

impl MetricSummary {
    pub fn mode(&self) -> SchemaMode {
        match self {
            Self::TwoClassMciNc { .. } => SchemaMode::TwoClassMciNc,
            Self::TwoClassCiNc { .. } => SchemaMode::TwoClassCiNc,
            Self::ThreeClass { .. } => SchemaMode::ThreeClass,
            Self::AveragesOnly { .. } => SchemaMode::AveragesOnly,
        }
    }

    pub fn averages(&self) -> &Averages {
        match self {
            Self::TwoClassMciNc { averages, .. }
            | Self::TwoClassCiNc { averages, .. }
            | Self::ThreeClass { averages, .. }
            | Self::AveragesOnly { averages } => averages,
        }
    }

    /// Per-class blocks in column order
    pub fn class_blocks(&self) -> Vec<(Label, ClassScores)> {
        match *self {
            Self::TwoClassMciNc { mci, nc, .. } => vec![(Label::Mci, mci), (Label::Nc, nc)],
            Self::TwoClassCiNc { ci, nc, .. } => vec![(Label::Ci, ci), (Label::Nc, nc)],
            Self::ThreeClass { mci, nc, dm, .. } => {
                vec![(Label::Mci, mci), (Label::Nc, nc), (Label::Dm, dm)]
            }
            Self::AveragesOnly { .. } => Vec::new(),
        }
    }

    /// Cell values aligned with [`SchemaMode::columns`]
    pub fn values(&self) -> Vec<String> {
        let mut values = Vec::new();
        for (_, scores) in self.class_blocks() {
            values.push(scores.recall.to_string());
            values.push(scores.precision.to_string());
            values.push(scores.f1.to_string());
            values.push(scores.support.to_string());
        }
        let averages = self.averages();
        values.push(averages.uar.to_string());
        values.push(averages.f1_macro.to_string());
        values.push(averages.f1_weighted.to_string());
        values
    }
}

/// Classification report over one prompt's pairs, projected onto `mode`.
///
/// A reported class that never occurs is zero-filled (support 0). An empty
/// pair set is an error since none of the averages would be meaningful.
pub fn aggregate(pairs: &[(Label, Label)], mode: SchemaMode) -> Result<MetricSummary> {
    if pairs.is_empty() {
        return Err(EvalError::Aggregation(
            "no (reference, predicted) pairs to score".to_string(),
        ));
    }

    let report = ClassificationReport::compute(pairs);
    let averages = Averages::from_report(&report);

    let summary = match mode {
        SchemaMode::TwoClassMciNc => MetricSummary::TwoClassMciNc {
            mci: report.class(Label::Mci),
            nc: report.class(Label::Nc),
            averages,
        },
        SchemaMode::TwoClassCiNc => MetricSummary::TwoClassCiNc {
            ci: report.class(Label::Ci),
            nc: report.class(Label::Nc),
            averages,
        },
        SchemaMode::ThreeClass => MetricSummary::ThreeClass {
            mci: report.class(Label::Mci),
            nc: report.class(Label::Nc),
            dm: report.class(Label::Dm),
            averages,
        },
        SchemaMode::AveragesOnly => MetricSummary::AveragesOnly { averages },
    };
    Ok(summary)
}

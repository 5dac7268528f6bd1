use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::labels::Label;

/// Precision/recall/F1/support for one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Multi-class classification report over (reference, predicted) pairs.
///
/// Per-class scores and the F1 averages cover the union of labels seen in
/// references and predictions, so a predicted `Unknown` shows up as a
/// zero-support class in `macro_f1`. `uar` only averages classes with
/// support. Any zero denominator yields 0.0.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub per_class: BTreeMap<Label, ClassScores>,
    /// Unweighted average recall over reference classes
    pub uar: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
}

#[derive(Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    pub fn compute(pairs: &[(Label, Label)]) -> Self {
        let mut counts: BTreeMap<Label, Counts> = BTreeMap::new();

        for &(reference, predicted) in pairs {
            if reference == predicted {
                counts.entry(reference).or_default().tp += 1;
            } else {
                counts.entry(reference).or_default().fn_ += 1;
                counts.entry(predicted).or_default().fp += 1;
            }
        }

        let per_class: BTreeMap<Label, ClassScores> = counts
            .into_iter()
            .map(|(label, c)| {
                let precision = ratio(c.tp, c.tp + c.fp);
                let recall = ratio(c.tp, c.tp + c.fn_);
                let scores = ClassScores {
                    precision,
                    recall,
                    f1: harmonic_mean(precision, recall),
                    support: c.tp + c.fn_,
                };
                (label, scores)
            })
            .collect();

        let total: usize = per_class.values().map(|s| s.support).sum();
        let supported: Vec<&ClassScores> =
            per_class.values().filter(|s| s.support > 0).collect();

        let uar = if supported.is_empty() {
            0.0
        } else {
            supported.iter().map(|s| s.recall).sum::<f64>() / supported.len() as f64
        };
        let macro_f1 = if per_class.is_empty() {
            0.0
        } else {
            per_class.values().map(|s| s.f1).sum::<f64>() / per_class.len() as f64
        };
        let weighted_f1 = if total == 0 {
            0.0
        } else {
            per_class
                .values()
                .map(|s| s.f1 * s.support as f64)
                .sum::<f64>()
                / total as f64
        };

        Self {
            per_class,
            uar,
            macro_f1,
            weighted_f1,
        }
    }

    /// Scores for `label`, zero-filled when the label never occurred.
    pub fn class(&self, label: Label) -> ClassScores {
        self.per_class.get(&label).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Label::*;

    fn pairs(refs: &[Label], preds: &[Label]) -> Vec<(Label, Label)> {
        refs.iter().copied().zip(preds.iter().copied()).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_two_class_report() {
        let report = ClassificationReport::compute(&pairs(&[Mci, Nc, Mci, Nc], &[Mci, Nc, Nc, Nc]));

        let mci = report.class(Mci);
        assert!(close(mci.recall, 0.5));
        assert!(close(mci.precision, 1.0));
        assert!(close(mci.f1, 2.0 / 3.0));
        assert_eq!(mci.support, 2);

        let nc = report.class(Nc);
        assert!(close(nc.recall, 1.0));
        assert!(close(nc.precision, 2.0 / 3.0));
        assert!(close(nc.f1, 0.8));
        assert_eq!(nc.support, 2);

        assert!(close(report.uar, 0.75));
        assert!(close(report.macro_f1, (2.0 / 3.0 + 0.8) / 2.0));
        assert!(close(report.weighted_f1, (2.0 / 3.0 + 0.8) / 2.0));
    }

    #[test]
    fn test_unknown_prediction_is_a_zero_support_class() {
        let report = ClassificationReport::compute(&pairs(&[Mci, Nc], &[Unknown, Nc]));

        let unknown = report.class(Unknown);
        assert_eq!(unknown.support, 0);
        assert!(close(unknown.precision, 0.0));
        assert!(close(unknown.recall, 0.0));

        assert!(close(report.class(Mci).recall, 0.0));
        assert!(close(report.class(Nc).recall, 1.0));
        // F1 macro spans MCI, NC and Unknown
        assert!(close(report.macro_f1, 1.0 / 3.0));
        // Unknown carries no weight
        assert!(close(report.weighted_f1, 0.5));
    }

    #[test]
    fn test_uar_ignores_predicted_only_classes() {
        let report = ClassificationReport::compute(&pairs(
            &[Mci, Nc, Mci, Nc],
            &[Mci, Nc, Mci, Unknown],
        ));
        assert!(close(report.class(Mci).recall, 1.0));
        assert!(close(report.class(Nc).recall, 0.5));
        // the Unknown already cost NC its recall; it is not averaged in again
        assert!(close(report.uar, 0.75));

        // a reference class predicted as another reference class still counts
        let report = ClassificationReport::compute(&pairs(&[Mci, Mci], &[Nc, Mci]));
        assert!(close(report.uar, 0.5));
    }

    #[test]
    fn test_absent_class_is_zero_filled() {
        let report = ClassificationReport::compute(&pairs(&[Mci, Nc], &[Mci, Nc]));
        assert_eq!(report.class(Dm), ClassScores::default());
        assert_eq!(report.per_class.len(), 2);
    }

    #[test]
    fn test_unequal_support_weighting() {
        let report = ClassificationReport::compute(&pairs(&[Nc, Nc, Nc, Mci], &[Nc, Nc, Nc, Nc]));
        assert!(close(report.class(Nc).f1, 2.0 * 0.75 / 1.75));
        assert!(close(report.class(Mci).f1, 0.0));
        assert!(close(report.weighted_f1, 0.75 * (2.0 * 0.75 / 1.75)));
        assert!(close(report.uar, 0.5));
    }

    #[test]
    fn test_empty_pairs() {
        let report = ClassificationReport::compute(&[]);
        assert!(report.per_class.is_empty());
        assert!(close(report.uar, 0.0));
        assert!(close(report.macro_f1, 0.0));
    }
}

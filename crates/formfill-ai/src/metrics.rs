//! Scoring of generated forms against reference records.
//!
//! - ROUGE-1, ROUGE-2 and ROUGE-L F-measures over lowercased alphanumeric
//!   tokens (no stemming)
//! - per-label precision/recall/F1 with accuracy and averages, printed in
//!   the familiar classification-report layout

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

/// Precision, recall and their harmonic mean.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Score {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl Score {
    fn from_counts(overlap: usize, candidate: usize, reference: usize) -> Self {
        let precision = ratio(overlap as f64, candidate as f64);
        let recall = ratio(overlap as f64, reference as f64);
        Self {
            precision,
            recall,
            fmeasure: f1(precision, recall),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision={:.4}, recall={:.4}, fmeasure={:.4}",
            self.precision, self.recall, self.fmeasure
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RougeScores {
    pub rouge1: Score,
    pub rouge2: Score,
    pub rouge_l: Score,
}

impl RougeScores {
    pub fn compute(candidate: &str, reference: &str) -> Self {
        let cand = tokenize(candidate);
        let refr = tokenize(reference);
        Self {
            rouge1: rouge_n_tokens(&cand, &refr, 1),
            rouge2: rouge_n_tokens(&cand, &refr, 2),
            rouge_l: rouge_l_tokens(&cand, &refr),
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

fn f1(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

/// Lowercase and split on anything that is not ASCII alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn rouge_n(candidate: &str, reference: &str, n: usize) -> Score {
    rouge_n_tokens(&tokenize(candidate), &tokenize(reference), n)
}

pub fn rouge_l(candidate: &str, reference: &str) -> Score {
    rouge_l_tokens(&tokenize(candidate), &tokenize(reference))
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

fn rouge_n_tokens(candidate: &[String], reference: &[String], n: usize) -> Score {
    let cand = ngram_counts(candidate, n);
    let refr = ngram_counts(reference, n);
    let overlap = refr
        .iter()
        .map(|(gram, &count)| count.min(cand.get(gram).copied().unwrap_or(0)))
        .sum();
    Score::from_counts(overlap, cand.values().sum(), refr.values().sum())
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn rouge_l_tokens(candidate: &[String], reference: &[String]) -> Score {
    Score::from_counts(lcs_len(candidate, reference), candidate.len(), reference.len())
}

/// Scores for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScores {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-label metrics for a set of categorical predictions.
///
/// Labels are the sorted union of expected and predicted values. A metric
/// whose denominator is zero is reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub labels: Vec<LabelScores>,
    pub accuracy: f64,
    pub macro_avg: LabelScores,
    pub weighted_avg: LabelScores,
}

impl ClassificationReport {
    pub fn new<S: AsRef<str>>(expected: &[S], predicted: &[S]) -> Self {
        let total = expected.len().min(predicted.len());
        let pairs: Vec<(&str, &str)> = expected
            .iter()
            .zip(predicted)
            .map(|(e, p)| (e.as_ref(), p.as_ref()))
            .collect();
        let names: BTreeSet<&str> = pairs.iter().flat_map(|&(e, p)| [e, p]).collect();

        let labels: Vec<LabelScores> = names
            .into_iter()
            .map(|label| {
                let tp = pairs.iter().filter(|&&(e, p)| e == label && p == label).count();
                let predicted = pairs.iter().filter(|&&(_, p)| p == label).count();
                let support = pairs.iter().filter(|&&(e, _)| e == label).count();
                let precision = ratio(tp as f64, predicted as f64);
                let recall = ratio(tp as f64, support as f64);
                LabelScores {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support,
                }
            })
            .collect();

        let correct = pairs.iter().filter(|&&(e, p)| e == p).count();
        let n = labels.len() as f64;
        let macro_avg = LabelScores {
            label: "macro avg".into(),
            precision: ratio(labels.iter().map(|l| l.precision).sum(), n),
            recall: ratio(labels.iter().map(|l| l.recall).sum(), n),
            f1: ratio(labels.iter().map(|l| l.f1).sum(), n),
            support: total,
        };
        let weighted = |get: fn(&LabelScores) -> f64| {
            ratio(
                labels.iter().map(|l| get(l) * l.support as f64).sum(),
                total as f64,
            )
        };
        let weighted_avg = LabelScores {
            label: "weighted avg".into(),
            precision: weighted(|l| l.precision),
            recall: weighted(|l| l.recall),
            f1: weighted(|l| l.f1),
            support: total,
        };

        Self {
            accuracy: ratio(correct as f64, total as f64),
            labels,
            macro_avg,
            weighted_avg,
        }
    }

    pub fn label(&self, name: &str) -> Option<&LabelScores> {
        self.labels.iter().find(|l| l.label == name)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|l| l.label.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(0);
        let row = |f: &mut fmt::Formatter<'_>, s: &LabelScores| {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                s.label, s.precision, s.recall, s.f1, s.support
            )
        };

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for label in &self.labels {
            row(f, label)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("Safety vlv B: operating-erratic!"),
            vec!["safety", "vlv", "b", "operating", "erratic"]
        );
    }

    #[test]
    fn rouge_hand_computed() {
        // candidate: the pump is broken (4), reference: the main pump is broken now (6)
        let scores = RougeScores::compute("The pump is broken", "the main pump is broken now");
        // unigrams: the, pump, is, broken all match
        assert!(close(scores.rouge1.precision, 1.0));
        assert!(close(scores.rouge1.recall, 4.0 / 6.0));
        assert!(close(scores.rouge1.fmeasure, 0.8));
        // bigrams: cand {the pump, pump is, is broken}; ref has pump is, is broken
        assert!(close(scores.rouge2.precision, 2.0 / 3.0));
        assert!(close(scores.rouge2.recall, 2.0 / 5.0));
        assert!(close(scores.rouge2.fmeasure, 0.5));
        // LCS = the pump is broken
        assert!(close(scores.rouge_l.fmeasure, 0.8));
    }

    #[test]
    fn rouge_counts_repeated_ngrams_once_per_occurrence() {
        let score = rouge_n("leak leak leak", "leak valve", 1);
        assert!(close(score.precision, 1.0 / 3.0));
        assert!(close(score.recall, 0.5));
    }

    #[test]
    fn rouge_empty_inputs_are_zero() {
        assert_eq!(rouge_n("", "anything", 1), Score::default());
        assert_eq!(rouge_l("", ""), Score::default());
        assert_eq!(rouge_n("one", "two", 2), Score::default());
    }

    #[test]
    fn lcs_is_not_contiguous() {
        let score = rouge_l("a x b y c", "a b c");
        assert!(close(score.recall, 1.0));
        assert!(close(score.precision, 0.6));
    }

    #[test]
    fn classification_report_hand_computed() {
        let expected = ["Engineering", "Engineering", "Electrical"];
        let predicted = ["Engineering", "Electrical", "Electrical"];
        let report = ClassificationReport::new(&expected, &predicted);

        let eng = report.label("Engineering").unwrap();
        assert!(close(eng.precision, 1.0));
        assert!(close(eng.recall, 0.5));
        assert!(close(eng.f1, 2.0 / 3.0));
        assert_eq!(eng.support, 2);

        let elec = report.label("Electrical").unwrap();
        assert!(close(elec.precision, 0.5));
        assert!(close(elec.recall, 1.0));
        assert_eq!(elec.support, 1);

        assert!(close(report.accuracy, 2.0 / 3.0));
        assert!(close(report.macro_avg.precision, 0.75));
        assert!(close(report.macro_avg.recall, 0.75));
        assert!(close(report.weighted_avg.precision, 5.0 / 6.0));
        assert!(close(report.weighted_avg.recall, 2.0 / 3.0));
        assert_eq!(report.weighted_avg.support, 3);
    }

    #[test]
    fn unseen_prediction_gets_zero_support() {
        let report = ClassificationReport::new(&["High", "Low"], &["High", "Urgent"]);
        let urgent = report.label("Urgent").unwrap();
        assert_eq!(urgent.support, 0);
        assert_eq!(urgent.recall, 0.0);
        let low = report.label("Low").unwrap();
        assert_eq!(low.precision, 0.0);
        assert_eq!(
            report.labels.iter().map(|l| l.label.as_str()).collect::<Vec<_>>(),
            vec!["High", "Low", "Urgent"]
        );
    }

    #[test]
    fn report_layout() {
        let report = ClassificationReport::new(
            &["Engineering", "Engineering", "Electrical"],
            &["Engineering", "Electrical", "Electrical"],
        );
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "             precision    recall  f1-score   support");
        assert_eq!(lines[2], "  Electrical      0.50      1.00      0.67         1");
        assert_eq!(lines[3], " Engineering      1.00      0.50      0.67         2");
        assert_eq!(lines[5], "    accuracy                          0.67         3");
        assert_eq!(lines[6], "   macro avg      0.75      0.75      0.67         3");
        assert_eq!(lines[7], "weighted avg      0.83      0.67      0.67         3");
    }
}

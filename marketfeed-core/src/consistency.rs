//! Dual-source consistency checker for daily-basic valuation tables. The
//! teacher has no two-source-diff concept; this is built directly from
//! spec.md §4.3, which in turn mirrors
//! `original_source/app/services/data_consistency_checker.py`'s
//! `tolerance_thresholds`/`metric_weights` tables and weighted-confidence
//! algorithm.

use marketfeed_types::{ConsistencyReport, DataSourceKey, MetricComparison, RecommendedAction};

use crate::adapter::DailyBasicRow;

/// Adapts a value to the `{code -> metric}` shape the checker compares.
/// Implemented for `Vec<DailyBasicRow>` so [`ConsistencyChecker`] can be
/// called generically from [`crate::manager::DataSourceManager`].
pub trait DailyBasicLike {
    /// Metric value for `code`, `None` if absent or the code isn't present.
    fn metric(&self, code: &str, metric: &str) -> Option<f64>;
    /// All distinct codes present in this table.
    fn codes(&self) -> Vec<String>;
}

impl DailyBasicLike for Vec<DailyBasicRow> {
    fn metric(&self, code: &str, metric: &str) -> Option<f64> {
        let row = self.iter().find(|r| r.code == code)?;
        match metric {
            "pe" => row.pe,
            "pb" => row.pb,
            "total_mv" => row.total_mv,
            "price" => row.close,
            "volume" => None,
            "turnover_rate" => row.turnover_rate,
            _ => None,
        }
    }

    fn codes(&self) -> Vec<String> {
        self.iter().map(|r| r.code.clone()).collect()
    }
}

const METRICS: &[&str] = &["pe", "pb", "total_mv", "price", "volume", "turnover_rate"];

fn tolerance(metric: &str) -> f64 {
    match metric {
        "pe" => 0.05,
        "pb" => 0.05,
        "total_mv" => 0.02,
        "price" => 0.01,
        "volume" => 0.10,
        "turnover_rate" => 0.05,
        _ => 0.10,
    }
}

fn weight(metric: &str) -> f64 {
    match metric {
        "pe" => 0.25,
        "pb" => 0.25,
        "total_mv" => 0.20,
        "price" => 0.15,
        "volume" => 0.10,
        "turnover_rate" => 0.05,
        _ => 0.0,
    }
}

/// Sampling cap per spec.md §4.3 step 2 ("samples up to 100 common
/// stocks").
const SAMPLE_LIMIT: usize = 100;

/// Stateless comparator; one instance is reused across calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyChecker;

impl ConsistencyChecker {
    fn find_common_codes<A: DailyBasicLike, B: DailyBasicLike>(primary: &A, secondary: &B) -> Vec<String> {
        let secondary_codes: std::collections::HashSet<String> = secondary.codes().into_iter().collect();
        primary
            .codes()
            .into_iter()
            .filter(|c| secondary_codes.contains(c))
            .take(SAMPLE_LIMIT)
            .collect()
    }

    fn compare_metric<A: DailyBasicLike, B: DailyBasicLike>(
        primary: &A,
        secondary: &B,
        common: &[String],
        metric: &str,
    ) -> MetricComparison {
        let primary_values: Vec<f64> = common
            .iter()
            .filter_map(|c| primary.metric(c, metric))
            .filter(|v| v.is_finite() && *v != 0.0)
            .collect();
        let secondary_values: Vec<f64> = common
            .iter()
            .filter_map(|c| secondary.metric(c, metric))
            .filter(|v| v.is_finite() && *v != 0.0)
            .collect();

        let primary_mean = mean(&primary_values);
        let secondary_mean = mean(&secondary_values);
        let tol = tolerance(metric);

        let relative_diff = match (primary_mean, secondary_mean) {
            (Some(p), Some(s)) if p != 0.0 => Some((s - p).abs() / p.abs()),
            _ => None,
        };
        let is_significant = relative_diff.is_some_and(|d| d > tol);

        MetricComparison {
            metric: metric.to_string(),
            primary_mean,
            secondary_mean,
            relative_diff,
            tolerance: tol,
            is_significant,
        }
    }

    /// Compare `primary` against `secondary` (spec.md §4.3 steps 1-6). The
    /// returned report is always advisory: the caller keeps `primary`'s data
    /// regardless of the recommendation.
    pub fn compare<A: DailyBasicLike, B: DailyBasicLike>(
        &self,
        primary_source: DataSourceKey,
        secondary_source: DataSourceKey,
        primary: &A,
        secondary: &B,
    ) -> ConsistencyReport {
        let common = Self::find_common_codes(primary, secondary);
        if common.is_empty() {
            return ConsistencyReport {
                primary_source,
                secondary_source,
                common_instrument_count: 0,
                comparisons: Vec::new(),
                confidence_score: 0.0,
                is_consistent: false,
                recommended_action: RecommendedAction::UsePrimaryOnly,
            };
        }

        let comparisons: Vec<MetricComparison> = METRICS
            .iter()
            .map(|m| Self::compare_metric(primary, secondary, &common, m))
            .collect();

        let mut weighted_score = 0.0;
        let mut total_weight = 0.0;
        let mut significant = 0usize;
        for c in &comparisons {
            let w = weight(&c.metric);
            let per_metric_consistency = c
                .relative_diff
                .map_or(1.0, |d| (1.0 - d / c.tolerance).max(0.0));
            weighted_score += w * per_metric_consistency;
            total_weight += w;
            if c.is_significant {
                significant += 1;
            }
        }
        let confidence_score = if total_weight > 0.0 {
            weighted_score / total_weight
        } else {
            0.0
        };
        let is_consistent = (significant as f64) <= (comparisons.len() as f64) * 0.3;

        ConsistencyReport {
            primary_source,
            secondary_source,
            common_instrument_count: common.len(),
            comparisons,
            confidence_score,
            is_consistent,
            recommended_action: RecommendedAction::from_confidence(confidence_score),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, pe: f64, pb: f64, total_mv: f64, close: f64, turnover: f64) -> DailyBasicRow {
        DailyBasicRow {
            code: code.to_string(),
            close: Some(close),
            turnover_rate: Some(turnover),
            pe: Some(pe),
            pb: Some(pb),
            ps: None,
            total_mv: Some(total_mv),
            circ_mv: None,
        }
    }

    #[test]
    fn identical_tables_are_fully_consistent() {
        let primary = vec![row("000001", 10.0, 1.5, 100.0, 12.0, 2.0)];
        let secondary = primary.clone();
        let report =
            ConsistencyChecker.compare(DataSourceKey::Tushare, DataSourceKey::AkShare, &primary, &secondary);
        assert!(report.is_consistent);
        assert_eq!(report.recommended_action, RecommendedAction::UseEither);
        assert!(report.confidence_score > 0.99);
    }

    #[test]
    fn no_common_stocks_uses_primary_only() {
        let primary = vec![row("000001", 10.0, 1.5, 100.0, 12.0, 2.0)];
        let secondary = vec![row("600000", 10.0, 1.5, 100.0, 12.0, 2.0)];
        let report =
            ConsistencyChecker.compare(DataSourceKey::Tushare, DataSourceKey::AkShare, &primary, &secondary);
        assert_eq!(report.common_instrument_count, 0);
        assert!(!report.is_consistent);
        assert_eq!(report.recommended_action, RecommendedAction::UsePrimaryOnly);
    }

    #[test]
    fn large_pe_divergence_is_flagged_significant() {
        let primary = vec![row("000001", 10.0, 1.5, 100.0, 12.0, 2.0)];
        let secondary = vec![row("000001", 20.0, 1.5, 100.0, 12.0, 2.0)];
        let report =
            ConsistencyChecker.compare(DataSourceKey::Tushare, DataSourceKey::AkShare, &primary, &secondary);
        let pe_cmp = report.comparisons.iter().find(|c| c.metric == "pe").unwrap();
        assert!(pe_cmp.is_significant);
        assert!(report.confidence_score < 1.0);
    }
}

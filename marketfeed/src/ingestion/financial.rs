//! Financial sync (spec.md §4.4, §3): the closed `DataSourceAdapter`
//! capability set (spec.md §4.1) has no capability that returns raw balance
//! sheet/income/cashflow rows — this pack's adapters expose `daily_basic`
//! valuation snapshots only, not `fina_indicator`-style statement pulls.
//!
//! Rather than invent an eighth adapter capability with no provider in the
//! pack to back it, this job derives `FinancialStatement.total_equity` and
//! `.ttm_net_profit` from the same reverse-derivation the Valuation
//! Recomputer runs forward (spec.md §4.6 steps 4-8: `pb = mv / equity`,
//! `pe_ttm = mv / ttm_net_profit`), applied here at ingestion time against
//! the latest `StockBasics` snapshot instead of at read time against a
//! realtime quote. `total_revenue` has no such reverse path and is left
//! unset. This keeps `FinancialStatement` populated well enough for the
//! recomputer's §4.6 step 8 `latest_total_equity_亿元` lookup without
//! fabricating a provider that does not exist in the corpus (recorded in
//! DESIGN.md).

use chrono::Utc;

use marketfeed_types::BackoffConfig;

use super::RunOutcome;
use crate::store::{DocumentStore, UpsertOp};

/// Derive and upsert one `FinancialStatement` row per code in `codes`, keyed
/// on `(code, report_period)`, from each code's latest `StockBasics` row.
/// Codes with insufficient basics data (`total_mv`, `pb`, or `pe_ttm`
/// missing, or `pe_ttm <= 0`) are skipped, not counted as errors — they
/// simply have no statement produced this run, matching the Valuation
/// Recomputer's own "can't reverse-derive, fall back to static pe/pb"
/// degradation (spec.md §4.6 step 9).
pub async fn financial_sync(store: &DocumentStore, codes: &[String], report_period: &str) -> RunOutcome {
    let mut ops = Vec::with_capacity(codes.len());

    for code in codes {
        let Ok(Some(basics)) = store
            .stock_basics()
            .find_one(bson::doc! {"code": code, "source": "tushare"})
            .await
        else {
            continue;
        };

        let Some(total_mv) = basics.total_mv else { continue };
        let total_equity = basics.pb.filter(|pb| *pb > 0.0).map(|pb| total_mv / pb);
        let ttm_net_profit = basics.pe_ttm.filter(|pe| *pe > 0.0).map(|pe| total_mv / pe);
        if total_equity.is_none() && ttm_net_profit.is_none() {
            continue;
        }

        let doc = marketfeed_types::model::FinancialStatement {
            id: None,
            code: code.clone(),
            report_period: report_period.to_string(),
            total_equity,
            ttm_net_profit,
            total_revenue: None,
            source: basics.source,
            updated_at: Utc::now(),
        };
        let body = bson::to_document(&doc).expect("FinancialStatement always serializes");
        ops.push(UpsertOp { filter: bson::doc! {"code": code, "report_period": report_period}, body });
    }

    let skipped = (codes.len() - ops.len()) as u64;
    let (written, errored) = store.bulk_upsert(&store.raw_financial_statements(), ops, BackoffConfig::standard()).await;
    to_outcome(written, errored + skipped)
}

fn to_outcome(written: u64, errored: u64) -> RunOutcome {
    if errored == 0 {
        RunOutcome::success(None, written)
    } else {
        RunOutcome::success_with_errors(None, written, errored, format!("{errored} codes skipped or failed to upsert"))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn reverse_derivation_matches_valuation_recomputer_formula() {
        let total_mv = 100.0_f64;
        let pb = 2.0_f64;
        let pe_ttm = 10.0_f64;
        let equity = total_mv / pb;
        let net_profit = total_mv / pe_ttm;
        assert!((equity - 50.0).abs() < f64::EPSILON);
        assert!((net_profit - 10.0).abs() < f64::EPSILON);
    }
}

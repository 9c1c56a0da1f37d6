//! Per-market data-source priority table, generalized from the teacher's
//! `RoutingPolicy` (provider/exchange preference engine) down to the one
//! axis this spec needs: rank a data source within a market category,
//! with an optional per-call `preferred_sources` override (spec.md §4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::connector::DataSourceKey;
use crate::model::{DataSourceGrouping, MarketCategory};

/// Re-export of the admin-managed override row, for convenience.
pub use crate::model::DataSourceGrouping as PriorityOverride;

/// Larger rank = higher priority. Default ranks realize spec.md §4.2:
/// "Tushare > `AKShare` > `BaoStock`" for CN; Yahoo Finance is the sole
/// default for HK/US.
fn default_rank(market: MarketCategory, source: DataSourceKey) -> i32 {
    use DataSourceKey::{AkShare, BaoStock, Finnhub, Tushare, YahooFinance};
    match (market, source) {
        (MarketCategory::Cn, Tushare) => 30,
        (MarketCategory::Cn, AkShare) => 20,
        (MarketCategory::Cn, BaoStock) => 10,
        (MarketCategory::Hk | MarketCategory::Us, YahooFinance) => 30,
        (MarketCategory::Us, Finnhub) => 20,
        _ => 0,
    }
}

/// Priority table loaded from [`DataSourceGrouping`] overrides at manager
/// construction (spec.md §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcePriorities {
    overrides: HashMap<(MarketCategory, DataSourceKey), i32>,
}

impl SourcePriorities {
    /// Build a priority table from admin-configured overrides, falling back
    /// to [`default_rank`] for any `(market, source)` pair left unset.
    #[must_use]
    pub fn from_overrides(rows: &[DataSourceGrouping]) -> Self {
        let mut overrides = HashMap::with_capacity(rows.len());
        for row in rows {
            overrides.insert((row.market_category_id, row.data_source), row.rank);
        }
        Self { overrides }
    }

    /// Rank of `source` within `market`, preferring an admin override.
    #[must_use]
    pub fn rank(&self, market: MarketCategory, source: DataSourceKey) -> i32 {
        self.overrides
            .get(&(market, source))
            .copied()
            .unwrap_or_else(|| default_rank(market, source))
    }

    /// Order `available` sources for `market`, highest priority first, with
    /// `preferred` names (if any) moved to the front in the order given —
    /// the `preferred_sources` override from spec.md §4.2's
    /// `with_fallback`. Unlisted-but-available sources keep their relative
    /// rank order after the preferred ones.
    #[must_use]
    pub fn ordered(
        &self,
        market: MarketCategory,
        available: &[DataSourceKey],
        preferred: &[DataSourceKey],
    ) -> Vec<DataSourceKey> {
        let mut ranked: Vec<DataSourceKey> = available.to_vec();
        ranked.sort_by(|a, b| self.rank(market, *b).cmp(&self.rank(market, *a)));

        let mut out = Vec::with_capacity(ranked.len());
        for p in preferred {
            if ranked.contains(p) && !out.contains(p) {
                out.push(*p);
            }
        }
        for r in ranked {
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cn_order_is_tushare_akshare_baostock() {
        let p = SourcePriorities::default();
        let avail = [
            DataSourceKey::BaoStock,
            DataSourceKey::Tushare,
            DataSourceKey::AkShare,
        ];
        let ordered = p.ordered(MarketCategory::Cn, &avail, &[]);
        assert_eq!(
            ordered,
            vec![
                DataSourceKey::Tushare,
                DataSourceKey::AkShare,
                DataSourceKey::BaoStock,
            ]
        );
    }

    #[test]
    fn preferred_sources_override_moves_to_front() {
        let p = SourcePriorities::default();
        let avail = [
            DataSourceKey::Tushare,
            DataSourceKey::AkShare,
            DataSourceKey::BaoStock,
        ];
        let ordered = p.ordered(MarketCategory::Cn, &avail, &[DataSourceKey::BaoStock]);
        assert_eq!(ordered[0], DataSourceKey::BaoStock);
    }

    #[test]
    fn admin_override_wins_over_default() {
        let rows = vec![DataSourceGrouping {
            market_category_id: MarketCategory::Cn,
            data_source: DataSourceKey::BaoStock,
            rank: 100,
        }];
        let p = SourcePriorities::from_overrides(&rows);
        let avail = [DataSourceKey::Tushare, DataSourceKey::BaoStock];
        let ordered = p.ordered(MarketCategory::Cn, &avail, &[]);
        assert_eq!(ordered[0], DataSourceKey::BaoStock);
    }
}

//! Valuation Recomputer (spec.md §4.6): a pure join of the latest
//! `MarketQuote`, `StockBasics`, and `FinancialStatement` rows into a
//! dynamic PE/PB estimate, with provenance and a validated-bounds fallback
//! to the static tushare figures. No network or store I/O happens inside
//! the algorithm itself — the caller loads the three inputs first, mirroring
//! `marketfeed-core::consistency::ConsistencyChecker`'s pure-function shape.

use chrono::{DateTime, NaiveTime, Utc};

use marketfeed_types::model::{FinancialStatement, MarketQuote, StockBasics};

const PE_BOUNDS: (f64, f64) = (-100.0, 1000.0);
const PB_BOUNDS: (f64, f64) = (0.1, 100.0);

fn post_close_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 0, 0).expect("15:00:00 is a valid time")
}

/// Source tag describing which branch of the algorithm produced a result
/// (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuationSource {
    /// StockBasics was already today-post-close; returned its figures
    /// directly.
    StockBasicInfoLatest,
    /// Reverse-derived from realtime price and reverse-derived TTM metrics.
    Realtime,
    /// Validation rejected the realtime estimate; fell back to the static
    /// tushare daily_basic figures.
    DailyBasic,
}

impl ValuationSource {
    /// Stable identifier, matching spec.md §4.6's literal source strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StockBasicInfoLatest => "stock_basic_info_latest",
            Self::Realtime => "realtime",
            Self::DailyBasic => "daily_basic",
        }
    }
}

/// Result of [`recompute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub pe_ttm: Option<f64>,
    pub price: f64,
    /// Market capitalization in 亿元.
    pub market_cap: Option<f64>,
    pub is_realtime: bool,
    pub source: ValuationSource,
    pub ttm_net_profit: Option<f64>,
}

/// Reasons [`recompute`] can fail outright (distinct from "fell back to
/// static figures", which is still a success — spec.md §4.6 step 9).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuationError {
    #[error("quote close price must be positive")]
    NonPositiveClose,
    #[error("no usable StockBasics row for this code")]
    NoBasics,
    #[error("non-tushare StockBasics row is missing pe_ttm")]
    MissingPeTtm,
}

/// `basics.updated_at` falls on today's date and at/after 15:00 local —
/// spec.md §4.6 step 3's "today-post-close" predicate.
fn is_today_post_close(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    updated_at.date_naive() == now.date_naive() && updated_at.time() >= post_close_time()
}

/// Run the §4.6 algorithm. `now` is threaded in (rather than read from the
/// clock) so the today-post-close predicate is testable.
pub fn recompute(
    quote: &MarketQuote,
    basics: &StockBasics,
    financial: Option<&FinancialStatement>,
    now: DateTime<Utc>,
) -> Result<Valuation, ValuationError> {
    if quote.close <= 0.0 {
        return Err(ValuationError::NonPositiveClose);
    }
    if basics.source != "tushare" && basics.pe_ttm.is_none() {
        return Err(ValuationError::MissingPeTtm);
    }

    if is_today_post_close(basics.updated_at, now) {
        return Ok(Valuation {
            pe: basics.pe,
            pb: basics.pb,
            pe_ttm: basics.pe_ttm,
            price: quote.close,
            market_cap: basics.total_mv,
            is_realtime: false,
            source: ValuationSource::StockBasicInfoLatest,
            ttm_net_profit: None,
        });
    }

    let pre_close = quote.pre_close;
    let total_shares = basics
        .total_share
        .or_else(|| pre_close.filter(|p| *p > 0.0).and_then(|p| basics.total_mv.map(|mv| mv * 10_000.0 / p)))
        .or_else(|| basics.total_mv.map(|mv| mv * 10_000.0 / quote.close));
    let Some(total_shares) = total_shares else { return Err(ValuationError::NoBasics) };

    let yesterday_mv = pre_close
        .filter(|p| *p > 0.0)
        .map(|p| total_shares * p / 10_000.0)
        .or(basics.total_mv);
    let Some(yesterday_mv) = yesterday_mv else { return Err(ValuationError::NoBasics) };

    // A non-positive tushare pe_ttm means this is a loss-making stock: pe
    // cannot be reverse-derived, so degrade to the static daily_basic
    // branch with pe reported absent rather than failing outright (spec.md
    // §4.6 step 6).
    let Some(tushare_pe_ttm) = basics.pe_ttm.filter(|v| *v > 0.0) else {
        return Ok(Valuation {
            pe: None,
            pb: basics.pb,
            pe_ttm: basics.pe_ttm,
            price: quote.close,
            market_cap: basics.total_mv,
            is_realtime: false,
            source: ValuationSource::DailyBasic,
            ttm_net_profit: None,
        });
    };
    let ttm_net_profit = yesterday_mv / tushare_pe_ttm;

    let realtime_mv = total_shares * quote.close / 10_000.0;
    let dynamic_pe_ttm = if ttm_net_profit != 0.0 { Some(realtime_mv / ttm_net_profit) } else { None };
    let dynamic_pb = financial
        .and_then(|f| f.total_equity)
        .filter(|e| *e != 0.0)
        .map(|equity| realtime_mv / equity);

    let pe_ok = dynamic_pe_ttm.is_none_or(|pe| pe >= PE_BOUNDS.0 && pe <= PE_BOUNDS.1);
    let pb_ok = dynamic_pb.is_none_or(|pb| pb >= PB_BOUNDS.0 && pb <= PB_BOUNDS.1);

    if pe_ok && pb_ok {
        Ok(Valuation {
            pe: dynamic_pe_ttm,
            pb: dynamic_pb,
            pe_ttm: dynamic_pe_ttm,
            price: quote.close,
            market_cap: Some(realtime_mv),
            is_realtime: true,
            source: ValuationSource::Realtime,
            ttm_net_profit: Some(ttm_net_profit),
        })
    } else {
        Ok(Valuation {
            pe: basics.pe,
            pb: basics.pb,
            pe_ttm: basics.pe_ttm,
            price: quote.close,
            market_cap: basics.total_mv,
            is_realtime: false,
            source: ValuationSource::DailyBasic,
            ttm_net_profit: Some(ttm_net_profit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn basics(pe_ttm: Option<f64>, pb_source: &str, updated_at: DateTime<Utc>) -> StockBasics {
        StockBasics {
            id: None,
            code: "600036".to_string(),
            source: pb_source.to_string(),
            full_symbol: "600036.SS".to_string(),
            name: "test".to_string(),
            industry: None,
            market: None,
            list_date: None,
            total_mv: Some(1000.0),
            circ_mv: Some(900.0),
            pe: Some(8.0),
            pe_ttm,
            pb: Some(1.2),
            ps: None,
            turnover_rate: None,
            roe: None,
            total_share: Some(10_000.0),
            trade_date: Some("2026-07-31".to_string()),
            updated_at,
        }
    }

    fn quote(close: f64, pre_close: Option<f64>) -> MarketQuote {
        MarketQuote {
            id: None,
            code: "600036".to_string(),
            symbol: None,
            close,
            open: None,
            high: None,
            low: None,
            pre_close,
            pct_chg: None,
            volume: None,
            amount: None,
            trade_date: "2026-08-01".to_string(),
            source: "tushare".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_non_positive_close() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        let b = basics(Some(10.0), "tushare", now);
        let q = quote(0.0, Some(10.0));
        assert_eq!(recompute(&q, &b, None, now), Err(ValuationError::NonPositiveClose));
    }

    #[test]
    fn today_post_close_returns_static_figures_directly() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 15, 30, 0).unwrap();
        let b = basics(Some(10.0), "tushare", now);
        let q = quote(12.0, Some(11.5));
        let v = recompute(&q, &b, None, now).unwrap();
        assert_eq!(v.source, ValuationSource::StockBasicInfoLatest);
        assert!(!v.is_realtime);
        assert_eq!(v.pe_ttm, Some(10.0));
    }

    #[test]
    fn non_positive_pe_ttm_degrades_to_daily_basic_with_pe_absent() {
        let yesterday = Utc.with_ymd_and_hms(2026, 7, 31, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        let b = basics(Some(-5.0), "tushare", yesterday);
        let q = quote(12.0, Some(11.5));
        let v = recompute(&q, &b, None, now).unwrap();
        assert_eq!(v.source, ValuationSource::DailyBasic);
        assert!(!v.is_realtime);
        assert_eq!(v.pe, None);
        assert_eq!(v.ttm_net_profit, None);
    }

    #[test]
    fn realtime_estimate_within_bounds_is_accepted() {
        let yesterday = Utc.with_ymd_and_hms(2026, 7, 31, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        let b = basics(Some(10.0), "tushare", yesterday);
        let q = quote(12.0, Some(11.5));
        let v = recompute(&q, &b, None, now).unwrap();
        assert_eq!(v.source, ValuationSource::Realtime);
        assert!(v.is_realtime);
        assert!(v.pe_ttm.unwrap() > 0.0);
    }

    #[test]
    fn out_of_bounds_pe_falls_back_to_daily_basic() {
        let yesterday = Utc.with_ymd_and_hms(2026, 7, 31, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        // pre_close tiny relative to close drives realtime_mv/ttm_net_profit far outside bounds.
        let b = basics(Some(0.001), "tushare", yesterday);
        let q = quote(12.0, Some(11.5));
        let v = recompute(&q, &b, None, now).unwrap();
        assert_eq!(v.source, ValuationSource::DailyBasic);
        assert!(!v.is_realtime);
    }
}

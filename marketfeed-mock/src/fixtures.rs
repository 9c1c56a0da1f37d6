//! Canned data returned by [`crate::MockAdapter`], generalized from the
//! teacher's per-capability fixture modules (`borsa-mock::fixtures::*`) down
//! to the single shape this domain's adapters deal in.

use chrono::Utc;
use marketfeed_types::model::{HistoricalBar, MarketQuote, Period, StockBasics};

use crate::NewsItem;
use marketfeed_core::adapter::{DailyBasicRow, NewsKind};

/// A small deterministic stock universe: one CN board, one CN growth board.
#[must_use]
pub fn stock_basics(source: &str) -> Vec<StockBasics> {
    vec![
        StockBasics {
            id: None,
            code: "000001".to_string(),
            source: source.to_string(),
            full_symbol: "000001.SZ".to_string(),
            name: "平安银行".to_string(),
            industry: Some("银行".to_string()),
            market: Some("主板".to_string()),
            list_date: Some("1991-04-03".to_string()),
            total_mv: Some(2400.0),
            circ_mv: Some(2400.0),
            pe: Some(5.2),
            pe_ttm: Some(5.1),
            pb: Some(0.6),
            ps: Some(1.1),
            turnover_rate: Some(0.8),
            roe: Some(11.2),
            total_share: Some(194_060.0),
            trade_date: Some("2026-07-31".to_string()),
            updated_at: Utc::now(),
        },
        StockBasics {
            id: None,
            code: "300750".to_string(),
            source: source.to_string(),
            full_symbol: "300750.SZ".to_string(),
            name: "宁德时代".to_string(),
            industry: Some("电池".to_string()),
            market: Some("创业板".to_string()),
            list_date: Some("2018-06-11".to_string()),
            total_mv: Some(9800.0),
            circ_mv: Some(9200.0),
            pe: Some(22.4),
            pe_ttm: Some(21.9),
            pb: Some(4.8),
            ps: Some(3.2),
            turnover_rate: Some(1.4),
            roe: Some(18.9),
            total_share: Some(4_405.0),
            trade_date: Some("2026-07-31".to_string()),
            updated_at: Utc::now(),
        },
    ]
}

/// Daily-basic rows matching [`stock_basics`]'s codes, for consistency-check
/// tests; `jitter` nudges every metric by a fixed relative amount so callers
/// can construct a "disagreeing secondary source" deterministically.
#[must_use]
pub fn daily_basic_rows(jitter: f64) -> Vec<DailyBasicRow> {
    vec![
        DailyBasicRow {
            code: "000001".to_string(),
            close: Some(12.0 * (1.0 + jitter)),
            turnover_rate: Some(0.8 * (1.0 + jitter)),
            pe: Some(5.2 * (1.0 + jitter)),
            pb: Some(0.6 * (1.0 + jitter)),
            ps: Some(1.1 * (1.0 + jitter)),
            total_mv: Some(2400.0 * (1.0 + jitter)),
            circ_mv: Some(2400.0 * (1.0 + jitter)),
        },
        DailyBasicRow {
            code: "300750".to_string(),
            close: Some(185.0 * (1.0 + jitter)),
            turnover_rate: Some(1.4 * (1.0 + jitter)),
            pe: Some(22.4 * (1.0 + jitter)),
            pb: Some(4.8 * (1.0 + jitter)),
            ps: Some(3.2 * (1.0 + jitter)),
            total_mv: Some(9800.0 * (1.0 + jitter)),
            circ_mv: Some(9200.0 * (1.0 + jitter)),
        },
    ]
}

/// A single realtime quote for `code`.
#[must_use]
pub fn quote(code: &str, source: &str) -> MarketQuote {
    MarketQuote {
        id: None,
        code: code.to_string(),
        symbol: Some(format!("{code}.SZ")),
        close: 12.34,
        open: Some(12.0),
        high: Some(12.5),
        low: Some(11.9),
        pre_close: Some(12.1),
        pct_chg: Some(1.98),
        volume: Some(1_230_000.0),
        amount: Some(15_200_000.0),
        trade_date: "2026-07-31".to_string(),
        source: source.to_string(),
        updated_at: Utc::now(),
    }
}

/// `n` ordered (oldest-first) daily bars ending 2026-07-31.
#[must_use]
pub fn kline(code: &str, source: &str, period: Period, n: u32) -> Vec<HistoricalBar> {
    (0..n)
        .map(|i| {
            let day = 31u32.saturating_sub(n).saturating_add(i).max(1);
            HistoricalBar {
                id: None,
                symbol: code.to_string(),
                trade_date: format!("2026-07-{day:02}"),
                data_source: source.to_string(),
                period,
                open: 10.0 + f64::from(i) * 0.1,
                high: 10.2 + f64::from(i) * 0.1,
                low: 9.8 + f64::from(i) * 0.1,
                close: 10.1 + f64::from(i) * 0.1,
                pre_close: if i == 0 { None } else { Some(10.1 + f64::from(i - 1) * 0.1) },
                volume: 1_000_000.0 + f64::from(i) * 1_000.0,
                amount: Some(10_000_000.0),
            }
        })
        .collect()
}

/// One news item and one announcement for `code`.
#[must_use]
pub fn news(code: &str) -> Vec<NewsItem> {
    vec![
        NewsItem {
            code: code.to_string(),
            kind: NewsKind::News,
            title: "季度业绩超预期".to_string(),
            published_at: Utc::now(),
            url: Some("https://example.com/news/1".to_string()),
        },
        NewsItem {
            code: code.to_string(),
            kind: NewsKind::Announcement,
            title: "关于股东大会决议的公告".to_string(),
            published_at: Utc::now(),
            url: None,
        },
    ]
}

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::Serialize;

use crate::fmp::FmpProvider;

/// Real-time financial snapshot. The teacher's Python original fetches this
/// via the `yfinance` library first, falling back to Yahoo's chart API; no
/// Rust equivalent of `yfinance` exists in the dependency stack, so the
/// chart API (its own documented fallback) is used directly as the primary
/// path, then optionally gap-filled from FMP exactly as the original does.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinancialSnapshot {
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
    pub fifty_two_week_range: Option<String>,
    pub trailing_pe: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub profit_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub next_earnings_date: Option<NaiveDate>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub beta: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub source: String,
}

impl FinancialSnapshot {
    fn needs_gap_fill(&self) -> bool {
        self.market_cap.is_none()
            || self.revenue_growth.is_none()
            || self.earnings_growth.is_none()
            || self.gross_margin.is_none()
            || self.operating_margin.is_none()
            || self.profit_margin.is_none()
            || self.peg_ratio.is_none()
            || self.beta.is_none()
            || self.trailing_pe.is_none()
            || self.debt_to_equity.is_none()
            || self.current_ratio.is_none()
            || self.dividend_yield.is_none()
    }
}

async fn fetch_via_chart_api(client: &Client, ticker: &str) -> FinancialSnapshot {
    let mut snapshot = FinancialSnapshot {
        symbol: Some(ticker.to_string()),
        source: "yahoo_chart_fallback".to_string(),
        ..Default::default()
    };

    let url = format!("https://query1.finance.yahoo.com/v8/finance/chart/{ticker}");
    let Ok(resp) = client.get(&url).query(&[("interval", "1d"), ("range", "1d")]).send().await else {
        return snapshot;
    };
    if !resp.status().is_success() {
        return snapshot;
    }
    let Ok(body) = resp.json::<serde_json::Value>().await else { return snapshot };

    let Some(result) = body.pointer("/chart/result/0") else { return snapshot };
    let metadata = &result["meta"];

    snapshot.price = metadata.get("regularMarketPrice").and_then(|v| v.as_f64());
    snapshot.currency = metadata.get("currency").and_then(|v| v.as_str()).map(str::to_string);
    snapshot.market_cap = metadata.get("marketCap").and_then(|v| v.as_f64());
    snapshot.trailing_pe = metadata.get("trailingPE").and_then(|v| v.as_f64());

    let low = metadata.get("fiftyTwoWeekLow").and_then(|v| v.as_f64());
    let high = metadata.get("fiftyTwoWeekHigh").and_then(|v| v.as_f64());
    if let (Some(low), Some(high)) = (low, high) {
        snapshot.fifty_two_week_range = Some(format!("{low:.2} - {high:.2}"));
    }

    snapshot
}

/// Fills unset fields from FMP's profile and ratios-ttm endpoints, tags
/// `source` with `+fmp` suffix if anything was filled. Mirrors
/// `_fmp_enrich_snapshot`.
async fn fmp_enrich(snapshot: &mut FinancialSnapshot, fmp: &FmpProvider, ticker: &str) {
    if !snapshot.needs_gap_fill() {
        return;
    }

    let mut filled_any = false;

    if let Some(profile) = fmp.fetch_profile(ticker).await {
        if snapshot.market_cap.is_none() {
            snapshot.market_cap = profile.get("mktCap").and_then(|v| v.as_f64());
            filled_any |= snapshot.market_cap.is_some();
        }
        if snapshot.beta.is_none() {
            snapshot.beta = profile.get("beta").and_then(|v| v.as_f64());
            filled_any |= snapshot.beta.is_some();
        }
        if snapshot.sector.is_none() {
            snapshot.sector = profile.get("sector").and_then(|v| v.as_str()).map(str::to_string);
        }
        if snapshot.industry.is_none() {
            snapshot.industry = profile.get("industry").and_then(|v| v.as_str()).map(str::to_string);
        }
        if snapshot.dividend_yield.is_none() {
            snapshot.dividend_yield = profile.get("lastDiv").and_then(|v| v.as_f64());
            filled_any |= snapshot.dividend_yield.is_some();
        }
    }

    if let Some(ratios) = fmp.fetch_ratios_ttm(ticker).await {
        if snapshot.trailing_pe.is_none() {
            snapshot.trailing_pe = ratios.get("peRatioTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.trailing_pe.is_some();
        }
        if snapshot.peg_ratio.is_none() {
            snapshot.peg_ratio = ratios.get("pegRatioTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.peg_ratio.is_some();
        }
        if snapshot.gross_margin.is_none() {
            snapshot.gross_margin = ratios.get("grossProfitMarginTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.gross_margin.is_some();
        }
        if snapshot.operating_margin.is_none() {
            snapshot.operating_margin = ratios.get("operatingProfitMarginTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.operating_margin.is_some();
        }
        if snapshot.profit_margin.is_none() {
            snapshot.profit_margin = ratios.get("netProfitMarginTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.profit_margin.is_some();
        }
        if snapshot.debt_to_equity.is_none() {
            snapshot.debt_to_equity = ratios.get("debtEquityRatioTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.debt_to_equity.is_some();
        }
        if snapshot.current_ratio.is_none() {
            snapshot.current_ratio = ratios.get("currentRatioTTM").and_then(|v| v.as_f64());
            filled_any |= snapshot.current_ratio.is_some();
        }
    }

    if filled_any {
        snapshot.source = format!("{}+fmp", snapshot.source);
    }
}

pub async fn fetch_financial_snapshot(client: &Client, fmp: Option<&FmpProvider>, ticker: &str) -> FinancialSnapshot {
    let mut snapshot = fetch_via_chart_api(client, ticker).await;
    if let Some(fmp) = fmp {
        if fmp.is_configured() {
            fmp_enrich(&mut snapshot, fmp, ticker).await;
        }
    }
    snapshot
}

/// One year of closing-price stats, grounded on the yfinance history frame
/// the original derives `ytd_return`/`one_month_return`/`three_month_return`/
/// `range_position` from. No yfinance equivalent exists in the stack, so this
/// reuses the chart API `fetch_via_chart_api` already falls back to, with a
/// wider `range` to get a daily close series instead of just `meta`.
#[derive(Debug, Clone, Serialize)]
pub struct PriceHistory {
    pub current: f64,
    pub fifty_two_week_high: f64,
    pub fifty_two_week_low: f64,
    pub ytd_return: Option<f64>,
    pub one_month_return: Option<f64>,
    pub three_month_return: Option<f64>,
    pub range_position: Option<f64>,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn parse_range(range: Option<&str>) -> Option<(f64, f64)> {
    let mut parts = range?.split(" - ");
    let low: f64 = parts.next()?.trim().parse().ok()?;
    let high: f64 = parts.next()?.trim().parse().ok()?;
    Some((low, high))
}

/// Falls back to the single-day snapshot's 52-week range when the history
/// fetch fails or returns no closes, same as the original's behavior when
/// the yfinance history call raises.
fn fallback_price_history(snapshot: &FinancialSnapshot) -> Option<PriceHistory> {
    let current = snapshot.price?;
    let (low, high) = parse_range(snapshot.fifty_two_week_range.as_deref())?;
    let range_position = (high > low).then(|| round3((current - low) / (high - low)));
    Some(PriceHistory {
        current,
        fifty_two_week_high: high,
        fifty_two_week_low: low,
        ytd_return: None,
        one_month_return: None,
        three_month_return: None,
        range_position,
    })
}

pub async fn fetch_price_history(client: &Client, ticker: &str, fallback: &FinancialSnapshot) -> Option<PriceHistory> {
    let url = format!("https://query1.finance.yahoo.com/v8/finance/chart/{ticker}");
    let Ok(resp) = client.get(&url).query(&[("interval", "1d"), ("range", "1y")]).send().await else {
        return fallback_price_history(fallback);
    };
    if !resp.status().is_success() {
        return fallback_price_history(fallback);
    }
    let Ok(body) = resp.json::<serde_json::Value>().await else {
        return fallback_price_history(fallback);
    };
    let Some(result) = body.pointer("/chart/result/0") else {
        return fallback_price_history(fallback);
    };

    let timestamps: Vec<i64> = result.pointer("/timestamp").and_then(|v| v.as_array()).map(|a| a.iter().filter_map(|v| v.as_i64()).collect()).unwrap_or_default();
    let closes: Vec<(f64, i64)> = result
        .pointer("/indicators/quote/0/close")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .zip(timestamps.iter())
        .filter_map(|(v, ts)| v.as_f64().map(|c| (c, *ts)))
        .collect();
    if closes.is_empty() {
        return fallback_price_history(fallback);
    }

    let current = closes.last().map(|(c, _)| *c).unwrap_or_default();
    let fifty_two_week_high = closes.iter().map(|(c, _)| *c).fold(f64::MIN, f64::max);
    let fifty_two_week_low = closes.iter().map(|(c, _)| *c).fold(f64::MAX, f64::min);
    let range_position = (fifty_two_week_high > fifty_two_week_low).then(|| round3((current - fifty_two_week_low) / (fifty_two_week_high - fifty_two_week_low)));

    let today = chrono::Utc::now().date_naive();
    let return_from = |cutoff: NaiveDate| -> Option<f64> {
        let start_close = closes
            .iter()
            .find(|(_, ts)| chrono::DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive() >= cutoff).unwrap_or(false))
            .map(|(c, _)| *c)?;
        (start_close != 0.0).then(|| round3((current - start_close) / start_close))
    };

    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let ytd_return = return_from(year_start);
    let one_month_return = return_from(today - chrono::Duration::days(30));
    let three_month_return = return_from(today - chrono::Duration::days(90));

    Some(PriceHistory { current, fifty_two_week_high, fifty_two_week_low, ytd_return, one_month_return, three_month_return, range_position })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_gap_fill_detects_any_unset_field() {
        let mut snapshot = FinancialSnapshot::default();
        assert!(snapshot.needs_gap_fill());
        snapshot.market_cap = Some(1.0);
        snapshot.revenue_growth = Some(1.0);
        snapshot.earnings_growth = Some(1.0);
        snapshot.gross_margin = Some(1.0);
        snapshot.operating_margin = Some(1.0);
        snapshot.profit_margin = Some(1.0);
        snapshot.peg_ratio = Some(1.0);
        snapshot.beta = Some(1.0);
        snapshot.trailing_pe = Some(1.0);
        snapshot.debt_to_equity = Some(1.0);
        snapshot.current_ratio = Some(1.0);
        snapshot.dividend_yield = Some(1.0);
        assert!(!snapshot.needs_gap_fill());
    }
}

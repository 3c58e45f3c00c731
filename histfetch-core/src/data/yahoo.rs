//! Yahoo Finance history provider.
//!
//! Talks to Yahoo's v8 chart API with a blocking client. One HTTP request per
//! call; fallback and pacing live in the pipeline above.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. The CSV directory provider is the offline alternative.

use super::provider::{
    DataError, FetchOptions, HistoryProvider, HistoryRow, PeriodBucket,
};
use super::range::DateRange;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the provider at another chart endpoint (mirrors, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Chart URL for an inclusive date range.
    fn range_url(&self, symbol: &str, range: DateRange, options: &FetchOptions) -> String {
        let start_ts = range.start.and_hms_opt(0, 0, 0).map_or(0, |dt| dt.and_utc().timestamp());
        let end_ts = range
            .end
            .and_hms_opt(23, 59, 59)
            .map_or(start_ts, |dt| dt.and_utc().timestamp());
        format!(
            "{}/{symbol}?period1={start_ts}&period2={end_ts}&interval={}\
             &includePrePost={}&includeAdjustedClose=true",
            self.base_url,
            options.granularity.as_str(),
            options.include_extended_hours,
        )
    }

    fn period_url(&self, symbol: &str, period: PeriodBucket) -> String {
        format!(
            "{}/{symbol}?range={period}&interval=1d&includeAdjustedClose=true",
            self.base_url
        )
    }

    fn get(&self, symbol: &str, url: &str) -> Result<ChartResponse, DataError> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::NetworkUnreachable(format!("timeout fetching {symbol}: {e}"))
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
                symbol: symbol.to_string(),
            });
        }

        resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })
    }
}

/// Turn a chart response into rows.
///
/// With `adjusted`, open/high/low/close are scaled by `adjclose / close` and
/// no `adj_close` field is emitted. Without it, `adj_close` is passed through
/// when Yahoo supplies it.
fn parse_response(
    symbol: &str,
    resp: ChartResponse,
    adjusted: bool,
) -> Result<Vec<HistoryRow>, DataError> {
    let result = resp.chart.result.ok_or_else(|| {
        if let Some(err) = resp.chart.error {
            if err.code == "Not Found" {
                DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }
            } else {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
        } else {
            DataError::ResponseFormatChanged("empty result with no error".into())
        }
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    // No timestamps: the window holds no trading days.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date: NaiveDate = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let at = |series: &Vec<Option<f64>>| series.get(i).copied().flatten();
        let open = at(&quote.open);
        let high = at(&quote.high);
        let low = at(&quote.low);
        let close = at(&quote.close);
        let volume = at(&quote.volume);
        let adj_close = adj_closes.as_ref().and_then(|v| at(v));

        // Holidays and halts come back as all-null rows.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }

        let factor = match (adjusted, adj_close, close) {
            (true, Some(adj), Some(c)) if c != 0.0 && adj.is_finite() => adj / c,
            _ => 1.0,
        };

        let mut row = HistoryRow::new(date);
        for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            row.values
                .insert(name.to_string(), value.map_or(f64::NAN, |v| v * factor));
        }
        row.values
            .insert("volume".to_string(), volume.unwrap_or(f64::NAN));
        if !adjusted {
            if let Some(adj) = adj_close {
                row.values.insert("adj_close".to_string(), adj);
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

impl HistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_range(
        &self,
        identifier: &str,
        range: DateRange,
        options: &FetchOptions,
    ) -> Result<Vec<HistoryRow>, DataError> {
        let url = self.range_url(identifier, range, options);
        let chart = self.get(identifier, &url)?;
        let rows = parse_response(identifier, chart, options.adjusted)?;
        // Extended-hours timestamps can spill onto the neighbouring day.
        Ok(rows.into_iter().filter(|r| range.contains(r.date)).collect())
    }

    fn fetch_period(
        &self,
        identifier: &str,
        period: PeriodBucket,
    ) -> Result<Vec<HistoryRow>, DataError> {
        let url = self.period_url(identifier, period);
        let chart = self.get(identifier, &url)?;
        parse_response(identifier, chart, FetchOptions::default().adjusted)
    }
}

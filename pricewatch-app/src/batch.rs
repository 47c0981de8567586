//! CSV batch mode: one query per input row, strictly in sequence.
//!
//! Every input row yields exactly one output row. A row whose fetch fails or
//! finds nothing carries [`NO_PRICES_FOUND`] in the recommendation column and
//! the batch moves on.

use crate::pipeline::Pipeline;
use anyhow::{Context, Result, bail};
use pricewatch_config::BatchSettings;
use pricewatch_market::Offer;
use pricewatch_market::extract::parse_price;
use std::io::{Read, Write};

pub const NO_PRICES_FOUND: &str = "no prices found";

pub const OUTPUT_HEADERS: [&str; 4] = ["item name", "current price", "offers", "recommendation"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub priced: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
}

fn column_index(headers: &csv::StringRecord, wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted))
}

/// `$ 25.000` or `25000`; anything else is treated as unknown.
fn parse_current_price(raw: &str) -> Option<u64> {
    parse_price(raw.trim().trim_start_matches('$'), ". ")
}

/// `price name <url>` per offer, joined by ` | `.
pub fn format_offers(offers: &[Offer]) -> String {
    offers
        .iter()
        .map(|o| {
            let mut entry = o.price.to_string();
            if let Some(name) = &o.name {
                entry.push(' ');
                entry.push_str(name);
            }
            if let Some(url) = &o.url {
                entry.push_str(&format!(" <{url}>"));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub async fn run_batch<R: Read, W: Write>(
    pipeline: &Pipeline,
    columns: &BatchSettings,
    input: R,
    output: W,
) -> Result<BatchSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers().context("reading CSV header")?.clone();

    let Some(item_idx) = column_index(&headers, &columns.item_column) else {
        bail!(
            "input has no '{}' column (found: {})",
            columns.item_column,
            headers.iter().collect::<Vec<_>>().join(", ")
        );
    };
    let Some(price_idx) = column_index(&headers, &columns.price_column) else {
        bail!(
            "input has no '{}' column (found: {})",
            columns.price_column,
            headers.iter().collect::<Vec<_>>().join(", ")
        );
    };

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(OUTPUT_HEADERS)?;

    let mut summary = BatchSummary::default();
    for (line, record) in reader.records().enumerate() {
        summary.rows += 1;
        let row = line + 2;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(row, error = %err, "batch.row.unreadable");
                summary.failed += 1;
                writer.write_record(["", "", "", NO_PRICES_FOUND])?;
                continue;
            }
        };
        let item = record.get(item_idx).unwrap_or("").trim();
        let price_raw = record.get(price_idx).unwrap_or("").trim();

        if item.is_empty() {
            tracing::warn!(row, "batch.row.empty_item");
            summary.skipped += 1;
            writer.write_record([item, price_raw, "", NO_PRICES_FOUND])?;
            continue;
        }

        let current_price = parse_current_price(price_raw);
        if current_price.is_none() && !price_raw.is_empty() {
            tracing::warn!(row, item, price = price_raw, "batch.row.unparsed_price");
        }

        let (offers, recommendation) = match pipeline.run(item, current_price).await {
            Ok(outcome) if outcome.ranked.is_empty() => {
                summary.empty += 1;
                (String::new(), NO_PRICES_FOUND.to_string())
            }
            Ok(outcome) => {
                summary.priced += 1;
                (
                    format_offers(outcome.ranked.offers()),
                    outcome.recommendation.unwrap_or_default(),
                )
            }
            Err(err) => {
                tracing::warn!(row, item, timeout = err.is_timeout(), error = %err, "batch.row.failed");
                summary.failed += 1;
                (String::new(), NO_PRICES_FOUND.to_string())
            }
        };

        writer.write_record([item, price_raw, offers.as_str(), recommendation.as_str()])?;
        writer.flush()?;
        tracing::debug!(row, item, "batch.row.done");
    }
    writer.flush()?;

    tracing::info!(
        rows = summary.rows,
        priced = summary.priced,
        empty = summary.empty,
        failed = summary.failed,
        skipped = summary.skipped,
        "batch.done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedLlm, listing_page, pipeline_for};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn read_rows(bytes: &[u8]) -> Vec<Vec<String>> {
        csv::Reader::from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn current_price_accepts_symbol_and_separators() {
        assert_eq!(parse_current_price("$ 25.000"), Some(25000));
        assert_eq!(parse_current_price("25000"), Some(25000));
        assert_eq!(parse_current_price("a consultar"), None);
        assert_eq!(parse_current_price(""), None);
    }

    #[test]
    fn offers_column_skips_missing_parts() {
        let offers = vec![
            Offer {
                name: Some("Mate".into()),
                price: 5000,
                url: Some("https://x/1".into()),
            },
            Offer {
                name: None,
                price: 7000,
                url: None,
            },
        ];
        assert_eq!(format_offers(&offers), "5000 Mate <https://x/1> | 7000");
    }

    #[tokio::test]
    async fn failing_row_does_not_stop_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mate-imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[
                ("Mate Imperial", "40.000"),
                ("Mate Imperial Alpaca", "35.000"),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bombilla"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/yerba-organica"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/termo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&[("Termo", "20.000")])),
            )
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::ok("Keep it under $38.000."));
        let pipeline = pipeline_for(&server, Some(llm.clone()), Duration::from_secs(5));

        let input = "\
 Item Name ,Current Price,notes
mate imperial,$ 45.000,x
bombilla,3000,
yerba organica,,
,100,
termo,abc,
";
        let mut out = Vec::new();
        let summary = run_batch(&pipeline, &BatchSettings::default(), input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                rows: 5,
                priced: 2,
                empty: 1,
                failed: 1,
                skipped: 1,
            }
        );
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
        assert!(llm.last_prompt().unwrap().contains("ITEM: \"termo\""));

        let rows = read_rows(&out);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0][0], "mate imperial");
        assert_eq!(rows[0][1], "$ 45.000");
        assert!(rows[0][2].starts_with("35000 Mate Imperial Alpaca <"));
        assert_eq!(rows[0][3], "Keep it under $38.000.");
        assert_eq!(rows[1], vec!["bombilla", "3000", "", NO_PRICES_FOUND]);
        assert_eq!(rows[2], vec!["yerba organica", "", "", NO_PRICES_FOUND]);
        assert_eq!(rows[3], vec!["", "100", "", NO_PRICES_FOUND]);
        assert_eq!(rows[4][0], "termo");
        assert!(rows[4][2].starts_with("20000 Termo <"));
    }

    #[tokio::test]
    async fn header_row_is_always_written() {
        let server = MockServer::start().await;
        let pipeline = pipeline_for(&server, None, Duration::from_secs(1));

        let mut out = Vec::new();
        run_batch(
            &pipeline,
            &BatchSettings::default(),
            "item name,current price\n".as_bytes(),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "item name,current price,offers,recommendation\n"
        );
    }

    #[tokio::test]
    async fn missing_column_is_an_error() {
        let server = MockServer::start().await;
        let pipeline = pipeline_for(&server, None, Duration::from_secs(1));

        let err = run_batch(
            &pipeline,
            &BatchSettings::default(),
            "producto,precio\nmate,100\n".as_bytes(),
            Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("'item name'"), "{err}");
    }
}

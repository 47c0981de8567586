//! Terminal output for query outcomes.

use crate::pipeline::Outcome;
use pricewatch_market::{FetchFailure, Offer};
use serde::Serialize;
use std::io::{self, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const NAME_MAX_WIDTH: usize = 60;
const MISSING: &str = "-";

/// `$ 1.250.000` style, as the listing pages show prices.
pub fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("$ {grouped}")
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

fn table_rows(offers: &[Offer]) -> Vec<[String; 4]> {
    offers
        .iter()
        .enumerate()
        .map(|(i, o)| {
            [
                (i + 1).to_string(),
                format_price(o.price),
                truncate_to_width(o.name.as_deref().unwrap_or(MISSING), NAME_MAX_WIDTH),
                o.url.clone().unwrap_or_else(|| MISSING.to_string()),
            ]
        })
        .collect()
}

/// Ranked offers as an aligned table, then the recommendation block.
pub fn outcome<W: Write>(out: &mut W, query: &str, outcome: &Outcome) -> io::Result<()> {
    let header = ["#", "Price", "Name", "Link"];
    let rows = table_rows(outcome.ranked.offers());

    let mut widths = header.map(|h| h.width());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.width());
        }
    }

    writeln!(
        out,
        "Cheapest listings for \"{}\" ({} shown)",
        query,
        rows.len()
    )?;
    writeln!(out)?;
    let line = |cells: [&str; 4]| -> String {
        let mut s = format!("{:>w$}", cells[0], w = widths[0]);
        for (cell, w) in cells[1..3].iter().zip(&widths[1..3]) {
            s.push_str("  ");
            s.push_str(&pad(cell, *w));
        }
        s.push_str("  ");
        s.push_str(cells[3]);
        s
    };
    writeln!(out, "{}", line(header))?;
    writeln!(
        out,
        "{}",
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    )?;
    for row in &rows {
        writeln!(out, "{}", line([&row[0], &row[1], &row[2], &row[3]]))?;
    }

    if let Some(text) = &outcome.recommendation {
        writeln!(out)?;
        writeln!(out, "Recommendation")?;
        writeln!(out, "{}", text.trim())?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonOutcome<'a> {
    query: &'a str,
    offers: &'a [Offer],
    recommendation: Option<&'a str>,
}

pub fn outcome_json<W: Write>(out: &mut W, query: &str, outcome: &Outcome) -> io::Result<()> {
    let doc = JsonOutcome {
        query,
        offers: outcome.ranked.offers(),
        recommendation: outcome.recommendation.as_deref(),
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)
}

pub fn no_results<W: Write>(out: &mut W, query: &str) -> io::Result<()> {
    writeln!(out, "warning: no prices found for \"{query}\"")
}

pub fn fetch_failure<W: Write>(out: &mut W, query: &str, err: &FetchFailure) -> io::Result<()> {
    if err.is_timeout() {
        writeln!(
            out,
            "warning: the search for \"{query}\" timed out, try again later"
        )
    } else {
        writeln!(out, "warning: could not get prices for \"{query}\": {err}")
    }
}

pub fn empty_query<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "warning: enter an item to search for")
}

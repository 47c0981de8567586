use crate::pipeline::Pipeline;
use crate::render;
use anyhow::Result;
use pricewatch_config::PriceWatchConfig;
use std::io::{BufRead, Write};

const PROMPT: &str = "item> ";

/// One query, rendered to `out`; warnings go to `warn`. Handled failures
/// are not errors.
pub async fn search_once<W: Write, E: Write>(
    pipeline: &Pipeline,
    query: &str,
    json: bool,
    out: &mut W,
    warn: &mut E,
) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        render::empty_query(warn)?;
        return Ok(());
    }

    match pipeline.run(query, None).await {
        Ok(outcome) if json => {
            if outcome.ranked.is_empty() {
                render::no_results(warn, query)?;
            }
            render::outcome_json(out, query, &outcome)?;
        }
        Ok(outcome) if outcome.ranked.is_empty() => render::no_results(warn, query)?,
        Ok(outcome) => render::outcome(out, query, &outcome)?,
        Err(err) => render::fetch_failure(warn, query, &err)?,
    }
    out.flush()?;
    Ok(())
}

/// Prompt loop. Returns the number of queries run.
pub async fn interactive<R: BufRead, W: Write, E: Write>(
    pipeline: &Pipeline,
    input: R,
    out: &mut W,
    warn: &mut E,
) -> Result<usize> {
    writeln!(
        out,
        "Type an item to search for; 'exit' or 'quit' to leave.{}",
        if pipeline.recommends() {
            ""
        } else {
            " (recommendations off)"
        }
    )?;
    write!(out, "{PROMPT}")?;
    out.flush()?;

    let mut queries = 0;
    for line in input.lines() {
        let line = line?;
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            render::empty_query(warn)?;
        } else {
            search_once(pipeline, query, false, out, warn).await?;
            queries += 1;
            writeln!(out)?;
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }
    tracing::info!(queries, "interactive.done");
    Ok(queries)
}

pub fn list_selectors<W: Write>(cfg: &PriceWatchConfig, out: &mut W) -> Result<()> {
    let active = &cfg.extraction.selector_set;
    for set in cfg.selector_sets() {
        let marker = if &set.version == active { "*" } else { " " };
        writeln!(out, "{marker} {}", set.version)?;
        writeln!(out, "    item:  {}", set.item)?;
        writeln!(out, "    name:  {}", set.name)?;
        writeln!(out, "    price: {}", set.price)?;
        writeln!(out, "    url:   {}", set.url)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{listing_page, pipeline_for};
    use pricewatch_config::PriceWatchConfigLoader;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn interactive_runs_each_line_until_exit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&[("Mate", "5.000")])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nada"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = pipeline_for(&server, None, Duration::from_secs(5));
        let input = "mate\n\n  nada \nQUIT\nnever\n";
        let (mut out, mut warn) = (Vec::new(), Vec::new());

        let queries = interactive(&pipeline, input.as_bytes(), &mut out, &mut warn)
            .await
            .unwrap();

        assert_eq!(queries, 2);
        let out = String::from_utf8(out).unwrap();
        let warn = String::from_utf8(warn).unwrap();
        assert!(out.contains("Cheapest listings for \"mate\" (1 shown)"));
        assert!(warn.contains("enter an item"));
        assert!(warn.contains("no prices found for \"nada\""));
    }

    #[tokio::test]
    async fn fetch_failures_are_warnings_not_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let pipeline = pipeline_for(&server, None, Duration::from_secs(5));
        let (mut out, mut warn) = (Vec::new(), Vec::new());
        search_once(&pipeline, "mate", false, &mut out, &mut warn)
            .await
            .unwrap();

        assert!(out.is_empty());
        assert!(String::from_utf8(warn).unwrap().contains("could not get prices for \"mate\""));
    }

    #[tokio::test]
    async fn json_output_is_a_single_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[
                ("Mate Camionero", "12.000"),
                ("Mate", "5.000"),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nada"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
            .mount(&server)
            .await;

        let pipeline = pipeline_for(&server, None, Duration::from_secs(5));

        let (mut out, mut warn) = (Vec::new(), Vec::new());
        search_once(&pipeline, "mate", true, &mut out, &mut warn)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["query"], "mate");
        assert_eq!(doc["offers"][0]["price"], 5000);
        assert_eq!(doc["offers"][1]["name"], "Mate Camionero");
        assert!(doc["recommendation"].is_null());
        assert!(warn.is_empty());

        let (mut out, mut warn) = (Vec::new(), Vec::new());
        search_once(&pipeline, "nada", true, &mut out, &mut warn)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["offers"], serde_json::json!([]));
        assert!(String::from_utf8(warn).unwrap().contains("no prices found for \"nada\""));
    }

    #[test]
    fn active_selector_set_is_marked() {
        let cfg = PriceWatchConfigLoader::new()
            .with_yaml_str("extraction:\n  selector_set: ml-ar-poly")
            .load()
            .unwrap();
        let mut out = Vec::new();
        list_selectors(&cfg, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  ml-ar-2024\n"));
        assert!(text.contains("* ml-ar-poly\n"));
    }
}

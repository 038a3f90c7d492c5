use super::*;

use url::Url;

mod bridge_and_engine;
mod dom_and_html;
mod script_builtins;
mod script_language;
mod selector_engine;

fn base_url() -> Result<Url> {
    Url::parse("https://page.test/dir/index.html").map_err(|err| Error::InvalidUrl {
        url: "https://page.test/dir/index.html".into(),
        reason: err.to_string(),
    })
}

/// Fetcher serving `(url, body)` pairs; every other URL answers 404.
fn fixed_fetcher(routes: &[(&str, &str)]) -> impl ScriptFetcher + 'static {
    let routes: Vec<(String, String)> = routes
        .iter()
        .map(|(url, body)| (url.to_string(), body.to_string()))
        .collect();
    move |url: &Url| -> Result<String> {
        routes
            .iter()
            .find(|(route, _)| route == url.as_str())
            .map(|(_, body)| body.clone())
            .ok_or_else(|| Error::Fetch {
                url: url.to_string(),
                reason: "failed to fetch script, status code: 404".into(),
            })
    }
}

fn engine_with(config: ScriptConfig, routes: &[(&str, &str)]) -> ExecutionEngine {
    ExecutionEngine::with_fetcher(config, fixed_fetcher(routes))
}

/// Parses `html` and runs its scripts without network access.
fn run_page(html: &str) -> Result<(Document, ExecutionReport)> {
    run_page_with(html, &[])
}

fn run_page_with(html: &str, routes: &[(&str, &str)]) -> Result<(Document, ExecutionReport)> {
    let document = Document::parse(html);
    let mut engine = engine_with(ScriptConfig::default(), routes);
    let report = engine.execute(&document, &base_url()?)?;
    Ok((document, report))
}

fn assert_text(document: &Document, selector: &str, expected: &str) -> Result<()> {
    let actual = document.text(selector)?;
    assert_eq!(
        actual.as_deref(),
        Some(expected),
        "text of {selector} in {}",
        document.to_html()
    );
    Ok(())
}

fn eval(source: &str) -> Result<HostValue> {
    Interpreter::new().run(source, "test")
}

fn eval_string(source: &str) -> Result<String> {
    match eval(source)? {
        HostValue::String(value) => Ok(value),
        other => panic!("expected string from {source:?}, got {other:?}"),
    }
}

fn eval_number(source: &str) -> Result<f64> {
    match eval(source)? {
        HostValue::Number(value) => Ok(value),
        other => panic!("expected number from {source:?}, got {other:?}"),
    }
}

fn eval_bool(source: &str) -> Result<bool> {
    match eval(source)? {
        HostValue::Bool(value) => Ok(value),
        other => panic!("expected bool from {source:?}, got {other:?}"),
    }
}

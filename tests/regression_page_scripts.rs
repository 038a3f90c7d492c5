use page_script::{
    DiagnosticKind, Document, Error, ExecutionEngine, Page, ScriptConfig, ScriptFetcher,
    ScriptSource,
};
use url::Url;

fn offline_engine(config: ScriptConfig) -> ExecutionEngine {
    ExecutionEngine::with_fetcher(config, |url: &Url| -> page_script::Result<String> {
        Err(Error::Fetch {
            url: url.to_string(),
            reason: "offline".into(),
        })
    })
}

fn load(html: &str) -> page_script::Result<Page> {
    let mut engine = offline_engine(ScriptConfig::default());
    Page::from_html_with_engine("https://site.test/app/", html, &mut engine)
}

#[test]
fn regex_literals_with_quotes_do_not_confuse_script_extraction() -> page_script::Result<()> {
    let page = load(
        r##"
    <div id="result">init</div>
    <script>
      const sanitizer = /["'<]/g;
      document.getElementById("result").textContent = "a\"b<c".replace(sanitizer, "_");
    </script>
    "##,
    )?;
    assert_eq!(page.text("#result")?.as_deref(), Some("a_b_c"));
    Ok(())
}

#[test]
fn script_text_containing_closing_like_markup_survives() -> page_script::Result<()> {
    let page = load(
        r#"
    <div id="result"></div>
    <script>
      var html = "<p>" + "<\/p>";
      document.getElementById("result").innerHTML = html + "<span>ok</span>";
    </script>
    "#,
    )?;
    assert_eq!(page.inner_html("#result")?.as_deref(), Some("<p></p><span>ok</span>"));
    Ok(())
}

#[test]
fn rendering_a_list_from_data_builds_markup() -> page_script::Result<()> {
    let page = load(
        r##"
    <ul id="list"></ul>
    <p id="count"></p>
    <script>
      const items = [{ name: "Tea", price: 3 }, { name: "Cake", price: 4.5 }];
      const list = document.getElementById("list");
      list.innerHTML = items
        .map((item, i) => `<li data-i="${i}">${item.name}: ${item.price.toFixed(2)}</li>`)
        .join("");
      const rows = document.querySelectorAll("#list li");
      document.getElementById("count").textContent = rows.length + " rows, last=" + rows[rows.length - 1].getAttribute("data-i");
    </script>
    "##,
    )?;
    assert_eq!(
        page.inner_html("#list")?.as_deref(),
        Some(r#"<li data-i="0">Tea: 3.00</li><li data-i="1">Cake: 4.50</li>"#)
    );
    assert_eq!(page.text("#count")?.as_deref(), Some("2 rows, last=1"));
    Ok(())
}

#[test]
fn later_scripts_see_elements_created_by_earlier_ones() -> page_script::Result<()> {
    let page = load(
        r##"
    <div id="mount"></div>
    <script>document.getElementById("mount").innerHTML = '<button id="go" class="btn primary">Go</button>';</script>
    <script>
      var button = document.querySelector("#mount .btn.primary");
      button.setAttribute("aria-pressed", "true");
      button.innerText = button.innerText.toUpperCase();
    </script>
    "##,
    )?;
    assert_eq!(page.text("#go")?.as_deref(), Some("GO"));
    assert_eq!(page.attribute("#go", "aria-pressed")?.as_deref(), Some("true"));
    assert!(page.report().is_some_and(|report| report.is_clean()));
    Ok(())
}

#[test]
fn offline_externals_are_reported_but_inline_scripts_still_run() -> page_script::Result<()> {
    let page = load(
        r#"
    <script src="https://cdn.site.test/lib.js"></script>
    <p id="result">init</p>
    <script>
      document.getElementById("result").textContent =
        typeof window.libraryLoaded === "undefined" ? "no library" : "library";
    </script>
    "#,
    )?;
    assert_eq!(page.text("#result")?.as_deref(), Some("no library"));
    let report = page.report().ok_or(Error::DomSetup("missing report".into()))?;
    assert_eq!(
        report.failed,
        vec![ScriptSource::External {
            url: "https://cdn.site.test/lib.js".into()
        }]
    );
    assert_eq!(report.diagnostics.of_kind(DiagnosticKind::FetchFailed).count(), 1);
    Ok(())
}

#[test]
fn json_round_trips_through_dom_attributes() -> page_script::Result<()> {
    let page = load(
        r#"
    <div id="state" data-state='{"count":2,"tags":["a","b"]}'></div>
    <script>
      var el = document.getElementById("state");
      var state = JSON.parse(el.getAttribute("data-state"));
      state.count += 1;
      state.tags.push("c");
      el.setAttribute("data-state", JSON.stringify(state));
      el.textContent = state.tags.join("/");
    </script>
    "#,
    )?;
    assert_eq!(
        page.attribute("#state", "data-state")?.as_deref(),
        Some(r#"{"count":3,"tags":["a","b","c"]}"#)
    );
    assert_eq!(page.text("#state")?.as_deref(), Some("a/b/c"));
    Ok(())
}

#[test]
fn fetchers_can_be_plain_closures_over_the_resolved_url() -> page_script::Result<()> {
    let fetcher = |url: &Url| -> page_script::Result<String> {
        Ok(format!(
            "document.getElementById('seen').textContent = {:?};",
            url.as_str()
        ))
    };
    let base = Url::parse("https://site.test/app/page.html").map_err(|err| Error::InvalidUrl {
        url: "https://site.test/app/page.html".into(),
        reason: err.to_string(),
    })?;
    assert_eq!(
        fetcher.fetch(&base)?,
        "document.getElementById('seen').textContent = \"https://site.test/app/page.html\";"
    );

    let document = Document::parse(r#"<p id="seen"></p><script src="../lib/x.js?v=1"></script>"#);
    let mut engine = ExecutionEngine::with_fetcher(ScriptConfig::default(), fetcher);
    let report = engine.execute(&document, &base)?;
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(
        document.text("#seen")?.as_deref(),
        Some("https://site.test/lib/x.js?v=1")
    );
    Ok(())
}

#[test]
fn invalid_page_url_is_rejected() {
    let mut engine = offline_engine(ScriptConfig::default());
    match Page::from_html_with_engine("not a url", "<p></p>", &mut engine) {
        Err(Error::InvalidUrl { url, .. }) => assert_eq!(url, "not a url"),
        other => panic!("expected InvalidUrl, got {other:?}"),
    }
}

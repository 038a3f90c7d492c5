use super::*;

#[test]
fn inline_script_rewrites_inner_html() -> Result<()> {
    let (document, report) = run_page(
        r#"<div id="result">Before</div>
           <script>document.getElementById("result").innerHTML = "After <b>bold</b>";</script>"#,
    )?;
    assert_text(&document, "#result", "After bold")?;
    assert_eq!(document.query_selector_all("#result > b")?.len(), 1);
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.executed, vec![ScriptSource::Inline { index: 0 }]);
    Ok(())
}

#[test]
fn disabled_scripting_leaves_the_tree_untouched() -> Result<()> {
    let html = r#"<p id="p">same</p><script>document.getElementById("p").innerHTML = "changed";</script>"#;
    let document = Document::parse(html);
    let before = document.to_html();
    let mut engine = engine_with(ScriptConfig::default().with_javascript_enabled(false), &[]);
    let report = engine.execute(&document, &base_url()?)?;

    assert!(report.skipped);
    assert_eq!(report.inline_found, 0);
    assert!(report.executed.is_empty());
    assert_eq!(engine.state(), EngineState::Done);
    assert_eq!(document.to_html(), before);
    Ok(())
}

#[test]
fn lookups_return_null_and_empty_lists_when_nothing_matches() -> Result<()> {
    let (document, report) = run_page(
        r#"<p id="out"></p>
           <script>
             var out = document.getElementById("out");
             out.textContent = [
               document.getElementById("nope") === null,
               document.querySelector(".nope") === null,
               document.querySelectorAll(".nope").length,
               document.getElementsByTagName("table").length,
               window.document === document,
               typeof window.document.getElementById
             ].join(",");
           </script>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#out", "true,true,0,0,true,function")?;
    Ok(())
}

#[test]
fn failing_inline_script_does_not_stop_later_ones() -> Result<()> {
    let (document, report) = run_page(
        r#"<ol id="log"></ol>
           <script>document.getElementById("log").innerHTML += "<li>first</li>";</script>
           <script>undefinedFunction();</script>
           <script>var broken = ;</script>
           <script>document.getElementById("log").innerHTML += "<li>last</li>";</script>"#,
    )?;
    assert_eq!(document.query_selector_all("#log li")?.len(), 2);
    assert_eq!(
        report.executed,
        vec![ScriptSource::Inline { index: 0 }, ScriptSource::Inline { index: 3 }]
    );
    assert_eq!(
        report.failed,
        vec![ScriptSource::Inline { index: 1 }, ScriptSource::Inline { index: 2 }]
    );

    let messages: Vec<&str> = report
        .diagnostics
        .of_kind(DiagnosticKind::ScriptFailed)
        .map(|diagnostic| diagnostic.message.as_str())
        .collect();
    assert_eq!(messages.len(), 2);
    assert!(
        messages[0].starts_with("inline script #1: Uncaught ReferenceError"),
        "{}",
        messages[0]
    );
    assert!(messages[1].starts_with("inline script #2:"), "{}", messages[1]);
    Ok(())
}

#[test]
fn externals_run_before_inlines_regardless_of_position() -> Result<()> {
    let (document, report) = run_page_with(
        r#"<div id="order"></div>
           <script>document.getElementById("order").textContent += "inline;";</script>
           <script src="/js/a.js"></script>
           <script src="b.js"></script>"#,
        &[
            (
                "https://page.test/js/a.js",
                r#"document.getElementById("order").textContent += "a;";"#,
            ),
            (
                "https://page.test/dir/b.js",
                r#"document.getElementById("order").textContent += "b;";"#,
            ),
        ],
    )?;
    assert_text(&document, "#order", "a;b;inline;")?;
    assert_eq!(report.inline_found, 1);
    assert_eq!(report.external_found, 2);
    assert_eq!(
        report.executed,
        vec![
            ScriptSource::External { url: "/js/a.js".into() },
            ScriptSource::External { url: "b.js".into() },
            ScriptSource::Inline { index: 0 },
        ]
    );
    Ok(())
}

#[test]
fn globals_from_externals_are_visible_to_inlines() -> Result<()> {
    let (document, report) = run_page_with(
        r#"<span id="v"></span>
           <script>document.getElementById("v").textContent = helper(20);</script>
           <script src="lib.js"></script>"#,
        &[("https://page.test/dir/lib.js", "function helper(n) { return n + 1; }")],
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#v", "21")?;
    Ok(())
}

#[test]
fn one_failed_fetch_does_not_block_the_others() -> Result<()> {
    let (document, report) = run_page_with(
        r#"<p id="p"></p>
           <script src="one.js"></script>
           <script src="missing.js"></script>
           <script src="three.js"></script>
           <script src="http://[::1"></script>"#,
        &[
            ("https://page.test/dir/one.js", r#"document.getElementById("p").textContent += "1";"#),
            ("https://page.test/dir/three.js", r#"document.getElementById("p").textContent += "3";"#),
        ],
    )?;
    assert_text(&document, "#p", "13")?;
    assert_eq!(report.executed.len(), 2);
    assert_eq!(
        report.failed,
        vec![
            ScriptSource::External { url: "missing.js".into() },
            ScriptSource::External { url: "http://[::1".into() },
        ]
    );

    let fetch_failures: Vec<_> = report.diagnostics.of_kind(DiagnosticKind::FetchFailed).collect();
    assert_eq!(fetch_failures.len(), 1);
    assert!(fetch_failures[0].message.contains("status code: 404"));
    assert_eq!(
        report.diagnostics.of_kind(DiagnosticKind::UnresolvableUrl).count(),
        1
    );
    Ok(())
}

#[test]
fn invalid_selector_throws_a_catchable_syntax_error() -> Result<()> {
    let (document, report) = run_page(
        r#"<p id="out"></p>
           <script>
             var result;
             try { document.querySelector("div["); result = "no error"; }
             catch (e) { result = e.name + " / " + e.message; }
             document.getElementById("out").textContent = result;
           </script>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#out", "SyntaxError / 'div[' is not a valid selector")?;
    Ok(())
}

#[test]
fn uncaught_selector_error_is_reported_per_script() -> Result<()> {
    let (_, report) = run_page("<script>document.querySelectorAll('p:nope');</script>")?;
    let diagnostic = report
        .diagnostics
        .iter()
        .next()
        .ok_or(Error::DomSetup("expected a diagnostic".into()))?;
    assert_eq!(diagnostic.kind, DiagnosticKind::ScriptFailed);
    assert!(diagnostic.message.contains("SyntaxError"), "{}", diagnostic.message);
    Ok(())
}

#[test]
fn attributes_can_be_read_and_written() -> Result<()> {
    let (document, report) = run_page(
        r#"<a id="link" href="/old" data-x="1">link</a>
           <p id="out"></p>
           <script>
             var link = document.getElementById("link");
             var before = link.getAttribute("HREF");
             link.setAttribute("href", "/new");
             link.setAttribute("Data-Y", 2);
             document.getElementById("out").textContent = [
               before, link.getAttribute("href"), link.getAttribute("missing") === null,
               link.hasAttribute("data-y"), link.getAttribute("data-y"), link.tagName
             ].join(" ");
           </script>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#out", "/old /new true true 2 A")?;
    let link = document
        .element_by_id("link")
        .ok_or(Error::DomSetup("missing #link".into()))?;
    assert_eq!(document.attribute(link, "href").as_deref(), Some("/new"));
    assert_eq!(document.attribute(link, "data-y").as_deref(), Some("2"));
    Ok(())
}

#[test]
fn inner_text_and_text_content_replace_children_with_text() -> Result<()> {
    let (document, report) = run_page(
        r#"<div id="a"><b>bold</b> tail<script>var skipped;</script></div>
           <div id="b"></div>
           <script>
             var a = document.getElementById("a");
             var b = document.getElementById("b");
             b.textContent = a.innerText + "|" + a.textContent;
             a.innerText = "<i>not markup</i>";
           </script>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#b", "bold tail|bold tailvar skipped;")?;
    let a = document
        .element_by_id("a")
        .ok_or(Error::DomSetup("missing #a".into()))?;
    assert_eq!(document.inner_html(a)?, "&lt;i&gt;not markup&lt;/i&gt;");
    Ok(())
}

#[test]
fn id_accessor_and_null_writes() -> Result<()> {
    let (document, report) = run_page(
        r#"<p id="first">x</p>
           <script>
             var p = document.getElementById("first");
             p.id = "renamed";
             p.innerHTML = null;
           </script>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(document.element_by_id("first"), None);
    let renamed = document
        .element_by_id("renamed")
        .ok_or(Error::DomSetup("missing #renamed".into()))?;
    assert_eq!(document.inner_html(renamed)?, "");
    Ok(())
}

#[test]
fn tag_name_queries_support_the_wildcard_and_scoping() -> Result<()> {
    let (document, report) = run_page(
        r#"<section id="s"><p>1</p><p>2</p><span>3</span></section>
           <p>outside</p>
           <div id="out"></div>
           <script>
             var section = document.getElementById("s");
             document.getElementById("out").textContent = [
               section.getElementsByTagName("*").length,
               section.getElementsByTagName("P").length,
               document.getElementsByTagName("p").length,
               section.querySelectorAll("p").length,
               section.querySelector("span").innerHTML
             ].join(",");
           </script>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#out", "3,2,3,2,3")?;
    Ok(())
}

#[test]
fn element_wrappers_observe_the_live_tree() -> Result<()> {
    let (document, report) = run_page(
        r##"<ul id="list"><li>a</li></ul>
           <p id="out"></p>
           <script>
             var first = document.getElementById("list");
             var second = document.querySelector("#list");
             first.innerHTML = "<li>b</li><li>c</li>";
             document.getElementById("out").textContent =
               second.querySelectorAll("li").length + ":" + second.innerHTML;
           </script>"##,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#out", "2:<li>b</li><li>c</li>")?;
    Ok(())
}

#[test]
fn document_title_is_readable_and_writable() -> Result<()> {
    let (document, report) = run_page(
        r#"<html><head><title>Old</title></head><body>
           <script>document.title = document.title + " and new";</script>
           </body></html>"#,
    )?;
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(document.title(), "Old and new");
    Ok(())
}

#[test]
fn script_type_filter_is_opt_in() -> Result<()> {
    let html = r#"<p id="p"></p>
        <script type="text/template">{{ user.name }}</script>
        <script type="module">document.getElementById("p").textContent += "module;";</script>
        <script type="text/javascript">document.getElementById("p").textContent += "js;";</script>"#;

    let (document, report) = run_page(html)?;
    assert_eq!(report.inline_found, 3);
    assert_eq!(report.failed.len(), 1);
    assert_text(&document, "#p", "module;js;")?;

    let document = Document::parse(html);
    let mut engine = engine_with(ScriptConfig::default().with_respect_script_type(true), &[]);
    let report = engine.execute(&document, &base_url()?)?;
    assert_eq!(report.inline_found, 2);
    assert!(report.is_clean(), "{report:?}");
    assert_text(&document, "#p", "module;js;")?;
    Ok(())
}

#[test]
fn each_execute_starts_with_a_fresh_runtime() -> Result<()> {
    let mut engine = engine_with(ScriptConfig::default(), &[]);
    let base = base_url()?;

    let first = Document::parse("<script>var leaked = 'yes';</script>");
    engine.execute(&first, &base)?;
    assert_eq!(engine.state(), EngineState::Done);

    let second = Document::parse(
        r#"<p id="out"></p><script>document.getElementById("out").textContent = typeof leaked;</script>"#,
    );
    let report = engine.execute(&second, &base)?;
    assert!(report.is_clean(), "{report:?}");
    assert_text(&second, "#out", "undefined")?;
    Ok(())
}

#[test]
fn runaway_recursion_is_contained_to_one_script() -> Result<()> {
    let document = Document::parse(
        r#"<p id="out">start</p>
           <script>function loop() { return loop(); } loop();</script>
           <script>document.getElementById("out").textContent = "recovered";</script>"#,
    );
    let mut engine = engine_with(ScriptConfig::default().with_max_call_depth(50), &[]);
    let report = engine.execute(&document, &base_url()?)?;
    assert_eq!(report.failed, vec![ScriptSource::Inline { index: 0 }]);
    assert_text(&document, "#out", "recovered")?;
    Ok(())
}

#[test]
fn document_is_released_once_execute_returns() -> Result<()> {
    let pages = [
        r#"<p id="p"></p><script>document.getElementById("p").textContent = "plain";</script>"#,
        r#"<p id="p"></p><script>function f() { return f; } document.getElementById("p").textContent = typeof f();</script>"#,
        r#"<p id="p"></p><script>var el = document.getElementById("p"); el.self = el; el.textContent = el.self.id;</script>"#,
        r#"<p id="p"></p><script>
             function outer() { var inner = function () { return inner; }; return inner; }
             var kept = outer();
             var list = document.querySelectorAll("p");
             list.owner = list;
             document.getElementById("p").textContent = kept() === kept;
           </script>"#,
    ];
    let base = base_url()?;
    for html in pages {
        let document = Document::parse(html);
        let mut engine = engine_with(ScriptConfig::default(), &[]);
        let report = engine.execute(&document, &base)?;
        assert!(report.is_clean(), "{report:?}");
        assert!(!document.text_content(document.root()).is_empty());
        assert_eq!(document.handle_count(), 1, "tree still shared after {html}");
    }
    Ok(())
}

#[derive(Default)]
struct RecordingRuntime {
    bound: Vec<String>,
    ran: Vec<String>,
    fail_bind: bool,
    fail_origin: Option<String>,
}

impl ScriptRuntime for RecordingRuntime {
    fn bind(&mut self, name: &str, _value: HostValue) -> Result<()> {
        if self.fail_bind {
            return Err(Error::ScriptRuntime(format!("cannot bind {name}")));
        }
        self.bound.push(name.to_string());
        Ok(())
    }

    fn run(&mut self, source: &str, origin: &str) -> Result<HostValue> {
        self.ran.push(format!("{origin} => {source}"));
        if self.fail_origin.as_deref() == Some(origin) {
            return Err(Error::ScriptRuntime(format!("{origin}: Uncaught boom")));
        }
        Ok(HostValue::Undefined)
    }
}

#[test]
fn custom_runtime_sees_globals_then_externals_then_inlines() -> Result<()> {
    let document = Document::parse(
        r#"<script>inline0</script>
           <script src="x.js"></script>
           <script>   </script>
           <script>inline1</script>"#,
    );
    let mut engine = engine_with(
        ScriptConfig::default(),
        &[("https://page.test/dir/x.js", "external")],
    );
    let mut runtime = RecordingRuntime {
        fail_origin: Some("inline script #0".into()),
        ..RecordingRuntime::default()
    };
    let report = engine.execute_with_runtime(&mut runtime, &document, &base_url()?)?;

    assert_eq!(runtime.bound, vec!["document", "window"]);
    assert_eq!(
        runtime.ran,
        vec![
            "external script x.js => external",
            "inline script #0 => inline0",
            "inline script #1 => inline1",
        ]
    );
    assert_eq!(report.failed, vec![ScriptSource::Inline { index: 0 }]);
    let diagnostic = report
        .diagnostics
        .iter()
        .next()
        .ok_or(Error::DomSetup("expected a diagnostic".into()))?;
    assert_eq!(diagnostic.message, "inline script #0: Uncaught boom");
    Ok(())
}

#[test]
fn binding_failure_is_a_dom_setup_error() -> Result<()> {
    let document = Document::parse("<script>never()</script>");
    let mut engine = engine_with(ScriptConfig::default(), &[]);
    let mut runtime = RecordingRuntime {
        fail_bind: true,
        ..RecordingRuntime::default()
    };
    match engine.execute_with_runtime(&mut runtime, &document, &base_url()?) {
        Err(Error::DomSetup(message)) => assert!(message.contains("cannot bind document"), "{message}"),
        other => panic!("expected DomSetup, got {other:?}"),
    }
    assert!(runtime.ran.is_empty());
    assert_eq!(engine.state(), EngineState::Idle);
    Ok(())
}

#[test]
fn diagnostic_log_keeps_the_newest_entries() -> Result<()> {
    let html: String = (0..5).map(|i| format!("<script>throw 'e{i}';</script>")).collect();
    let document = Document::parse(&html);
    let mut engine = engine_with(ScriptConfig::default().with_diagnostic_limit(2), &[]);
    let report = engine.execute(&document, &base_url()?)?;

    assert_eq!(report.failed.len(), 5);
    assert_eq!(report.diagnostics.len(), 2);
    assert_eq!(report.diagnostics.limit(), 2);
    assert_eq!(report.diagnostics.dropped(), 3);
    let sources: Vec<_> = report
        .diagnostics
        .iter()
        .map(|diagnostic| diagnostic.source.clone())
        .collect();
    assert_eq!(
        sources,
        vec![ScriptSource::Inline { index: 3 }, ScriptSource::Inline { index: 4 }]
    );
    Ok(())
}

#[test]
fn collector_classifies_scripts_in_document_order() {
    let document = Document::parse(
        r#"<script src="a.js"></script><script>one</script><script src=""></script>
           <script>

           </script><script src="b.js">ignored body</script><script>two</script>"#,
    );
    let scripts = ScriptCollector::new().collect(&document);
    assert_eq!(scripts.len(), 5);
    assert_eq!(scripts.external_urls().collect::<Vec<_>>(), vec!["a.js", "", "b.js"]);
    assert_eq!(scripts.inline_sources().collect::<Vec<_>>(), vec!["one", "two"]);
}

#[test]
fn page_runs_scripts_and_exposes_the_result() -> Result<()> {
    let mut engine = engine_with(ScriptConfig::default(), &[]);
    let page = Page::from_html_with_engine(
        "https://page.test/",
        r#"<title>T</title><div id="d" class="c">x</div>
           <script>document.querySelector(".c").innerHTML = "<em>y</em>";</script>"#,
        &mut engine,
    )?;
    assert_eq!(page.title(), "T");
    assert_eq!(page.inner_html("#d")?.as_deref(), Some("<em>y</em>"));
    assert_eq!(page.attribute("#d", "class")?.as_deref(), Some("c"));
    assert_eq!(page.text("em")?.as_deref(), Some("y"));
    assert!(page.report().is_some_and(ExecutionReport::is_clean));
    assert_eq!(page.url().as_str(), "https://page.test/");

    let static_page = Page::from_html(
        "https://page.test/",
        "<p>static</p><script>throw 1</script>",
        &ScriptConfig::default().with_javascript_enabled(false),
    )?;
    assert!(static_page.report().is_none());
    assert_eq!(static_page.html(), "<p>static</p><script>throw 1</script>");
    Ok(())
}

use page_script::{Document, Error, ExecutionEngine, Interpreter, ScriptConfig, ScriptRuntime};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{FileFailurePersistence, TestCaseResult};
use url::Url;

const ENGINE_PROPTEST_REGRESSION_FILE: &str =
    "tests/proptest-regressions/engine_property_fuzz_test.txt";
const DEFAULT_ENGINE_PROPTEST_CASES: u32 = 128;

fn engine_proptest_cases() -> u32 {
    std::env::var("PAGE_SCRIPT_PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_ENGINE_PROPTEST_CASES)
}

fn script_token_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        Just("var".to_string()),
        Just("let".to_string()),
        Just("function".to_string()),
        Just("return".to_string()),
        Just("if".to_string()),
        Just("try".to_string()),
        Just("catch".to_string()),
        Just("throw".to_string()),
        Just("new".to_string()),
        Just("x".to_string()),
        Just("document".to_string()),
        Just(".getElementById(\"t\")".to_string()),
        Just(".innerHTML".to_string()),
        Just("=".to_string()),
        Just("=>".to_string()),
        Just("(".to_string()),
        Just(")".to_string()),
        Just("{".to_string()),
        Just("}".to_string()),
        Just("[".to_string()),
        Just("]".to_string()),
        Just(";".to_string()),
        Just(",".to_string()),
        Just("+".to_string()),
        Just("?.".to_string()),
        Just("`${".to_string()),
        Just("/a+/g".to_string()),
        Just("'str'".to_string()),
        Just("42".to_string()),
        Just("\n".to_string()),
    ]
    .boxed()
}

fn script_strategy() -> BoxedStrategy<String> {
    vec(script_token_strategy(), 0..=40)
        .prop_map(|tokens| tokens.join(" "))
        .boxed()
}

fn markup_fragment_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        Just("<div>".to_string()),
        Just("</div>".to_string()),
        Just("<p class='a'>".to_string()),
        Just("<li>".to_string()),
        Just("<br/>".to_string()),
        Just("<!--".to_string()),
        Just("-->".to_string()),
        Just("<script>".to_string()),
        Just("</script>".to_string()),
        Just("&amp;".to_string()),
        Just("&#x41;".to_string()),
        Just("<".to_string()),
        Just(">".to_string()),
        Just("\"".to_string()),
        "[a-z ]{0,6}".prop_map(|text| text),
    ]
    .boxed()
}

fn arbitrary_markup_strategy() -> BoxedStrategy<String> {
    vec(markup_fragment_strategy(), 0..=30)
        .prop_map(|parts| parts.concat())
        .boxed()
}

fn well_formed_markup_strategy() -> BoxedStrategy<String> {
    let leaf = prop_oneof![
        "[a-z]{1,8}".prop_map(|text| text),
        Just("&amp;".to_string()),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        (
            prop_oneof![Just("div"), Just("span"), Just("b"), Just("em")],
            proptest::option::of("[a-z]{1,6}"),
            vec(inner, 0..=4),
        )
            .prop_map(|(tag, class, children)| {
                let attributes = class
                    .map(|class| format!(" class=\"{class}\""))
                    .unwrap_or_default();
                format!("<{tag}{attributes}>{}</{tag}>", children.concat())
            })
    })
    .boxed()
}

fn assert_script_does_not_panic(source: &str) -> TestCaseResult {
    let outcome = std::panic::catch_unwind(|| Interpreter::with_max_call_depth(64).run(source, "fuzz"));
    match outcome {
        Err(_) => prop_assert!(false, "interpreter panicked on {source:?}"),
        Ok(Ok(_)) | Ok(Err(Error::ScriptParse(_))) | Ok(Err(Error::ScriptRuntime(_))) => {}
        Ok(Err(other)) => prop_assert!(false, "unexpected error kind {other:?} for {source:?}"),
    }
    Ok(())
}

fn assert_page_executes(html: &str) -> TestCaseResult {
    let base = Url::parse("https://fuzz.test/").map_err(|err| TestCaseError::fail(err.to_string()))?;
    let outcome = std::panic::catch_unwind(|| {
        let document = Document::parse(html);
        let mut engine = ExecutionEngine::with_fetcher(ScriptConfig::default(), |url: &Url| -> page_script::Result<String> {
            Err(Error::Fetch {
                url: url.to_string(),
                reason: "offline".into(),
            })
        });
        engine.execute(&document, &base).map(|_| document.to_html())
    });
    match outcome {
        Err(_) => prop_assert!(false, "engine panicked on {html:?}"),
        Ok(result) => prop_assert!(result.is_ok(), "engine failed on {html:?}: {result:?}"),
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: engine_proptest_cases(),
        failure_persistence: Some(Box::new(
            FileFailurePersistence::Direct(ENGINE_PROPTEST_REGRESSION_FILE),
        )),
        .. ProptestConfig::default()
    })]

    #[test]
    fn generated_scripts_never_panic(source in script_strategy()) {
        assert_script_does_not_panic(&source)?;
    }

    #[test]
    fn generated_pages_execute_without_panicking(
        markup in arbitrary_markup_strategy(),
        script in script_strategy(),
    ) {
        let html = format!("<div id=\"t\">{markup}</div><script>{script}</script>");
        assert_page_executes(&html)?;
    }

    #[test]
    fn arbitrary_markup_parses_and_serializes(markup in arbitrary_markup_strategy()) {
        let outcome = std::panic::catch_unwind(|| {
            let serialized = Document::parse(&markup).to_html();
            Document::parse(&serialized).to_html()
        });
        prop_assert!(outcome.is_ok(), "parser panicked on {:?}", markup);
    }

    #[test]
    fn well_formed_markup_round_trips(markup in well_formed_markup_strategy()) {
        prop_assert_eq!(Document::parse(&markup).to_html(), markup);
    }
}

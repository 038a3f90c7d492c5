use super::*;

#[test]
fn serialization_sorts_attributes_and_escapes_text() -> Result<()> {
    let document = Document::parse(r#"<div id="a" class="x" title='1 < 2'>Hi &amp; bye</div>"#);
    assert_eq!(
        document.to_html(),
        r#"<div class="x" id="a" title="1 &lt; 2">Hi &amp; bye</div>"#
    );
    let node = document.element_by_id("a").ok_or(Error::DomSetup("missing #a".into()))?;
    assert_eq!(document.text_content(node), "Hi & bye");
    Ok(())
}

#[test]
fn inner_html_round_trip_preserves_structure() -> Result<()> {
    let document = Document::parse("<section id='host'></section>");
    let host = document
        .element_by_id("host")
        .ok_or(Error::DomSetup("missing #host".into()))?;
    document.set_inner_html(host, "<p>One<br>Two</p><span data-n=1>x &lt; y</span>")?;
    let first = document.inner_html(host)?;
    assert_eq!(first, r#"<p>One<br>Two</p><span data-n="1">x &lt; y</span>"#);

    document.set_inner_html(host, &first)?;
    assert_eq!(document.inner_html(host)?, first);
    Ok(())
}

#[test]
fn replaced_children_are_detached_from_queries() -> Result<()> {
    let document = Document::parse("<div id='box'><span id='old'>O</span></div>");
    let host = document
        .element_by_id("box")
        .ok_or(Error::DomSetup("missing #box".into()))?;
    document.set_inner_html(host, "<b id='new'>N</b>")?;
    assert_eq!(document.element_by_id("old"), None);
    assert!(document.element_by_id("new").is_some());
    Ok(())
}

#[test]
fn optional_end_tags_close_implicitly() -> Result<()> {
    let document = Document::parse("<ul><li>a<li>b</ul><p>one<p>two<div>three</div>");
    assert_eq!(document.query_selector_all("li")?.len(), 2);
    assert_eq!(document.query_selector_all("p")?.len(), 2);
    assert_eq!(document.query_selector_all("p > div")?.len(), 0);
    Ok(())
}

#[test]
fn raw_text_elements_keep_markup_verbatim() -> Result<()> {
    let html = "<script>if (a < b && c > d) { x = '</div>'; }</script><div id='after'>z</div>";
    let document = Document::parse(html);
    let script = document
        .elements_by_tag_name("script")
        .first()
        .copied()
        .ok_or(Error::DomSetup("missing script".into()))?;
    assert_eq!(
        document.text_content(script),
        "if (a < b && c > d) { x = '</div>'; }"
    );
    assert_eq!(document.to_html(), html.replace("id='after'", "id=\"after\""));
    Ok(())
}

#[test]
fn malformed_markup_degrades_gracefully() -> Result<()> {
    let document = Document::parse("<div>1 < 2</div></span><!-- open comment <b>x</b>");
    assert_eq!(document.to_html(), "<div>1 &lt; 2</div>");

    let truncated = Document::parse("<div>x</div><span class=");
    assert_eq!(truncated.to_html(), "<div>x</div>");
    Ok(())
}

#[test]
fn attribute_names_are_case_folded_and_first_duplicate_wins() -> Result<()> {
    let document = Document::parse("<input ID='a' Value=one value=two disabled>");
    let node = document
        .element_by_id("a")
        .ok_or(Error::DomSetup("missing #a".into()))?;
    assert_eq!(document.attribute(node, "value").as_deref(), Some("one"));
    assert_eq!(document.attribute(node, "disabled").as_deref(), Some(""));
    assert_eq!(document.tag_name(node).as_deref(), Some("input"));
    Ok(())
}

#[test]
fn character_references_decode_in_text_and_attributes() -> Result<()> {
    let document = Document::parse("<a id='l' title='&quot;q&quot; &#x41;'>&lt;&copy;&#169;&gt;</a>");
    let node = document
        .element_by_id("l")
        .ok_or(Error::DomSetup("missing #l".into()))?;
    assert_eq!(document.attribute(node, "title").as_deref(), Some("\"q\" A"));
    assert_eq!(document.text_content(node), "<\u{a9}\u{a9}>");
    Ok(())
}

#[test]
fn inner_text_skips_script_and_style_bodies() -> Result<()> {
    let document = Document::parse(
        "<div id='d'>a<script>var hidden = 1;</script><style>p{}</style><b>b</b></div>",
    );
    let node = document
        .element_by_id("d")
        .ok_or(Error::DomSetup("missing #d".into()))?;
    assert_eq!(document.inner_text(node), "ab");
    assert_eq!(document.text_content(node), "avar hidden = 1;p{}b");
    Ok(())
}

#[test]
fn title_reads_trimmed_text_and_can_be_replaced() -> Result<()> {
    let document = Document::parse("<html><head><title>  Hello  </title></head><body></body></html>");
    assert_eq!(document.title(), "Hello");
    document.set_title("Bye")?;
    assert_eq!(document.title(), "Bye");
    assert_eq!(document.query_selector_all("title")?.len(), 1);
    Ok(())
}

#[test]
fn deep_clone_is_independent_of_the_original() -> Result<()> {
    let document = Document::parse("<p id='p'>before</p>");
    let copy = document.deep_clone();
    let node = document
        .element_by_id("p")
        .ok_or(Error::DomSetup("missing #p".into()))?;
    document.set_text_content(node, "after")?;
    assert_text(&document, "#p", "after")?;
    assert_text(&copy, "#p", "before")?;
    assert!(!copy.same_tree(&document));
    assert!(document.clone().same_tree(&document));
    Ok(())
}

#[test]
fn text_mutations_on_non_elements_are_rejected() -> Result<()> {
    let document = Document::parse("text only");
    let root = document.root();
    assert!(document.set_attribute(root, "x", "y").is_err());
    assert!(document.inner_html(root).is_err());
    Ok(())
}

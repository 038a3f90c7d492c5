use super::*;

const LIST: &str = r#"
    <div id="root" class="box main">
      <ul id="list">
        <li class="item" data-kind="fruit-apple">Apple</li>
        <li class="item skip" data-kind="fruit-pear">Pear</li>
        <li class="item" data-kind="veg">Leek</li>
      </ul>
      <p class="note" lang="en-US">Note</p>
      <span></span>
      <input type="checkbox" checked>
    </div>
"#;

fn texts(document: &Document, selector: &str) -> Result<Vec<String>> {
    Ok(document
        .query_selector_all(selector)?
        .into_iter()
        .map(|node| document.text_content(node))
        .collect())
}

#[test]
fn compound_and_combinator_selectors_match() -> Result<()> {
    let document = Document::parse(LIST);
    assert_eq!(texts(&document, "#list > li.item")?.len(), 3);
    assert_eq!(texts(&document, "div.box.main p")?, vec!["Note"]);
    assert_eq!(texts(&document, "li.skip + li")?, vec!["Leek"]);
    assert_eq!(texts(&document, "li:first-child ~ li")?, vec!["Pear", "Leek"]);
    assert_eq!(texts(&document, "UL LI:last-child")?, vec!["Leek"]);
    Ok(())
}

#[test]
fn descendant_chains_retry_further_ancestors() -> Result<()> {
    let document = Document::parse(
        r#"<div class="a"><div class="b"><div class="b"><span class="c">x</span></div></div></div>"#,
    );
    assert_eq!(texts(&document, ".a > .b .c")?, vec!["x"]);
    assert_eq!(texts(&document, ".a > .b > .b > .c")?, vec!["x"]);
    assert!(texts(&document, ".a > .c")?.is_empty());
    Ok(())
}

#[test]
fn sibling_chains_retry_earlier_siblings() -> Result<()> {
    let document = Document::parse(
        r#"<p><i class="a">1</i><i class="b">2</i><i class="x">3</i><i class="b">4</i><i class="c">5</i></p>"#,
    );
    assert_eq!(texts(&document, ".a + .b ~ .c")?, vec!["5"]);
    assert_eq!(texts(&document, ".a ~ .b ~ .c")?, vec!["5"]);
    assert!(texts(&document, ".x + .c")?.is_empty());
    Ok(())
}

#[test]
fn attribute_operators_match() -> Result<()> {
    let document = Document::parse(LIST);
    assert_eq!(texts(&document, "[data-kind^=fruit]")?, vec!["Apple", "Pear"]);
    assert_eq!(texts(&document, "[data-kind$='pear']")?, vec!["Pear"]);
    assert_eq!(texts(&document, "[data-kind*=e]")?.len(), 3);
    assert_eq!(texts(&document, "[class~=skip]")?, vec!["Pear"]);
    assert_eq!(texts(&document, "[lang|=en]")?, vec!["Note"]);
    assert_eq!(texts(&document, "[data-kind=veg]")?, vec!["Leek"]);
    Ok(())
}

#[test]
fn structural_pseudo_classes_match() -> Result<()> {
    let document = Document::parse(LIST);
    assert_eq!(texts(&document, "li:nth-child(2)")?, vec!["Pear"]);
    assert_eq!(texts(&document, "li:nth-child(odd)")?, vec!["Apple", "Leek"]);
    assert_eq!(texts(&document, "li:not(.skip)")?, vec!["Apple", "Leek"]);
    assert_eq!(document.query_selector_all("span:empty")?.len(), 1);
    assert_eq!(document.query_selector_all("input:checked")?.len(), 1);
    assert_eq!(document.query_selector_all("ul:has(.skip)")?.len(), 1);
    Ok(())
}

#[test]
fn groups_return_unique_nodes_in_document_order() -> Result<()> {
    let document = Document::parse(LIST);
    assert_eq!(
        texts(&document, "p, li.item:nth-child(1), li")?,
        vec!["Apple", "Pear", "Leek", "Note"]
    );
    Ok(())
}

#[test]
fn scoped_queries_only_see_descendants() -> Result<()> {
    let document = Document::parse(LIST);
    let list = document
        .element_by_id("list")
        .ok_or(Error::DomSetup("missing #list".into()))?;
    assert_eq!(document.query_selector_all_within(list, "li")?.len(), 3);
    assert!(document.query_selector_all_within(list, "p")?.is_empty());
    Ok(())
}

#[test]
fn invalid_selectors_are_reported() {
    let document = Document::parse(LIST);
    for selector in ["div[", "", "li:unknown-pseudo", ">"] {
        match document.query_selector_all(selector) {
            Err(Error::UnsupportedSelector(_)) => {}
            other => panic!("{selector:?} should be rejected, got {other:?}"),
        }
    }
}

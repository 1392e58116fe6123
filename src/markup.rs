//! Small tree-query helpers over parsed registry markup

use scraper::{ElementRef, Selector};

/// Parse a selector that is known at compile time
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

/// Extract clean text from element, excluding script/style/etc tags
///
/// Internal whitespace runs collapse to one space.
pub fn clean_text(elem: &ElementRef) -> String {
    elem.descendants()
        .filter(|node| {
            !node.ancestors().take_while(|a| a.id() != elem.id()).any(|a| {
                ElementRef::wrap(a)
                    .map(|e| matches!(e.value().name(), "script" | "style" | "noscript"))
                    .unwrap_or(false)
            })
        })
        .filter_map(|node| node.value().as_text().map(|t| t.text.as_ref()))
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first match of `sel` under `elem`
pub fn first_text(elem: &ElementRef, sel: &Selector) -> Option<String> {
    elem.select(sel)
        .next()
        .map(|e| clean_text(&e))
        .filter(|t| !t.is_empty())
}

/// Attribute of the first match of `sel` under `elem`
pub fn first_attr(elem: &ElementRef, sel: &Selector, name: &str) -> Option<String> {
    elem.select(sel)
        .next()
        .and_then(|e| e.value().attr(name))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_clean_text_skips_scripts() {
        let doc = Html::parse_fragment(
            r#"<div id="x">
                <style>.hidden { display: none; }</style>
                <script>alert('test');</script>
                Good   Title
                <span>Text</span>
                <noscript>No JS</noscript>
            </div>"#,
        );
        let elem = doc.select(&selector("#x")).next().unwrap();
        assert_eq!(clean_text(&elem), "Good Title Text");
    }

    #[test]
    fn test_first_attr_and_text() {
        let doc = Html::parse_fragment(r#"<div id="r"><a href=" /a ">One</a><a href="/b">Two</a><img src=""></div>"#);
        let row = doc.select(&selector("#r")).next().unwrap();
        assert_eq!(first_attr(&row, &selector("a"), "href").as_deref(), Some("/a"));
        assert_eq!(first_text(&row, &selector("a")).as_deref(), Some("One"));
        assert_eq!(first_attr(&row, &selector("img"), "src"), None);
        assert_eq!(first_text(&row, &selector("p")), None);
    }
}

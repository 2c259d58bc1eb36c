//! Allow-list HTML sanitization.
//!
//! Rendered markdown passes through a [`Sanitizer`] before it is cached or
//! returned. The default implementation is backed by `ammonia` and keeps
//! structural, inline-formatting and SVG icon tags only. Event handler
//! attributes are dropped, with one exception: the copy button's `onclick`
//! survives when its value is exactly [`COPY_BUTTON_HOOK`]. Links are
//! rewritten to open in a new tab with `rel="noopener noreferrer"`.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

/// The only inline event handler allowed through sanitization.
pub const COPY_BUTTON_HOOK: &str = "copyCodeBlock(this)";

const LINK_REL: &str = "noopener noreferrer";

/// Turns untrusted HTML into HTML that is safe to insert into a page.
pub trait Sanitizer: Send {
    fn sanitize(&self, html: &str) -> String;
}

/// Tags and attributes a sanitizer keeps.
#[derive(Debug, Clone)]
pub struct AllowList {
    pub tags: Vec<&'static str>,
    pub generic_attributes: Vec<&'static str>,
    pub tag_attributes: Vec<(&'static str, Vec<&'static str>)>,
    pub url_schemes: Vec<&'static str>,
}

impl Default for AllowList {
    fn default() -> Self {
        let structural = [
            "p", "br", "hr", "div", "span", "pre", "code", "blockquote", "h1", "h2", "h3", "h4",
            "h5", "h6", "ul", "ol", "li", "table", "thead", "tbody", "tr", "th", "td", "a",
            "button",
        ];
        let inline = ["strong", "em", "del", "b", "i", "s", "sub", "sup", "kbd"];
        let svg = [
            "svg", "path", "circle", "rect", "line", "polyline", "polygon", "ellipse", "g",
        ];
        let svg_attributes = vec![
            "xmlns",
            "width",
            "height",
            "viewBox",
            "viewbox",
            "fill",
            "stroke",
            "stroke-width",
            "stroke-linecap",
            "stroke-linejoin",
            "d",
            "cx",
            "cy",
            "r",
            "rx",
            "ry",
            "x",
            "y",
            "x1",
            "x2",
            "y1",
            "y2",
            "points",
        ];

        let mut tag_attributes = vec![
            ("a", vec!["href", "title"]),
            ("ol", vec!["start"]),
            ("th", vec!["align"]),
            ("td", vec!["align"]),
            (
                "button",
                vec!["type", "aria-label", "data-code", "onclick"],
            ),
        ];
        for tag in svg {
            tag_attributes.push((tag, svg_attributes.clone()));
        }

        Self {
            tags: structural.into_iter().chain(inline).chain(svg).collect(),
            generic_attributes: vec!["class", "aria-hidden"],
            tag_attributes,
            url_schemes: vec!["http", "https", "mailto"],
        }
    }
}

/// `ammonia`-backed sanitizer.
pub struct AmmoniaSanitizer {
    builder: Builder<'static>,
}

impl AmmoniaSanitizer {
    pub fn new() -> Self {
        Self::from_allow_list(&AllowList::default())
    }

    pub fn from_allow_list(allow: &AllowList) -> Self {
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = allow
            .tag_attributes
            .iter()
            .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
            .collect();

        let mut builder = Builder::empty();
        builder
            .tags(allow.tags.iter().copied().collect())
            .generic_attributes(allow.generic_attributes.iter().copied().collect())
            .tag_attributes(tag_attributes)
            .url_schemes(allow.url_schemes.iter().copied().collect())
            .url_relative(UrlRelative::Deny)
            .link_rel(Some(LINK_REL))
            .set_tag_attribute_value("a", "target", "_blank")
            .clean_content_tags(["script", "style"].into_iter().collect())
            .strip_comments(true)
            .attribute_filter(|element, attribute, value| {
                if attribute.eq_ignore_ascii_case("onclick") {
                    return (element == "button" && value == COPY_BUTTON_HOOK)
                        .then_some(Cow::Borrowed(value));
                }
                Some(Cow::Borrowed(value))
            });
        Self { builder }
    }
}

impl Default for AmmoniaSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for AmmoniaSanitizer {
    fn sanitize(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> String {
        AmmoniaSanitizer::new().sanitize(html)
    }

    #[test]
    fn strips_script_with_its_content() {
        let out = clean("<p>ok</p><script>alert(1)</script>");
        assert_eq!(out, "<p>ok</p>");
    }

    #[test]
    fn keeps_formatting_tags() {
        let out = clean("<p><strong>a</strong> <em>b</em> <del>c</del> <code>d</code></p>");
        assert!(out.contains("<strong>a</strong>"));
        assert!(out.contains("<em>b</em>"));
        assert!(out.contains("<del>c</del>"));
        assert!(out.contains("<code>d</code>"));
    }

    #[test]
    fn drops_unknown_tags_but_keeps_text() {
        let out = clean(r#"<iframe src="https://e.com"></iframe><marquee>hi</marquee>"#);
        assert!(!out.contains("iframe"));
        assert!(!out.contains("marquee"));
        assert!(out.contains("hi"));
    }

    #[test]
    fn links_are_forced_to_safe_rel_and_target() {
        let out = clean(r#"<a href="https://e.com" target="_self" rel="opener">x</a>"#);
        assert!(out.contains(r#"rel="noopener noreferrer""#));
        assert!(out.contains(r#"target="_blank""#));
        assert!(!out.contains("_self"));
        assert!(!out.contains(r#"rel="opener""#));
    }

    #[test]
    fn unsafe_and_relative_urls_are_removed() {
        let js = clean(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!js.contains("javascript"));
        let relative = clean(r#"<a href="/etc/passwd">x</a>"#);
        assert!(!relative.contains("href"));
    }

    #[test]
    fn only_the_copy_hook_survives_as_event_handler() {
        let ok = clean(&format!(
            r#"<button type="button" onclick="{COPY_BUTTON_HOOK}">Copy</button>"#
        ));
        assert!(ok.contains(&format!(r#"onclick="{COPY_BUTTON_HOOK}""#)));

        let evil = clean(r#"<button onclick="alert(1)">Copy</button>"#);
        assert!(!evil.contains("onclick"));

        let elsewhere = clean(&format!(r#"<p onclick="{COPY_BUTTON_HOOK}">x</p>"#));
        assert!(!elsewhere.contains("onclick"));

        let other_handler = clean(r#"<div onmouseover="alert(1)" class="x">y</div>"#);
        assert!(!other_handler.contains("onmouseover"));
        assert!(other_handler.contains(r#"class="x""#));
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(clean("<p>a<!-- hidden --></p>"), "<p>a</p>");
    }
}

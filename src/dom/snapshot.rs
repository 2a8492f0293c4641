//! Page snapshots with stable element references.
//!
//! [`ANNOTATE_SCRIPT`] runs inside the page: it tags every interactive element with a
//! `data-agent-ref="eN"` attribute, numbered in document order, and returns the body
//! HTML. [`render_snapshot`] turns that HTML into an indented role tree in which each
//! tagged element shows up as `[ref=eN]`.

use scraper::{ElementRef, Html, Node, Selector};

/// Attribute the annotation script writes onto tagged elements.
pub const REF_ATTRIBUTE: &str = "data-agent-ref";

pub const ANNOTATE_SCRIPT: &str = r#"
(function() {
    const ATTR = 'data-agent-ref';
    document.querySelectorAll('[' + ATTR + ']').forEach(el => el.removeAttribute(ATTR));

    const selectors = [
        'a[href]', 'button', 'input:not([type="hidden"])', 'select', 'textarea', 'option',
        'summary', '[onclick]', '[contenteditable="true"]', '[tabindex]:not([tabindex="-1"])',
        '[role="button"]', '[role="link"]', '[role="checkbox"]', '[role="radio"]',
        '[role="textbox"]', '[role="searchbox"]', '[role="combobox"]', '[role="listbox"]',
        '[role="tab"]', '[role="menuitem"]', '[role="option"]', '[role="switch"]',
        '[role="slider"]', 'h1', 'h2', 'h3', 'h4', 'h5', 'h6', 'img[alt]'
    ];

    let counter = 0;
    document.querySelectorAll(selectors.join(',')).forEach(el => {
        counter += 1;
        el.setAttribute(ATTR, 'e' + counter);
    });

    return document.body ? document.body.outerHTML : '';
})()
"#;

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "meta", "link", "svg", "iframe",
];

/// Roles whose accessible name is their text content; text below them is not repeated.
const NAME_FROM_CONTENT: &[&str] = &[
    "link",
    "button",
    "heading",
    "option",
    "tab",
    "menuitem",
    "cell",
    "columnheader",
    "listitem",
    "paragraph",
    "checkbox",
    "radio",
];

const MAX_NAME_LEN: usize = 80;
const MAX_TEXT_LEN: usize = 200;

/// Render annotated page HTML as snapshot text.
pub fn render_snapshot(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut output = String::new();

    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    render_children(&mut output, root, 0, false);
    output
}

fn render_children(output: &mut String, element: ElementRef, indent: usize, consumed: bool) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) if !consumed => {
                let text = collapse_whitespace(text);
                if !text.is_empty() {
                    push_line(
                        output,
                        indent,
                        &format!("text: {}", truncate(&text, MAX_TEXT_LEN)),
                    );
                }
            }
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    render_element(output, child_ref, indent, consumed);
                }
            }
            _ => {}
        }
    }
}

fn render_element(output: &mut String, element: ElementRef, indent: usize, consumed: bool) {
    let el = element.value();
    if SKIPPED_TAGS.contains(&el.name()) || is_hidden(element) {
        return;
    }

    let reference = el.attr(REF_ATTRIBUTE);
    let role = element_role(element).or(reference.map(|_| "generic"));

    let Some(role) = role else {
        render_children(output, element, indent, consumed);
        return;
    };

    let mut line = role.to_string();

    let name = accessible_name(element, role);
    if !name.is_empty() {
        line.push_str(&format!(" \"{}\"", truncate(&name, MAX_NAME_LEN)));
    }
    if let Some(reference) = reference {
        line.push_str(&format!(" [ref={}]", reference));
    }
    if let Some(level) = heading_level(el.name()) {
        line.push_str(&format!(" [level={}]", level));
    }
    if el.attr("disabled").is_some() {
        line.push_str(" [disabled]");
    }
    if el.attr("checked").is_some() {
        line.push_str(" [checked]");
    }
    if let Some(value) = el.attr("value").filter(|v| !v.is_empty() && *v != name) {
        if role == "textbox" || role == "combobox" {
            line.push_str(&format!(" value=\"{}\"", truncate(value, MAX_NAME_LEN)));
        }
    }

    push_line(output, indent, &line);

    let consumed = consumed || NAME_FROM_CONTENT.contains(&role);
    render_children(output, element, indent + 1, consumed);
}

fn element_role(element: ElementRef) -> Option<&'static str> {
    let el = element.value();
    if let Some(role) = el.attr("role") {
        return Some(explicit_role(role));
    }

    let role = match el.name() {
        "a" if el.attr("href").is_some() => "link",
        "button" | "summary" => "button",
        "input" => match el.attr("type").unwrap_or("text") {
            "hidden" => return None,
            "checkbox" => "checkbox",
            "radio" => "radio",
            "submit" | "button" | "reset" | "image" => "button",
            "search" => "searchbox",
            _ => "textbox",
        },
        "textarea" => "textbox",
        "select" => "combobox",
        "option" => "option",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "nav" => "navigation",
        "main" => "main",
        "header" => "banner",
        "footer" => "contentinfo",
        "form" => "form",
        "table" => "table",
        "tr" => "row",
        "td" => "cell",
        "th" => "columnheader",
        "p" => "paragraph",
        "dialog" => "dialog",
        _ => return None,
    };
    Some(role)
}

fn explicit_role(role: &str) -> &'static str {
    match role {
        "button" => "button",
        "link" => "link",
        "checkbox" => "checkbox",
        "radio" => "radio",
        "textbox" => "textbox",
        "searchbox" => "searchbox",
        "combobox" => "combobox",
        "listbox" => "listbox",
        "tab" => "tab",
        "tabpanel" => "tabpanel",
        "menu" => "menu",
        "menuitem" => "menuitem",
        "option" => "option",
        "switch" => "switch",
        "slider" => "slider",
        "dialog" => "dialog",
        "navigation" => "navigation",
        "heading" => "heading",
        "list" => "list",
        "listitem" => "listitem",
        _ => "generic",
    }
}

fn accessible_name(element: ElementRef, role: &str) -> String {
    let el = element.value();
    let attribute_name = el
        .attr("aria-label")
        .or_else(|| match el.name() {
            "img" => el.attr("alt"),
            "input" | "textarea" => el.attr("placeholder"),
            _ => None,
        })
        .or_else(|| el.attr("title"));

    if let Some(name) = attribute_name {
        return collapse_whitespace(name);
    }

    if NAME_FROM_CONTENT.contains(&role) {
        return collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    }

    String::new()
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_hidden(element: ElementRef) -> bool {
    let el = element.value();
    el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true")
}

fn push_line(output: &mut String, indent: usize, line: &str) {
    output.push_str(&"  ".repeat(indent));
    output.push_str("- ");
    output.push_str(line);
    output.push('\n');
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <header><a href="/" data-agent-ref="e1">Home</a></header>
          <main>
            <h1 data-agent-ref="e2">Example <span>Domain</span></h1>
            <p>This domain is for use in illustrative examples.</p>
            <form>
              <input type="text" placeholder="Search" data-agent-ref="e3">
              <input type="hidden" name="token" value="abc">
              <button data-agent-ref="e4"><span>Go</span></button>
            </form>
            <div hidden><button data-agent-ref="e5">Secret</button></div>
            <script>var ignored = true;</script>
          </main>
        </body></html>
    "#;

    #[test]
    fn test_renders_roles_names_and_refs() {
        let snapshot = render_snapshot(PAGE);

        assert!(snapshot.contains("- banner\n"));
        assert!(snapshot.contains("- link \"Home\" [ref=e1]"));
        assert!(snapshot.contains("- heading \"Example Domain\" [ref=e2] [level=1]"));
        assert!(snapshot.contains("- textbox \"Search\" [ref=e3]"));
        assert!(snapshot.contains("- button \"Go\" [ref=e4]"));
        assert!(snapshot.contains("paragraph \"This domain is for use in illustrative examples.\""));
    }

    #[test]
    fn test_skips_hidden_and_script_content() {
        let snapshot = render_snapshot(PAGE);

        assert!(!snapshot.contains("[ref=e5]"));
        assert!(!snapshot.contains("ignored"));
        assert!(!snapshot.contains("token"));
    }

    #[test]
    fn test_text_under_named_elements_is_not_repeated() {
        let snapshot = render_snapshot(PAGE);
        assert_eq!(snapshot.matches("Domain").count(), 1);
        assert!(!snapshot.contains("text: Go"));
    }

    #[test]
    fn test_untagged_generic_elements_are_flattened() {
        let snapshot = render_snapshot("<body><div><div><span>Loose text</span></div></div></body>");
        assert_eq!(snapshot, "- text: Loose text\n");
    }

    #[test]
    fn test_empty_body_renders_nothing() {
        assert!(render_snapshot("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(100);
        let cut = truncate(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }
}

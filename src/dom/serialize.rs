//! HTML rendering of a `Document` subtree.

use super::document::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        Some(NodeKind::Text(text)) => escape_text(text, out),
        Some(NodeKind::Element(data)) => {
            out.push('<');
            out.push_str(data.tag());
            for (name, value) in data.attributes() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&data.tag()) {
                return;
            }
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(data.tag());
            out.push('>');
        }
        None => {}
    }
}

/// Outer HTML of `id`. Empty for dead nodes.
pub fn to_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::el;

    #[test]
    fn test_escapes_text_and_attributes() {
        let doc = Document::with_body(
            el("p")
                .attr("title", "a \"b\" & c")
                .text("1 < 2 & 3 > 2")
                .child(el("br")),
        );
        let p = doc.children(doc.root())[0];
        assert_eq!(
            to_html(&doc, p),
            "<p title=\"a &quot;b&quot; &amp; c\">1 &lt; 2 &amp; 3 &gt; 2<br></p>"
        );
    }
}

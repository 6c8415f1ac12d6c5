//! Final HTML document assembly.

use std::fmt::Write;

use crate::backend::PageMeta;

/// Everything needed to wrap a rendered page body into a document.
pub struct DocumentParts<'a> {
    pub body: &'a str,
    pub meta: &'a PageMeta,
    /// URL of the page stylesheet, if the page has CSS.
    pub page_css: Option<&'a str>,
    /// Island stylesheet URLs in first-reference order.
    pub island_css: &'a [String],
    /// Island script URLs in first-reference order.
    pub island_scripts: &'a [String],
}

/// Meta keys with a dedicated place in the document head.
const RESERVED_META: &[&str] = &["title", "description", "lang"];

fn meta_str<'a>(meta: &'a PageMeta, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(serde_json::Value::as_str)
}

/// Render a complete HTML document.
#[must_use]
pub fn render_document(parts: &DocumentParts<'_>) -> String {
    let mut html = String::with_capacity(parts.body.len() + 1024);

    let lang = meta_str(parts.meta, "lang").unwrap_or("en");
    let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>", escape(lang));
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");

    if let Some(title) = meta_str(parts.meta, "title") {
        let _ = writeln!(html, "<title>{}</title>", escape(title));
    }
    if let Some(description) = meta_str(parts.meta, "description") {
        let _ = writeln!(
            html,
            "<meta name=\"description\" content=\"{}\">",
            escape(description)
        );
    }
    for (name, value) in parts.meta {
        if RESERVED_META.contains(&name.as_str()) {
            continue;
        }
        if let Some(content) = value.as_str() {
            let _ = writeln!(
                html,
                "<meta name=\"{}\" content=\"{}\">",
                escape(name),
                escape(content)
            );
        }
    }

    if let Some(href) = parts.page_css {
        let _ = writeln!(html, "<link rel=\"stylesheet\" href=\"{}\">", escape(href));
    }
    for href in parts.island_css {
        let _ = writeln!(html, "<link rel=\"stylesheet\" href=\"{}\">", escape(href));
    }

    html.push_str("</head>\n<body>\n");
    html.push_str(parts.body);
    html.push('\n');
    for src in parts.island_scripts {
        let _ = writeln!(html, "<script defer src=\"{}\"></script>", escape(src));
    }
    html.push_str("</body>\n</html>\n");

    html
}

fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: serde_json::Value) -> PageMeta {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_document_head_and_assets() {
        let meta = meta(json!({
            "title": "Home & Away",
            "description": "Welcome",
            "author": "Team",
            "order": 3
        }));
        let island_css = vec!["/islands/counter.css".to_owned()];
        let scripts = vec![
            "/islands/counter.js".to_owned(),
            "/islands/clock.js".to_owned(),
        ];

        let html = render_document(&DocumentParts {
            body: "<main>hi</main>",
            meta: &meta,
            page_css: Some("/index.css"),
            island_css: &island_css,
            island_scripts: &scripts,
        });

        assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));
        assert!(html.contains("<title>Home &amp; Away</title>"));
        assert!(html.contains("<meta name=\"description\" content=\"Welcome\">"));
        assert!(html.contains("<meta name=\"author\" content=\"Team\">"));
        assert!(!html.contains("order"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"/index.css\">"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"/islands/counter.css\">"));

        let counter = html.find("/islands/counter.js").unwrap();
        let clock = html.find("/islands/clock.js").unwrap();
        let body = html.find("<main>hi</main>").unwrap();
        assert!(body < counter && counter < clock);
    }

    #[test]
    fn test_document_without_meta() {
        let meta = PageMeta::new();
        let html = render_document(&DocumentParts {
            body: "",
            meta: &meta,
            page_css: None,
            island_css: &[],
            island_scripts: &[],
        });

        assert!(!html.contains("<title>"));
        assert!(!html.contains("stylesheet"));
        assert!(html.ends_with("</body>\n</html>\n"));
    }

    #[test]
    fn test_lang_from_meta() {
        let meta = meta(json!({"lang": "fr"}));
        let html = render_document(&DocumentParts {
            body: "",
            meta: &meta,
            page_css: None,
            island_css: &[],
            island_scripts: &[],
        });
        assert!(html.contains("<html lang=\"fr\">"));
    }

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert_eq!(escape("a&b"), "a&amp;b");
        assert_eq!(escape("'x'"), "&#x27;x&#x27;");
    }
}

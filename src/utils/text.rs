// Text processing utilities

use std::collections::HashMap;

/// Markdown processing utilities
pub mod markdown {
    use comrak::{markdown_to_html, Options};

    /// Convert markdown to HTML. Raw HTML in the input is not passed through.
    pub fn to_html(markdown: &str) -> String {
        let mut options = Options::default();
        options.extension.strikethrough = true;
        options.extension.tagfilter = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        options.render.unsafe_ = false;

        markdown_to_html(markdown, &options)
    }
}

/// HTML helpers
pub mod html {
    /// Escape text for use inside element content or a quoted attribute
    pub fn escape(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

/// String and text manipulation utilities
pub mod string {
    /// Keep the first `max_chars` characters, appending "..." when anything
    /// was cut.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
            None => text.to_string(),
        }
    }

    /// Cut `text` to at most `max_bytes` bytes without splitting a character.
    /// Returns the kept prefix and whether anything was dropped.
    pub fn truncate_bytes(text: &str, max_bytes: usize) -> (&str, bool) {
        if text.len() <= max_bytes {
            return (text, false);
        }
        let mut end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        (&text[..end], true)
    }
}

/// Template processing utilities
pub mod template {
    use super::*;
    use regex::{Captures, Regex};
    use std::sync::OnceLock;

    /// Simple template engine for variable substitution
    #[derive(Debug, Clone, Default)]
    pub struct SimpleTemplate {
        variables: HashMap<String, String>,
    }

    impl SimpleTemplate {
        pub fn new() -> Self {
            Self::default()
        }

        /// Set a template variable
        pub fn set(&mut self, key: &str, value: &str) {
            self.variables.insert(key.to_string(), value.to_string());
        }

        /// Render template with variable substitution.
        /// Variables are specified as {{variable_name}}; a substituted value
        /// is never scanned for further placeholders.
        pub fn render(&self, template: &str) -> String {
            static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
            let placeholder = PLACEHOLDER.get_or_init(|| {
                Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern is valid")
            });

            placeholder
                .replace_all(template, |caps: &Captures| {
                    match self.variables.get(&caps[1]) {
                        Some(value) => value.clone(),
                        None => caps[0].to_string(),
                    }
                })
                .into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_html() {
        let markdown = "# Hello\n\nThis is **bold** text.";
        let html = markdown::to_html(markdown);
        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>"));
    }

    #[test]
    fn test_markdown_drops_raw_html() {
        let html = markdown::to_html("hi <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(string::truncate_chars("Hello World", 5), "Hello...");
        assert_eq!(string::truncate_chars("Hi", 10), "Hi");
        assert_eq!(string::truncate_chars("日本語のテキスト", 3), "日本語...");
    }

    #[test]
    fn test_truncate_bytes() {
        assert_eq!(string::truncate_bytes("abc", 10), ("abc", false));
        // 'é' is two bytes; never split it
        assert_eq!(string::truncate_bytes("aé", 2), ("a", true));
    }

    #[test]
    fn test_template_rendering() {
        let mut template = template::SimpleTemplate::new();
        template.set("name", "World");
        template.set("greeting", "Hello");

        let result = template.render("{{greeting}}, {{name}}!");
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_template_values_not_reexpanded() {
        let mut template = template::SimpleTemplate::new();
        template.set("a", "{{b}}");
        template.set("b", "oops");
        assert_eq!(template.render("{{a}} {{missing}}"), "{{b}} {{missing}}");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html::escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}

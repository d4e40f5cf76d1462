use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::utils::text::html::escape;

fn pandoc_wrapper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<div class="sourceCode"[^>]*>\s*(<pre\b.*?</pre>)\s*</div>"#)
            .expect("pandoc wrapper pattern is valid")
    })
}

fn code_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<pre\b(?P<pre>[^>]*)>\s*<code\b(?P<code>[^>]*)>(?P<body>.*?)</code>\s*</pre>"#)
            .expect("code block pattern is valid")
    })
}

fn class_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class\s*=\s*"([^"]*)""#).expect("class pattern is valid"))
}

/// Language named by the block's class attributes. Handles comrak's
/// `language-xx` on `<code>` and pandoc's `sourceCode xx` / bare `xx`.
fn detect_language(pre_attrs: &str, code_attrs: &str) -> Option<String> {
    for attrs in [code_attrs, pre_attrs] {
        let Some(caps) = class_attr().captures(attrs) else {
            continue;
        };
        for class in caps[1].split_whitespace() {
            let class = class.strip_prefix("language-").unwrap_or(class);
            if class == "sourceCode" {
                continue;
            }
            let language: String = class
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '_' | '-'))
                .collect::<String>()
                .to_ascii_lowercase();
            if !language.is_empty() {
                return Some(language);
            }
        }
    }
    None
}

/// Wraps rendered code blocks in copy/run widgets
#[derive(Debug, Clone, Default)]
pub struct CodeWidgets {
    runnable: HashSet<String>,
}

impl CodeWidgets {
    /// `runnable` lists the languages that get a Run button
    pub fn new<I, S>(runnable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runnable: runnable
                .into_iter()
                .map(|s| s.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_runnable(&self, language: &str) -> bool {
        self.runnable.contains(&language.to_ascii_lowercase())
    }

    pub fn wrap(&self, html: &str) -> String {
        let unwrapped = pandoc_wrapper().replace_all(html, "$1");
        code_block()
            .replace_all(&unwrapped, |caps: &Captures| self.widget(caps))
            .into_owned()
    }

    fn widget(&self, caps: &Captures) -> String {
        let language = detect_language(&caps["pre"], &caps["code"]);
        let label = escape(language.as_deref().unwrap_or("text"));
        let runnable = language.as_deref().is_some_and(|l| self.is_runnable(l));

        let mut widget = format!(
            concat!(
                r#"<div class="code-widget" data-language="{label}">"#,
                r#"<div class="code-widget-header">"#,
                r#"<span class="code-widget-language">{label}</span>"#,
                r#"<button type="button" class="code-widget-copy">Copy</button>"#,
            ),
            label = label
        );
        if runnable {
            widget.push_str(&format!(
                r#"<button type="button" class="code-widget-run" data-language="{}">Run</button>"#,
                label
            ));
        }
        widget.push_str("</div>");
        widget.push_str(&caps[0]);
        if runnable {
            widget.push_str(r#"<div class="code-widget-output" hidden></div>"#);
        }
        widget.push_str("</div>");
        widget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> CodeWidgets {
        CodeWidgets::new(["javascript", "js", "python"])
    }

    #[test]
    fn test_wraps_comrak_block() {
        let html = "<p>Run this:</p>\n<pre><code class=\"language-js\">console.log(&quot;hi&quot;);\n</code></pre>\n";
        let wrapped = widgets().wrap(html);

        assert!(wrapped.starts_with("<p>Run this:</p>\n<div class=\"code-widget\" data-language=\"js\">"));
        assert!(wrapped.contains("<span class=\"code-widget-language\">js</span>"));
        assert!(wrapped.contains("<button type=\"button\" class=\"code-widget-run\" data-language=\"js\">Run</button>"));
        assert!(wrapped.contains("<pre><code class=\"language-js\">console.log(&quot;hi&quot;);\n</code></pre>"));
        assert!(wrapped.contains("<div class=\"code-widget-output\" hidden></div></div>"));
    }

    #[test]
    fn test_wraps_pandoc_highlighted_block() {
        let html = "<div class=\"sourceCode\" id=\"cb1\"><pre\nclass=\"sourceCode python\"><code class=\"sourceCode python\"><span id=\"cb1-1\">print(1)</span></code></pre></div>";
        let wrapped = widgets().wrap(html);

        assert!(wrapped.starts_with("<div class=\"code-widget\" data-language=\"python\">"));
        assert!(!wrapped.contains("class=\"sourceCode\" id=\"cb1\""));
        assert!(wrapped.contains("<span id=\"cb1-1\">print(1)</span>"));
        assert!(wrapped.contains("code-widget-run"));
    }

    #[test]
    fn test_pandoc_plain_block_language_on_pre() {
        let wrapped = widgets().wrap("<pre class=\"rust\"><code>fn main() {}</code></pre>");
        assert!(wrapped.contains("data-language=\"rust\""));
        assert!(!wrapped.contains("code-widget-run"));
        assert!(!wrapped.contains("code-widget-output"));
    }

    #[test]
    fn test_block_without_language() {
        let wrapped = widgets().wrap("<pre><code>plain\n</code></pre>");
        assert!(wrapped.contains("data-language=\"text\""));
        assert!(wrapped.contains("code-widget-copy"));
        assert!(!wrapped.contains("code-widget-run"));
    }

    #[test]
    fn test_inline_code_and_multiple_blocks() {
        let html = "<p>use <code>x</code></p><pre><code class=\"language-js\">a</code></pre><pre><code class=\"language-python\">b</code></pre>";
        let wrapped = widgets().wrap(html);
        assert!(wrapped.starts_with("<p>use <code>x</code></p>"));
        assert_eq!(wrapped.matches("class=\"code-widget\"").count(), 2);
    }

    #[test]
    fn test_language_is_sanitized() {
        assert_eq!(detect_language("", r#" class="language-C++""#), Some("c++".to_string()));
        assert_eq!(detect_language(r#" class="sourceCode""#, ""), None);
    }

    #[test]
    fn test_runnable_is_case_insensitive() {
        assert!(CodeWidgets::new(["JavaScript"]).is_runnable("javascript"));
        assert!(!CodeWidgets::default().is_runnable("javascript"));
    }
}

//! Plugin-file reference rewriting and page documents.
//!
//! Rich text in a backup links its attachments as
//! `@@PLUGINFILE@@/<url-encoded name>"`. Each reference is pointed at the
//! resolved copy in the content directory; attachments of the activity's
//! context that the text never mentions are listed as links after it.

use std::{
    borrow::Cow,
    collections::HashSet,
    sync::LazyLock,
};

use quick_xml::escape::{escape, resolve_html5_entity};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::{
    catalog::FileRecord,
    template::{TemplateContext, TemplateError, TemplateRegistry},
};

/// Group 1 is the raw (still URL-encoded) reference, up to the closing quote
/// or the end of the text. It may carry a `?query` suffix.
static PLUGIN_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@@PLUGINFILE@@/([^"]*)"#).expect("valid plugin-file pattern"));

/// Longest entity name considered when decoding.
const MAX_ENTITY_LEN: usize = 32;

/// Rewriting errors.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Text refers to a file that is not attached to its context.
    #[error("file {filename} not found in context")]
    MissingFile { filename: String },

    /// Template error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// Result type for rewriting.
pub type Result<T> = std::result::Result<T, RewriteError>;

/// Rewrites activity text and wraps it into a page document.
#[derive(Debug, Clone)]
pub struct ContentRewriter {
    content_dir: String,
    math_scripts: Vec<String>,
    templates: TemplateRegistry,
}

impl ContentRewriter {
    /// Create a rewriter linking into `content_dir` (relative to the pages).
    #[must_use]
    pub fn new(content_dir: impl Into<String>) -> Self {
        Self {
            content_dir: content_dir.into(),
            math_scripts: Vec::new(),
            templates: TemplateRegistry::new(),
        }
    }

    /// Scripts injected into pages whose text looks like it contains LaTeX.
    #[must_use]
    pub fn with_math_scripts(mut self, scripts: Vec<String>) -> Self {
        self.math_scripts = scripts;
        self
    }

    /// Rewrite `raw` and wrap it into a complete page titled `title`.
    ///
    /// `own` are the files of the activity's context; unreferenced ones are
    /// appended as links. `shared` files may be referenced but are never listed.
    pub fn render(
        &self,
        title: &str,
        raw: &str,
        own: &[&FileRecord],
        shared: &[&FileRecord],
    ) -> Result<String> {
        let body = self.rewrite_body(raw, own, shared)?;
        self.render_document(title, &body)
    }

    /// Decode entities, resolve plugin-file references and append unreferenced files.
    pub fn rewrite_body(
        &self,
        raw: &str,
        own: &[&FileRecord],
        shared: &[&FileRecord],
    ) -> Result<String> {
        let body = decode_entities(raw);
        let mut output = String::with_capacity(body.len());
        let mut embedded = HashSet::new();
        let mut last = 0;

        for caps in PLUGIN_FILE_RE.captures_iter(&body) {
            let (Some(marker), Some(reference)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let (filename, resume) = split_reference(reference.as_str());
            let resume = reference.start() + resume;

            let resolved = if let Some(index) = own.iter().position(|f| f.has_name(&filename)) {
                embedded.insert(index);
                own[index].resolved_name(&filename)
            } else {
                shared
                    .iter()
                    .find(|f| f.has_name(&filename))
                    .and_then(|f| f.resolved_name(&filename))
            };
            let resolved = resolved.ok_or(RewriteError::MissingFile { filename })?;

            output.push_str(&body[last..marker.start()]);
            output.push_str(&self.content_href(resolved));
            last = resume;
        }
        output.push_str(&body[last..]);

        let extra: Vec<_> = own
            .iter()
            .enumerate()
            .filter(|(index, _)| !embedded.contains(index))
            .map(|(_, file)| {
                format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    self.content_href(file.resolved_initial_name()),
                    escape(file.initial_name())
                )
            })
            .collect();
        if !extra.is_empty() {
            debug!(count = extra.len(), "appending unreferenced files");
            output.push_str("\n<ul>\n");
            output.extend(extra);
            output.push_str("</ul>");
        }

        Ok(output)
    }

    /// Wrap a finished body into a page document.
    pub fn render_document(&self, title: &str, body: &str) -> Result<String> {
        let mut ctx = TemplateContext::new()
            .with_var("title", escape(title))
            .with_var("body", body);

        if !self.math_scripts.is_empty() && has_math(body) {
            let scripts: String = self
                .math_scripts
                .iter()
                .map(|src| format!("\n<script async src=\"{}\"></script>", escape(src.as_str())))
                .collect();
            ctx.insert("head_extra", scripts);
        }

        Ok(self.templates.render("page", &ctx)?)
    }

    fn content_href(&self, name: &str) -> String {
        format!("{}/{}", self.content_dir, escape(name))
    }
}

/// Split a raw reference into its decoded filename and the offset (within the
/// raw reference) where the untouched remainder starts.
///
/// A `?` after the last `.` starts a query, which does not identify the file
/// and is kept in the output after the rewritten path.
fn split_reference(raw: &str) -> (String, usize) {
    let decoded = url_decode(raw);
    let has_query = match (decoded.rfind('.'), decoded.rfind('?')) {
        (Some(dot), Some(qmark)) => qmark > dot,
        _ => false,
    };
    if !has_query {
        return (decoded, raw.len());
    }

    match raw.rfind('?') {
        Some(qmark) => (url_decode(&raw[..qmark]), qmark),
        // The `?` was percent-encoded, so the raw text has no query boundary.
        None => {
            let qmark = decoded.rfind('?').unwrap_or(decoded.len());
            (decoded[..qmark].to_string(), raw.len())
        }
    }
}

fn url_decode(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// Whether text contains both halves of `\( \)` or of `\[ \]`.
///
/// A cheap signal that the page needs a math renderer, not a syntax check.
pub fn has_math(body: &str) -> bool {
    (body.contains("\\(") && body.contains("\\)")) || (body.contains("\\[") && body.contains("\\]"))
}

/// Decode HTML character references once.
///
/// Named (HTML5) and numeric references terminated by `;` are replaced;
/// anything that does not form a known reference is kept as written.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .bytes()
            .take(MAX_ENTITY_LEN + 1)
            .position(|b| b == b';')
            .filter(|&semi| semi > 0)
            .and_then(|semi| resolve_entity(&tail[..semi]).map(|value| (semi, value)));

        match decoded {
            Some((semi, value)) => {
                output.push_str(&value);
                rest = &tail[semi + 1..];
            }
            None => {
                output.push('&');
                rest = tail;
            }
        }
    }
    output.push_str(rest);
    Cow::Owned(output)
}

fn resolve_entity(name: &str) -> Option<Cow<'static, str>> {
    match name.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code).map(|c| Cow::Owned(c.to_string()))
        }
        None => resolve_html5_entity(name).map(Cow::Borrowed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, names: &[&str]) -> FileRecord {
        let mut record = FileRecord::new(hash, names[0], "1");
        for name in &names[1..] {
            record.add_name(*name);
        }
        record
    }

    #[test]
    fn test_embedded_reference_rewritten() {
        let diagram = record("h1", &["diagram.png"]);
        let rewriter = ContentRewriter::new("content");
        let body = rewriter
            .rewrite_body(r#"<img src="@@PLUGINFILE@@/diagram.png" alt="">"#, &[&diagram], &[])
            .unwrap();
        assert_eq!(body, r#"<img src="content/diagram.png" alt="">"#);
    }

    #[test]
    fn test_unreferenced_files_listed() {
        let diagram = record("h1", &["diagram.png"]);
        let notes = record("h2", &["notes.pdf"]);
        let rewriter = ContentRewriter::new("content");
        let body = rewriter
            .rewrite_body(
                r#"<img src="@@PLUGINFILE@@/diagram.png">"#,
                &[&diagram, &notes],
                &[],
            )
            .unwrap();
        assert!(body.contains(r#"src="content/diagram.png""#));
        assert!(body.contains(r#"<li><a href="content/notes.pdf">notes.pdf</a></li>"#));
        assert!(!body.contains(r#"<a href="content/diagram.png">"#));
    }

    #[test]
    fn test_no_list_without_extra_files() {
        let rewriter = ContentRewriter::new("content");
        let body = rewriter.rewrite_body("<p>plain</p>", &[], &[]).unwrap();
        assert_eq!(body, "<p>plain</p>");
    }

    #[test]
    fn test_missing_file_is_error() {
        let rewriter = ContentRewriter::new("content");
        let err = rewriter
            .rewrite_body(r#"<a href="@@PLUGINFILE@@/ghost.pdf">x</a>"#, &[], &[])
            .unwrap_err();
        assert!(matches!(err, RewriteError::MissingFile { filename } if filename == "ghost.pdf"));
    }

    #[test]
    fn test_encoded_name_and_query() {
        let file = record("h1", &["my file.pdf"]);
        let rewriter = ContentRewriter::new("content");
        let body = rewriter
            .rewrite_body(
                r#"<a href="@@PLUGINFILE@@/my%20file.pdf?forcedownload=1">get</a>"#,
                &[&file],
                &[],
            )
            .unwrap();
        assert_eq!(body, r#"<a href="content/my file.pdf?forcedownload=1">get</a>"#);
    }

    #[test]
    fn test_renamed_alias_used() {
        let mut file = record("h1", &["a.txt"]);
        file.rename("a.txt", "a_.txt".to_string());
        let rewriter = ContentRewriter::new("content");
        let body = rewriter
            .rewrite_body(r#"<a href="@@PLUGINFILE@@/a.txt">a</a>"#, &[&file], &[])
            .unwrap();
        assert_eq!(body, r#"<a href="content/a_.txt">a</a>"#);
    }

    #[test]
    fn test_shared_files_resolved_but_not_listed() {
        let own = record("h1", &["own.txt"]);
        let shared = record("h2", &["q.png"]);
        let rewriter = ContentRewriter::new("content");
        let body = rewriter
            .rewrite_body(r#"<img src="@@PLUGINFILE@@/q.png">"#, &[&own], &[&shared])
            .unwrap();
        assert!(body.contains(r#"src="content/q.png""#));
        assert!(body.contains("own.txt"));
        assert_eq!(body.matches("q.png").count(), 1);
    }

    #[test]
    fn test_entities_decoded_once() {
        let rewriter = ContentRewriter::new("content");
        let body = rewriter
            .rewrite_body("&lt;b&gt;x&amp;amp;y&nbsp;&#65;&#x42; & ;", &[], &[])
            .unwrap();
        assert_eq!(body, "<b>x&amp;y\u{a0}AB & ;");
    }

    #[test]
    fn test_unterminated_references_kept() {
        let ampersands = "&".repeat(100_000);
        assert_eq!(decode_entities(&ampersands), ampersands.as_str());

        let run = format!("&amp{};", "x".repeat(40));
        assert_eq!(decode_entities(&run), run.as_str());

        let mixed = format!("{}&lt;", "& ".repeat(1_000));
        assert!(decode_entities(&mixed).ends_with("& <"));
    }

    #[test]
    fn test_document_and_math() {
        let rewriter = ContentRewriter::new("content").with_math_scripts(vec!["m.js".to_string()]);
        let plain = rewriter.render_document("A <b>", "text").unwrap();
        assert!(plain.contains("<title>A &lt;b&gt;</title>"));
        assert!(!plain.contains("<script"));

        let math = rewriter.render_document("M", r"\(x^2\)").unwrap();
        assert!(math.contains(r#"<script async src="m.js"></script>"#));

        let half = rewriter.render_document("M", r"\( only").unwrap();
        assert!(!half.contains("<script"));
    }

    #[test]
    fn test_has_math() {
        assert!(has_math(r"\[ a \]"));
        assert!(has_math(r"\( a \)"));
        assert!(!has_math(r"\( a \]"));
    }
}

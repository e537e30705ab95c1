//! Template renderer for proxy-templater.
//! Translates the directive syntax used by proxy templates (`{{ stmt }}`,
//! `{{= expr }}`, `{{- expr }}`) into MiniJinja source and renders it.
use crate::error::{Error, Result};
use minijinja::value::{Rest, Value};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use std::path::Path;

/// Delimiters and markers of the template directive syntax.
///
/// A directive opens with `open` and closes at the first following `close`.
/// When the directive body starts with `interpolate` its expression is
/// inserted verbatim, with `escape` it is inserted HTML-escaped, and any
/// other body is a control statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveSyntax {
    pub open: String,
    pub close: String,
    pub interpolate: char,
    pub escape: char,
}

impl Default for DirectiveSyntax {
    fn default() -> Self {
        Self { open: "{{".to_string(), close: "}}".to_string(), interpolate: '=', escape: '-' }
    }
}

#[derive(Debug, PartialEq)]
enum Directive<'a> {
    Interpolate(&'a str),
    Escape(&'a str),
    Evaluate(&'a str),
}

impl DirectiveSyntax {
    fn classify<'a>(&self, body: &'a str) -> Option<Directive<'a>> {
        if body.is_empty() {
            return None;
        }
        if let Some(expr) = body.strip_prefix(self.interpolate) {
            if !expr.is_empty() && !expr.contains('\n') {
                return Some(Directive::Interpolate(expr.trim()));
            }
        }
        if let Some(expr) = body.strip_prefix(self.escape) {
            if !expr.is_empty() && !expr.contains('\n') {
                return Some(Directive::Escape(expr.trim()));
            }
        }
        Some(Directive::Evaluate(body.trim()))
    }

    /// Translates directive template source into MiniJinja source.
    ///
    /// Literal text that could be mistaken for MiniJinja syntax is emitted as
    /// a quoted string expression, so only the directives are ever evaluated.
    pub fn translate(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find(&self.open) {
            let after = &rest[start + self.open.len()..];
            let Some(end) = after.find(&self.close) else {
                break;
            };
            match self.classify(&after[..end]) {
                None => {
                    literal.push_str(&rest[..start + self.open.len()]);
                    rest = after;
                }
                Some(directive) => {
                    literal.push_str(&rest[..start]);
                    flush_literal(&mut out, &mut literal);
                    match directive {
                        Directive::Interpolate(expr) => {
                            out.push_str(&format!("{{{{ ({}) }}}}", expr))
                        }
                        Directive::Escape(expr) => {
                            out.push_str(&format!("{{{{ ({})|escape_html }}}}", expr))
                        }
                        Directive::Evaluate("") => {}
                        Directive::Evaluate(stmt) => out.push_str(&format!("{{% {} %}}", stmt)),
                    }
                    rest = &after[end + self.close.len()..];
                }
            }
        }
        literal.push_str(rest);
        flush_literal(&mut out, &mut literal);
        out
    }
}

fn flush_literal(out: &mut String, literal: &mut String) {
    if literal.is_empty() {
        return;
    }
    if needs_quoting(literal) {
        // The quoted text is never lexed as tags.
        out.push_str("{{ ");
        out.push_str(&serde_json::Value::String(literal.clone()).to_string());
        out.push_str(" }}");
    } else {
        out.push_str(literal);
    }
    literal.clear();
}

/// Whether literal text could be read as MiniJinja syntax, either on its own
/// or joined with the directive that follows it.
fn needs_quoting(literal: &str) -> bool {
    literal.contains("{{")
        || literal.contains("{%")
        || literal.contains("{#")
        || literal.ends_with('{')
}

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template string with the given context.
    ///
    /// # Arguments
    /// * `template` - Template string to render
    /// * `context` - Context variables for rendering
    /// * `source` - Path of the file the template was read from
    ///
    /// # Returns
    /// * `Result<String>` - Rendered template string
    fn render(&self, template: &str, context: &serde_json::Value, source: &Path)
        -> Result<String>;

    /// Directive syntax the templates passed to [`render`](Self::render) use.
    fn syntax(&self) -> &DirectiveSyntax;
}

/// MiniJinja-based renderer for directive templates.
pub struct MiniJinjaRenderer {
    syntax: DirectiveSyntax,
    /// MiniJinja environment instance
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Creates a renderer for the given directive syntax.
    ///
    /// Printing an undefined value is an error, testing one is not. Output is never auto-escaped, a `none`
    /// value renders as the empty string and trailing newlines are kept.
    pub fn new(syntax: DirectiveSyntax) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        env.set_formatter(|out, state, value| {
            if value.is_none() {
                Ok(())
            } else {
                minijinja::escape_formatter(out, state, value)
            }
        });
        env.add_filter("escape_html", escape_html);
        env.add_filter("basename", basename);
        env.add_filter("dirname", dirname);
        env.add_filter("extname", extname);
        env.add_function("path_join", path_join);
        Self { syntax, env }
    }

    /// Gives access to the underlying environment so callers can register
    /// additional functions, filters or globals.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        MiniJinjaRenderer::new(DirectiveSyntax::default())
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a directive template using MiniJinja.
    ///
    /// `source_filename` is bound to the path of the source file in addition
    /// to the keys of `context`.
    ///
    /// # Errors
    /// * `Error::TemplateRenderError` if the translated template fails to
    ///   parse or evaluate
    fn render(
        &self,
        template: &str,
        context: &serde_json::Value,
        source: &Path,
    ) -> Result<String> {
        let translated = self.syntax.translate(template);
        let source_filename = serde_json::Value::String(source.display().to_string());
        let scope = match context {
            serde_json::Value::Object(map) => {
                let mut map = map.clone();
                map.insert("source_filename".to_string(), source_filename);
                serde_json::Value::Object(map)
            }
            _ => serde_json::json!({ "source_filename": source_filename }),
        };

        self.env
            .render_named_str(&source.display().to_string(), &translated, scope)
            .map_err(|e| Error::TemplateRenderError { path: source.to_path_buf(), source: e })
    }

    fn syntax(&self) -> &DirectiveSyntax {
        &self.syntax
    }
}

fn escape_html(value: &Value) -> String {
    if value.is_none() || value.is_undefined() {
        return String::new();
    }
    let mut escaped = String::new();
    for c in value.to_string().chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn basename(path: String) -> String {
    Path::new(&path).file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn dirname(path: String) -> String {
    match Path::new(&path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.display().to_string(),
        _ => ".".to_string(),
    }
}

/// Extension including the leading dot, empty when there is none.
fn extname(path: String) -> String {
    Path::new(&path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn path_join(parts: Rest<String>) -> String {
    let mut joined = std::path::PathBuf::new();
    for part in parts.iter() {
        joined.push(part);
    }
    joined.display().to_string()
}

use std::borrow::Cow;
use std::path::PathBuf;

use minijinja::{AutoEscape, Environment, Value};

use crate::error::AppError;

const DEFAULT_TEMPLATE: &str = include_str!("../../../templates/report_template.html");

/// Where the report template comes from.
#[derive(Debug, Clone, Default)]
pub enum TemplateSource {
    /// Template compiled into the binary.
    #[default]
    Builtin,
    /// Template text supplied by the caller, e.g. an uploaded file.
    Inline(String),
    /// Template read from disk at render time.
    File(PathBuf),
}

impl TemplateSource {
    pub fn load(&self) -> Result<Cow<'_, str>, AppError> {
        match self {
            TemplateSource::Builtin => Ok(Cow::Borrowed(DEFAULT_TEMPLATE)),
            TemplateSource::Inline(text) => Ok(Cow::Borrowed(text.as_str())),
            TemplateSource::File(path) => {
                if !path.exists() {
                    tracing::error!("Template file not found at {}", path.display());
                    return Err(AppError::TemplateNotFound(path.clone()));
                }
                Ok(Cow::Owned(std::fs::read_to_string(path)?))
            }
        }
    }
}

/// Renders Jinja-syntax template text. Output is not auto-escaped; callers
/// escape any untrusted text they put in the context.
pub fn render_template(source: &str, context: Value) -> Result<String, AppError> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
    minijinja_contrib::add_to_environment(&mut env);
    Ok(env.render_str(source, context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use std::collections::BTreeMap;

    #[test]
    fn missing_file_is_reported() {
        let source = TemplateSource::File(PathBuf::from("/definitely/not/here/report.html"));
        let err = source.load().unwrap_err();
        assert!(matches!(err, AppError::TemplateNotFound(_)));
    }

    #[test]
    fn builtin_template_is_available() {
        let text = TemplateSource::Builtin.load().unwrap();
        assert!(text.contains("{{ title }}"));
    }

    #[test]
    fn python_style_items_are_supported() {
        let mut images = BTreeMap::new();
        images.insert("price", "AAA");
        let html = render_template(
            "{% for name, img in distributions.items() %}{{ name }}={{ img }};{% endfor %}",
            context! { distributions => images },
        )
        .unwrap();
        assert_eq!(html, "price=AAA;");
    }

    #[test]
    fn markup_is_not_escaped() {
        let html = render_template("{{ table }}", context! { table => "<table></table>" }).unwrap();
        assert_eq!(html, "<table></table>");
    }

    #[test]
    fn syntax_errors_surface_as_template_errors() {
        let err = render_template("{% for %}", context! {}).unwrap_err();
        assert!(matches!(err, AppError::TemplateError(_)));
    }
}

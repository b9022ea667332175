//! `{{ name }}` placeholder substitution for action parameters

use handlebars::Handlebars;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::{Error, Result};

/// Non-strict, unescaped renderer: missing attributes render empty
static RENDERER: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(false);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
});

/// Replace every `{{ name }}` with the attribute's value
///
/// Missing attributes render as an empty string. A malformed template
/// (such as an unterminated `{{`) is an error.
pub fn render(template: &str, attributes: &BTreeMap<String, String>) -> Result<String> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }
    RENDERER
        .render_template(template, attributes)
        .map_err(|e| Error::Template {
            template: template.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        attrs.insert("site".to_string(), "berlin".to_string());
        attrs.insert("env".to_string(), "prod".to_string());
        attrs.insert("owner".to_string(), "R&D <ops>".to_string());
        attrs
    }

    #[test]
    fn substitutes_placeholders() {
        assert_eq!(render("/{{site}}/{{ env }}", &attrs()).unwrap(), "/berlin/prod");
    }

    #[test]
    fn missing_attribute_renders_empty() {
        assert_eq!(render("x{{ rack }}y", &attrs()).unwrap(), "xy");
    }

    #[test]
    fn values_are_not_html_escaped() {
        assert_eq!(render("{{ owner }}", &attrs()).unwrap(), "R&D <ops>");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("/static", &attrs()).unwrap(), "/static");
    }

    #[test]
    fn unterminated_placeholder_is_an_error() {
        let err = render("open {{ site", &attrs()).unwrap_err();
        assert!(matches!(err, Error::Template { ref template, .. } if template == "open {{ site"));
    }
}

use std::collections::BTreeMap;

use serde_json::Value;
use tera::{Context, Tera};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template `{0}` not found.")]
    NotFound(String),
    #[error("failed to render template `{name}`.")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
    #[error("failed to inline css.")]
    InlineCss(#[from] css_inline::InlineError),
}

/// 邮件模板渲染
///
/// 每个模板有两个变体：`{name}.html.tera`与`{name}.plain.tera`
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn from_dir(dir: &str) -> Result<Self, tera::Error> {
        let tera = Tera::new(&format!("{}/**/*.tera", dir.trim_end_matches('/')))?;
        Ok(Self::from_tera(tera))
    }

    pub fn from_tera(mut tera: Tera) -> Self {
        tera.autoescape_on(vec![".html.tera"]);
        Self { tera }
    }

    /// 渲染HTML正文并内联CSS
    pub fn render_html(
        &self,
        template: &str,
        data: &BTreeMap<String, Value>,
    ) -> Result<String, RenderError> {
        let html = self.render(&format!("{template}.html.tera"), data)?;
        Ok(css_inline::inline(&html)?)
    }

    pub fn render_plain(
        &self,
        template: &str,
        data: &BTreeMap<String, Value>,
    ) -> Result<String, RenderError> {
        self.render(&format!("{template}.plain.tera"), data)
    }

    fn render(&self, name: &str, data: &BTreeMap<String, Value>) -> Result<String, RenderError> {
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(RenderError::NotFound(name.into()));
        }

        let render_error = |source| RenderError::Render {
            name: name.into(),
            source,
        };
        let context = Context::from_serialize(data).map_err(render_error)?;
        self.tera.render(name, &context).map_err(render_error)
    }
}

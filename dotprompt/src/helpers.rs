//! Built-in template helpers
//!
//! Most helpers emit the marker protocol that [`crate::parse::to_messages`]
//! decodes; `json`, `ifEquals` and `unlessEquals` are plain formatting and
//! branching helpers.

use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, Renderable};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// A registered helper implementation
pub type BoxedHelper = Box<dyn HelperDef + Send + Sync>;

/// Names and implementations registered on every `Dotprompt` instance
pub fn builtin_helpers() -> Vec<(&'static str, BoxedHelper)> {
    debug!("builtin_helpers: called");
    vec![
        ("json", Box::new(json_helper) as BoxedHelper),
        ("role", Box::new(role_helper) as BoxedHelper),
        ("history", Box::new(history_helper) as BoxedHelper),
        ("section", Box::new(section_helper) as BoxedHelper),
        ("media", Box::new(media_helper) as BoxedHelper),
        ("ifEquals", Box::new(IfEquals) as BoxedHelper),
        ("unlessEquals", Box::new(UnlessEquals) as BoxedHelper),
    ]
}

/// Display form of a helper argument; strings are taken verbatim
fn param_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `{{json value indent=2}}`
fn json_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let Some(value) = h.param(0).map(|p| p.value()) else {
        debug!("json_helper: no value given");
        return Ok(());
    };
    let indent = h.hash_get("indent").and_then(|p| p.value().as_u64()).unwrap_or(0);

    match to_json(value, indent as usize) {
        Ok(rendered) => out.write(&rendered)?,
        Err(e) => warn!(error = %e, "json_helper: could not serialize value"),
    }
    Ok(())
}

fn to_json(value: &Value, indent: usize) -> Result<String, serde_json::Error> {
    if indent == 0 {
        return serde_json::to_string(value);
    }

    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `{{role "model"}}`
fn role_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    if let Some(role) = h.param(0).and_then(|p| param_string(p.value())) {
        debug!(%role, "role_helper: emitting role marker");
        out.write(&format!("<<<dotprompt:role:{}>>>", role))?;
    }
    Ok(())
}

/// `{{history}}`
fn history_helper(_: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    out.write("<<<dotprompt:history>>>")?;
    Ok(())
}

/// `{{section "output"}}`
fn section_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    if let Some(name) = h.param(0).and_then(|p| param_string(p.value())) {
        out.write(&format!("<<<dotprompt:section {}>>>", name))?;
    }
    Ok(())
}

/// `{{media url=imageUrl contentType="image/png"}}`
fn media_helper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let Some(url) = h.hash_get("url").and_then(|p| param_string(p.value())) else {
        debug!("media_helper: no url given");
        return Ok(());
    };

    match h.hash_get("contentType").and_then(|p| param_string(p.value())) {
        Some(content_type) => out.write(&format!("<<<dotprompt:media:url {} {}>>>", url, content_type))?,
        None => out.write(&format!("<<<dotprompt:media:url {}>>>", url))?,
    }
    Ok(())
}

fn params_equal(h: &Helper) -> bool {
    match (h.param(0), h.param(1)) {
        (Some(a), Some(b)) => a.value() == b.value(),
        _ => false,
    }
}

/// `{{#ifEquals a b}}...{{else}}...{{/ifEquals}}`
struct IfEquals;

impl HelperDef for IfEquals {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let branch = if params_equal(h) { h.template() } else { h.inverse() };
        match branch {
            Some(t) => t.render(r, ctx, rc, out),
            None => Ok(()),
        }
    }
}

/// `{{#unlessEquals a b}}...{{else}}...{{/unlessEquals}}`
struct UnlessEquals;

impl HelperDef for UnlessEquals {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let branch = if params_equal(h) { h.inverse() } else { h.template() };
        match branch {
            Some(t) => t.render(r, ctx, rc, out),
            None => Ok(()),
        }
    }
}

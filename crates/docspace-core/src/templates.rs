use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::EdgeError;

pub(crate) const HEAD: &str = "head";
pub(crate) const DIRECTOR_BADGE: &str = "director_badge";
pub(crate) const DIRECTOR_POPUP: &str = "director_popup";

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hbs = Handlebars::new();
    register_templates(&mut hbs);
    hbs
});

pub(crate) fn register_templates(hbs: &mut Handlebars) {
    hbs.set_strict_mode(false);
    hbs.register_template_string(HEAD, include_str!("templates/head.hbs"))
        .expect("register head template");
    hbs.register_template_string(
        DIRECTOR_BADGE,
        include_str!("templates/director_badge.hbs"),
    )
    .expect("register director badge template");
    hbs.register_template_string(
        DIRECTOR_POPUP,
        include_str!("templates/director_popup.hbs"),
    )
    .expect("register director popup template");
}

pub(crate) fn render<T>(name: &str, data: &T) -> Result<String, EdgeError>
where
    T: Serialize,
{
    TEMPLATES
        .render(name, data)
        .map_err(|err| EdgeError::internal(anyhow::anyhow!("render {name}: {err}")))
}

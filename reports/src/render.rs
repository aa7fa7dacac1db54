//! HTML page rendering for the report site.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

/// Template shared by every page of the site.
const PAGE_TEMPLATE: &str = include_str!("../templates/page.html");

/// A navigation link on a rendered page.
#[derive(Debug, Clone, Serialize)]
pub struct PageLink {
    pub label: String,
    pub href: String,
}

impl PageLink {
    pub fn new(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
        }
    }
}

/// One page of the site, ready to render.
///
/// `preformatted` bodies are command output shown verbatim in a `<pre>`
/// block; otherwise the body is a short prose line. The engine HTML-escapes
/// labels and bodies; link hrefs are crate-internal constants rendered
/// verbatim.
#[derive(Debug)]
pub struct Page<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub subtitle: Option<&'a str>,
    pub links: &'a [PageLink],
    pub preformatted: bool,
}

pub fn render_page(page: &Page<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("page.html", PAGE_TEMPLATE)
        .context("parse page template")?;

    let template = env.get_template("page.html")?;
    let rendered = template.render(context! {
        title => page.title,
        body => page.body,
        subtitle => page.subtitle,
        links => page.links,
        preformatted => page.preformatted,
    })?;
    Ok(rendered)
}

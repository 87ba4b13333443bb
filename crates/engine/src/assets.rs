//! Asset bundles for `t-call-assets`.
//!
//! A bundle is an ordinary template whose output lists stylesheets and
//! scripts. [`AssetBundle`] classifies those tags and renders them back
//! either one by one (debug) or as bundle URLs.

use crate::engine::QWeb;
use crate::error::QWebError;
use crate::options::RenderOptions;
use log::debug;
use qweb_expr::Values;
use qweb_traits::TemplateRef;
use quick_xml::escape::escape;
use regex::Regex;
use std::fmt::Debug;
use std::sync::LazyLock;

static ASSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)(<link\b[^>]*?\bhref\s*=\s*["']([^"']+)["'][^>]*>)"#,
        r#"|<style\b[^>]*>(.*?)</style\s*>"#,
        r#"|<script\b[^>]*?\bsrc\s*=\s*["']([^"']+)["'][^>]*>\s*</script\s*>"#,
        r#"|<script\b[^>]*>(.*?)</script\s*>"#,
    ))
    .expect("BUG: invalid ASSET_RE regex literal")
});

/// Flags of one `t-call-assets` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetFlags {
    pub css: bool,
    pub js: bool,
    pub debug: bool,
    pub async_load: bool,
}

impl Default for AssetFlags {
    fn default() -> Self {
        Self {
            css: true,
            js: true,
            debug: false,
            async_load: false,
        }
    }
}

/// Produces the HTML that replaces a `t-call-assets` element.
pub trait AssetBundler: Send + Sync + Debug {
    fn to_html(
        &self,
        engine: &QWeb,
        xmlid: &str,
        flags: AssetFlags,
        values: &Values,
    ) -> Result<String, QWebError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Stylesheet { href: String },
    Style { content: String },
    Script { src: String },
    InlineScript { content: String },
}

impl Asset {
    fn is_css(&self) -> bool {
        matches!(self, Asset::Stylesheet { .. } | Asset::Style { .. })
    }

    fn is_inline(&self) -> bool {
        matches!(self, Asset::Style { .. } | Asset::InlineScript { .. })
    }

    fn to_html(&self, async_load: bool) -> String {
        match self {
            Asset::Stylesheet { href } => format!(
                r#"<link rel="stylesheet" type="text/css" href="{}"/>"#,
                escape(href.as_str())
            ),
            Asset::Style { content } => format!("<style>{}</style>", content),
            Asset::Script { src } => script_tag(src, async_load),
            Asset::InlineScript { content } => {
                format!(r#"<script type="text/javascript">{}</script>"#, content)
            }
        }
    }
}

fn script_tag(src: &str, async_load: bool) -> String {
    format!(
        r#"<script type="text/javascript" src="{}"{}></script>"#,
        escape(src),
        if async_load { r#" async="async""# } else { "" }
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    pub name: String,
    pub assets: Vec<Asset>,
}

impl AssetBundle {
    /// Collects the stylesheet and script tags of `html` in document order.
    /// A `<link>` counts only when it declares `stylesheet`.
    pub fn parse(name: impl Into<String>, html: &str) -> Self {
        let mut assets = Vec::new();
        for caps in ASSET_RE.captures_iter(html) {
            if let (Some(tag), Some(href)) = (caps.get(1), caps.get(2)) {
                if tag.as_str().contains("stylesheet") {
                    assets.push(Asset::Stylesheet {
                        href: href.as_str().to_string(),
                    });
                }
            } else if let Some(content) = caps.get(3) {
                assets.push(Asset::Style {
                    content: content.as_str().to_string(),
                });
            } else if let Some(src) = caps.get(4) {
                assets.push(Asset::Script {
                    src: src.as_str().to_string(),
                });
            } else if let Some(content) = caps.get(5) {
                assets.push(Asset::InlineScript {
                    content: content.as_str().to_string(),
                });
            }
        }
        Self {
            name: name.into(),
            assets,
        }
    }

    pub fn css_url(&self) -> String {
        format!("/web/assets/{}.min.css", self.name)
    }

    pub fn js_url(&self) -> String {
        format!("/web/assets/{}.min.js", self.name)
    }

    /// In debug mode every asset is emitted on its own. Otherwise files are
    /// replaced by one stylesheet and one script URL for the bundle, and
    /// inline styles and scripts follow.
    pub fn to_html(&self, flags: AssetFlags) -> String {
        let wanted = |asset: &&Asset| {
            if asset.is_css() {
                flags.css
            } else {
                flags.js
            }
        };
        if flags.debug {
            return self
                .assets
                .iter()
                .filter(wanted)
                .map(|asset| asset.to_html(flags.async_load))
                .collect();
        }
        let mut out = String::new();
        let has = |f: fn(&Asset) -> bool| self.assets.iter().any(f);
        if flags.css && has(|a| matches!(a, Asset::Stylesheet { .. })) {
            out.push_str(
                &Asset::Stylesheet {
                    href: self.css_url(),
                }
                .to_html(false),
            );
        }
        if flags.js && has(|a| matches!(a, Asset::Script { .. })) {
            out.push_str(&script_tag(&self.js_url(), flags.async_load));
        }
        for asset in self.assets.iter().filter(wanted).filter(|a| a.is_inline()) {
            out.push_str(&asset.to_html(flags.async_load));
        }
        out
    }
}

/// Renders the bundle template through the engine and bundles its output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAssetBundler;

impl AssetBundler for TemplateAssetBundler {
    fn to_html(
        &self,
        engine: &QWeb,
        xmlid: &str,
        flags: AssetFlags,
        values: &Values,
    ) -> Result<String, QWebError> {
        let html = engine.render(
            &TemplateRef::parse(xmlid),
            values.copy(),
            &RenderOptions::default(),
        )?;
        let bundle = AssetBundle::parse(xmlid, &html);
        debug!("Asset bundle '{}' has {} assets", xmlid, bundle.assets.len());
        Ok(bundle.to_html(flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"<t>
        <link rel="stylesheet" href="/a.css"/>
        <style>p { color: red }</style>
        <script src="/b.js"></script>
        <script>init();</script>
    </t>"#;

    #[test]
    fn test_parse_classifies_in_order() {
        let bundle = AssetBundle::parse("web.assets", BUNDLE);
        assert_eq!(
            bundle.assets,
            vec![
                Asset::Stylesheet {
                    href: "/a.css".into()
                },
                Asset::Style {
                    content: "p { color: red }".into()
                },
                Asset::Script { src: "/b.js".into() },
                Asset::InlineScript {
                    content: "init();".into()
                },
            ]
        );
    }

    #[test]
    fn test_bundled_output() {
        let bundle = AssetBundle::parse("web.assets", BUNDLE);
        assert_eq!(
            bundle.to_html(AssetFlags::default()),
            concat!(
                r#"<link rel="stylesheet" type="text/css" href="/web/assets/web.assets.min.css"/>"#,
                r#"<script type="text/javascript" src="/web/assets/web.assets.min.js"></script>"#,
                "<style>p { color: red }</style>",
                r#"<script type="text/javascript">init();</script>"#,
            )
        );
    }

    #[test]
    fn test_debug_lists_each_asset_and_honours_flags() {
        let bundle = AssetBundle::parse("web.assets", BUNDLE);
        let html = bundle.to_html(AssetFlags {
            css: false,
            debug: true,
            async_load: true,
            ..AssetFlags::default()
        });
        assert_eq!(
            html,
            concat!(
                r#"<script type="text/javascript" src="/b.js" async="async"></script>"#,
                r#"<script type="text/javascript">init();</script>"#,
            )
        );
    }
}

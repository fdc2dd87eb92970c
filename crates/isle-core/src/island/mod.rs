//! Island markup.
//!
//! An island is one server-rendered component followed by an inert marker
//! and a module script. In the browser the script imports the runtime and the
//! component's bundle, then hydrates the element right before the marker.

mod host;

pub use host::HydrationHost;

use crate::config::ServerConfig;
use crate::endpoint::ScriptEndpoint;
use crate::error::Error;
use crate::manifest::{DependencyManifest, RuntimePackage};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Island rendering failures.
#[derive(Debug, Error)]
pub enum IslandError {
    #[error("Island expects exactly one child, but received {received}")]
    ChildCount { received: usize },

    #[error("Failed to serialize island props: {0}")]
    Props(#[from] serde_json::Error),
}

/// A rendered child handed to an island.
#[derive(Debug, Clone, PartialEq)]
pub enum IslandChild {
    /// An element produced by a component, with the props it was rendered with.
    Component {
        markup: String,
        props: Map<String, Value>,
    },
    /// Plain text.
    Text(String),
}

impl IslandChild {
    pub fn component(markup: impl Into<String>, props: Map<String, Value>) -> Self {
        Self::Component {
            markup: markup.into(),
            props,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    fn markup(&self) -> &str {
        match self {
            Self::Component { markup, .. } | Self::Text(markup) => markup,
        }
    }

    /// Props minus `children`, or `None` when nothing is left.
    fn hydration_props(&self) -> Option<Map<String, Value>> {
        let Self::Component { props, .. } = self else {
            return None;
        };
        let props: Map<String, Value> = props
            .iter()
            .filter(|(key, _)| key.as_str() != "children")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        (!props.is_empty()).then_some(props)
    }
}

/// Island ids are unique across every renderer in the process.
static NEXT_ISLAND_ID: AtomicU64 = AtomicU64::new(0);

/// Renders islands for one server.
#[derive(Debug)]
pub struct IslandRenderer {
    endpoint: ScriptEndpoint,
    runtime: RuntimePackage,
    cdn_host: String,
    build_stamp: Option<String>,
}

impl IslandRenderer {
    #[must_use]
    pub fn new(
        endpoint: ScriptEndpoint,
        runtime: RuntimePackage,
        cdn_host: impl Into<String>,
        build_stamp: Option<String>,
    ) -> Self {
        Self {
            endpoint,
            runtime,
            cdn_host: cdn_host.into(),
            build_stamp,
        }
    }

    /// Renderer matching a service built from the same config.
    pub fn from_config(config: &ServerConfig, manifest: &DependencyManifest) -> Result<Self, Error> {
        Ok(Self::new(
            ScriptEndpoint::new(config.endpoint.clone()),
            manifest.runtime(&config.runtime_package)?,
            config.cdn_host.clone(),
            config.build_stamp.clone(),
        ))
    }

    fn next_id() -> String {
        format!("isle-{}", NEXT_ISLAND_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Render `children` (exactly one) as an island importing `source`.
    ///
    /// The bootstrap script hydrates the node right before the marker: the
    /// previous element for a component child, the previous node for a text
    /// child. Page renderers must not put anything between the child markup
    /// and the marker.
    pub fn render(&self, source: &str, children: Vec<IslandChild>) -> Result<String, IslandError> {
        let [child] = <[IslandChild; 1]>::try_from(children)
            .map_err(|rest| IslandError::ChildCount { received: rest.len() })?;

        let id = Self::next_id();
        let script = self.bootstrap_script(&id, source, &child)?;

        Ok(format!(
            r#"{markup}<template id="{id}"></template><script type="module" async>{script}</script>"#,
            markup = child.markup()
        ))
    }

    fn bootstrap_script(
        &self,
        id: &str,
        source: &str,
        child: &IslandChild,
    ) -> Result<String, IslandError> {
        let runtime_url = script_literal(&self.runtime.cdn_url(&self.cdn_host))?;
        let module_url = script_literal(&self.endpoint.url_for(source, self.build_stamp.as_deref()))?;
        let marker = script_literal(id)?;
        let host = HydrationHost::new("e", "r");
        let target = match child {
            IslandChild::Component { .. } => "previousElementSibling",
            IslandChild::Text(_) => "previousSibling",
        };

        let vnode = match child.hydration_props() {
            Some(props) => format!("h(Island,{})", script_literal(&props)?),
            None => "h(Island)".to_string(),
        };

        Ok(format!(
            "import{{h,hydrate}}from{runtime_url};\
             import Island from{module_url};\
             let e=document.getElementById({marker}).{target};\
             {replace}\
             hydrate({vnode},{host});",
            replace = host.replace_fn()
        ))
    }
}

/// JSON that can sit inside an inline `<script>` without ending it.
fn script_literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer(stamp: Option<&str>) -> IslandRenderer {
        IslandRenderer::new(
            ScriptEndpoint::default(),
            RuntimePackage {
                name: "preact".to_string(),
                version: "10.19.2".to_string(),
            },
            "https://esm.sh",
            stamp.map(str::to_string),
        )
    }

    fn marker_id(html: &str) -> &str {
        let rest = html.split_once(r#"<template id=""#).unwrap().1;
        rest.split_once('"').unwrap().0
    }

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_render_island() {
        let html = renderer(Some("abc123"))
            .render(
                "app/islands/counter",
                vec![IslandChild::component(
                    "<button>0</button>",
                    props(json!({ "start": 0, "children": "ignored" })),
                )],
            )
            .unwrap();

        let id = marker_id(&html);
        assert!(id.starts_with("isle-"));
        assert!(html.starts_with(&format!(
            r#"<button>0</button><template id="{id}"></template><script type="module" async>"#
        )));
        assert!(html.ends_with("</script>"));
        assert!(html.contains(r#"import{h,hydrate}from"https://esm.sh/preact@10.19.2";"#));
        assert!(html.contains(
            r#"import Island from"/_script?source=app%2Fislands%2Fcounter\u0026sha=abc123";"#
        ));
        assert!(html.contains(&format!(
            r#"document.getElementById("{id}").previousElementSibling;"#
        )));
        assert!(html.contains(r#"hydrate(h(Island,{"start":0}),"#));
        assert!(html.contains("{childNodes:[e],firstChild:e,insertBefore:r,appendChild:r}"));
        assert!(html.contains("e.parentNode.replaceChild(n,e)"));
        assert!(!html.contains("ignored"));
    }

    #[test]
    fn test_no_props_constructs_without_arguments() {
        let renderer = renderer(None);

        let only_children = renderer
            .render(
                "~/islands/clock",
                vec![IslandChild::component("<time></time>", props(json!({ "children": [] })))],
            )
            .unwrap();
        let text = renderer
            .render("~/islands/clock", vec![IslandChild::text("tick")])
            .unwrap();

        for html in [&only_children, &text] {
            assert!(html.contains("hydrate(h(Island),"));
            assert!(!html.contains("h(Island,{})"));
            assert!(!html.contains("sha="));
        }
        assert!(text.starts_with("tick<template"));
        assert!(text.contains(").previousSibling;"));
        assert!(only_children.contains(").previousElementSibling;"));
    }

    #[test]
    fn test_ids_are_unique_across_renderers() {
        let first = renderer(None);
        let second = renderer(Some("abc123"));

        let ids: Vec<String> = [&first, &second, &first, &second]
            .iter()
            .map(|r| {
                let html = r.render("a", vec![IslandChild::text("a")]).unwrap();
                marker_id(&html).to_string()
            })
            .collect();

        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len(), "duplicate ids: {ids:?}");
    }

    #[test]
    fn test_child_count_is_enforced() {
        let renderer = renderer(None);

        let err = renderer.render("a", Vec::new()).unwrap_err();
        assert!(matches!(err, IslandError::ChildCount { received: 0 }));

        let err = renderer
            .render("a", vec![IslandChild::text("a"), IslandChild::text("b")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Island expects exactly one child, but received 2"
        );
    }

    #[test]
    fn test_props_cannot_close_script() {
        let html = renderer(None)
            .render(
                "a",
                vec![IslandChild::component(
                    "<p></p>",
                    props(json!({ "label": "</script><script>alert(1)</script>", "sep": "a\u{2028}b & c" })),
                )],
            )
            .unwrap();

        let script = html.split_once("async>").unwrap().1;
        assert_eq!(script.matches("</script>").count(), 1);
        assert!(script.contains(r"\u003c/script\u003e\u003cscript\u003e"));
        assert!(script.contains(r"a\u2028b \u0026 c"));
    }
}

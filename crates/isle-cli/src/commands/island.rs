//! `isle island` command implementation.

use isle_core::{DependencyManifest, IslandChild, IslandRenderer, ServerConfig};
use miette::{miette, IntoDiagnostic, Result};
use serde_json::{Map, Value};

/// Print the markup an island wrapper emits for `source`.
pub fn run(config: ServerConfig, source: &str, props: Option<&str>, markup: String) -> Result<()> {
    let manifest = DependencyManifest::load(&config.manifest_path()).into_diagnostic()?;
    let renderer = IslandRenderer::from_config(&config, &manifest).into_diagnostic()?;

    let child = match props {
        Some(json) => IslandChild::component(markup, parse_props(json)?),
        None => IslandChild::text(markup),
    };

    let html = renderer.render(source, vec![child]).into_diagnostic()?;
    println!("{html}");
    Ok(())
}

fn parse_props(json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(json).into_diagnostic()? {
        Value::Object(map) => Ok(map),
        other => Err(miette!("--props must be a JSON object, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_props() {
        let props = parse_props(r#"{"start":3}"#).unwrap();
        assert_eq!(props["start"], 3);
        assert!(parse_props("[1,2]").is_err());
        assert!(parse_props("{").is_err());
    }
}

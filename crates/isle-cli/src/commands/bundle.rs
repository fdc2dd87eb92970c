//! `isle bundle` command implementation.

use isle_core::{ScriptQuery, ScriptService, ServerConfig};
use miette::{miette, IntoDiagnostic, Result};
use std::io::Write;

/// Build one source the way the script endpoint would and write it to stdout.
pub fn run(config: ServerConfig, source: &str) -> Result<()> {
    let service = ScriptService::load(config).into_diagnostic()?;
    let script = service
        .serve(&ScriptQuery::source(source))
        .map_err(|e| miette!("{source}: {e} (status {})", e.status()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&script.body).into_diagnostic()?;
    writeln!(stdout).into_diagnostic()?;
    Ok(())
}

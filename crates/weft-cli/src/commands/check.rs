//! `weft check`: Validate an aspect manifest.

use std::path::Path;

use anyhow::Context;
use tracing::debug;
use weft_core::AspectManifest;

use crate::output::StyledOutput;

pub fn execute(path: &Path, color: &str) -> anyhow::Result<()> {
    let manifest = AspectManifest::from_file(path)
        .with_context(|| format!("invalid manifest {}", path.display()))?;
    debug!(path = %path.display(), joins = manifest.joins.len(), "manifest loaded");

    let mut out = StyledOutput::from_flag(color);
    for (index, join) in manifest.joins.iter().enumerate() {
        out.bold(&format!("#{:<3}", index));
        out.info(&format!("{:<13}", join.kind.keyword()));
        out.plain(&format!("{}  ->  {}", join.pointcut, join.advice));
        if !join.types.is_empty() {
            out.plain(&format!("  [{}]", join.types.join(", ")));
        }
        out.newline();
    }

    let noun = if manifest.joins.len() == 1 { "join point" } else { "join points" };
    out.success(&format!("{}: {} {} OK", path.display(), manifest.joins.len(), noun));
    out.newline();
    out.flush();
    Ok(())
}

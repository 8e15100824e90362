//! `weft match`: Test a pointcut against a call signature.

use anyhow::{anyhow, Context};
use weft_core::{Pointcut, Signature, Visibility};

use crate::output::StyledOutput;

/// Print the verdict; returns whether the pointcut matched.
pub fn execute(pointcut: &str, signature: &str, visibility: &str, color: &str) -> anyhow::Result<bool> {
    let (pointcut, signature) = parse(pointcut, signature, visibility)?;
    let matched = pointcut.resolve(&signature);

    let mut out = StyledOutput::from_flag(color);
    if matched {
        out.success("match");
    } else {
        out.error("no match");
    }
    out.plain(&format!("  {}  ", pointcut));
    out.info(&format!("{} {}", signature.visibility, signature));
    out.newline();
    out.flush();

    Ok(matched)
}

fn parse(pointcut: &str, signature: &str, visibility: &str) -> anyhow::Result<(Pointcut, Signature)> {
    let visibility = Visibility::from_keyword(visibility)
        .ok_or_else(|| anyhow!("unknown visibility '{}' (expected public, protected or private)", visibility))?;
    let pointcut = Pointcut::parse(pointcut)?;
    let signature = Signature::parse(signature)
        .with_context(|| format!("cannot test pointcut {}", pointcut))?
        .with_visibility(visibility);
    Ok((pointcut, signature))
}

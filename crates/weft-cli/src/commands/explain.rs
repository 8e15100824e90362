//! `weft explain`: Show how a pointcut is parsed.

use weft_core::{Pattern, PatternToken, Pointcut, PointcutTarget};

use crate::output::StyledOutput;

pub fn execute(pointcut: &str, color: &str) -> anyhow::Result<()> {
    let pointcut = Pointcut::parse(pointcut)?;

    let mut out = StyledOutput::from_flag(color);
    for (label, value) in describe(&pointcut) {
        out.field(label, &value);
    }
    out.flush();
    Ok(())
}

/// Labelled fields of a parsed pointcut
pub fn describe(pointcut: &Pointcut) -> Vec<(&'static str, String)> {
    let target = match pointcut.target() {
        PointcutTarget::InstanceMethod => "instance method",
        PointcutTarget::StaticMethod => "static method",
        PointcutTarget::Function => "function",
    };
    let visibility = pointcut
        .visibility()
        .map_or_else(|| "any".to_string(), |v| v.to_string());

    let mut fields = vec![
        ("pointcut", pointcut.source().to_string()),
        ("target", target.to_string()),
        ("visibility", visibility),
    ];
    if pointcut.target() != PointcutTarget::Function {
        fields.push(("namespace", tokens(pointcut.namespace_pattern())));
    }
    fields.push(("name", tokens(pointcut.name_pattern())));
    fields
}

fn tokens(pattern: &Pattern) -> String {
    let parts: Vec<String> = pattern
        .tokens()
        .iter()
        .map(|token| match token {
            PatternToken::Literal(text) => format!("\"{}\"", text),
            PatternToken::Wildcard => "<any>".to_string(),
        })
        .collect();
    if parts.is_empty() {
        "(empty)".to_string()
    } else {
        parts.join(" ")
    }
}

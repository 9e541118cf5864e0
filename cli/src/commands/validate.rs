//! Validate command implementation

use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};
use serialguard_engine::{GlobalFilter, Limits, Matcher, PatternError, PatternRule};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Pattern string, e.g. "maxdepth=8;com.acme.**;!*"
    #[arg(env = "SERIALGUARD_FILTER")]
    pub pattern: String,

    /// Print the compiled filter as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let filter = match GlobalFilter::compile(&args.pattern) {
        Ok(filter) => filter,
        Err(PatternError::Empty) => {
            output::info("Pattern has no rules or limits; no filter would be installed.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Invalid filter pattern"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary(&filter))?);
        return Ok(());
    }

    output::success(&format!("Pattern compiled: {}", filter.pattern()));
    println!("Limits:");
    for (name, value) in limit_entries(filter.limits()) {
        let shown = value.map_or_else(|| "unbounded".to_string(), |v| v.to_string());
        println!("  {:<9} {}", name, shown);
    }
    if filter.rules().is_empty() {
        println!("Rules: none (resource limits only)");
    } else {
        println!("Rules (first match wins):");
        for (i, rule) in filter.rules().iter().enumerate() {
            let (kind, operand) = matcher_parts(rule.matcher());
            let module = rule
                .module()
                .map(|m| format!(" in module {}", m))
                .unwrap_or_default();
            println!(
                "  {:>2}. {} {:<7} \"{}\"{}",
                i + 1,
                output::status_label(rule.status()),
                kind,
                operand,
                module
            );
        }
    }
    Ok(())
}

fn limit_entries(limits: &Limits) -> [(&'static str, Option<i64>); 4] {
    let bounded = |v: i64| (v != i64::MAX).then_some(v);
    [
        ("maxdepth", bounded(limits.max_depth)),
        ("maxrefs", bounded(limits.max_references)),
        ("maxarray", bounded(limits.max_array_length)),
        ("maxbytes", bounded(limits.max_stream_bytes)),
    ]
}

fn matcher_parts(matcher: &Matcher) -> (&'static str, &str) {
    match matcher {
        Matcher::Exact(name) => ("exact", name.as_str()),
        Matcher::Prefix(prefix) => ("prefix", prefix.as_str()),
        Matcher::Package(pkg) => ("package", pkg.as_str()),
        Matcher::Subtree(pkg) => ("subtree", pkg.as_str()),
    }
}

fn rule_summary(rule: &PatternRule) -> Value {
    let (kind, operand) = matcher_parts(rule.matcher());
    json!({
        "rule": rule.to_string(),
        "module": rule.module(),
        "kind": kind,
        "operand": operand,
        "status": rule.status(),
    })
}

fn summary(filter: &GlobalFilter) -> Value {
    let limits: serde_json::Map<String, Value> = limit_entries(filter.limits())
        .into_iter()
        .map(|(name, value)| (name.to_string(), json!(value)))
        .collect();
    json!({
        "pattern": filter.pattern(),
        "check_component_type": filter.check_component_type(),
        "limits": limits,
        "rules": filter.rules().iter().map(rule_summary).collect::<Vec<_>>(),
    })
}

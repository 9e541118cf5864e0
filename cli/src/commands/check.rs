//! Check command implementation

use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serialguard_engine::{reject_undecided_class, Filter, GlobalFilter};
use serialguard_shared::{FilterInfo, SerialClass, Status};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Pattern string to evaluate
    #[arg(short, long, env = "SERIALGUARD_FILTER")]
    pub pattern: String,

    /// Classes to check, e.g. com.acme.Widget, java.base/java.lang.String, [I
    /// (none = a metrics-only check)
    pub classes: Vec<SerialClass>,

    /// Graph depth of the candidate object
    #[arg(long, default_value_t = 1)]
    pub depth: i64,

    /// Back-references resolved so far
    #[arg(long, default_value_t = 0)]
    pub references: i64,

    /// Bytes consumed so far
    #[arg(long, default_value_t = 0)]
    pub bytes: i64,

    /// Array length (-1 for non-array events)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub array_length: i64,

    /// Reject classes the pattern leaves undecided
    #[arg(long)]
    pub reject_undecided: bool,

    /// Judge arrays by length only, without inspecting component types
    #[arg(long)]
    pub no_component_check: bool,

    /// Print decisions as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Decision {
    class: Option<SerialClass>,
    status: Status,
}

fn build_filter(args: &CheckArgs) -> Result<Filter> {
    let filter = GlobalFilter::compile_with(&args.pattern, !args.no_component_check)
        .context("Invalid filter pattern")?
        .into_filter();
    Ok(if args.reject_undecided {
        reject_undecided_class(filter)
    } else {
        filter
    })
}

fn evaluate(args: &CheckArgs, filter: &Filter) -> Vec<Decision> {
    let targets: Vec<Option<&SerialClass>> = if args.classes.is_empty() {
        vec![None]
    } else {
        args.classes.iter().map(Some).collect()
    };
    targets
        .into_iter()
        .map(|class| {
            let info = FilterInfo::new(class)
                .with_array_length(args.array_length)
                .with_depth(args.depth)
                .with_references(args.references)
                .with_stream_bytes(args.bytes);
            Decision {
                class: class.cloned(),
                status: filter.check_input(&info),
            }
        })
        .collect()
}

pub fn run(args: CheckArgs) -> Result<()> {
    let filter = build_filter(&args)?;
    let decisions = evaluate(&args, &filter);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
        return Ok(());
    }

    for d in &decisions {
        let subject = d
            .class
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(metrics only)".to_string());
        output::decision(d.status, &subject);
    }
    Ok(())
}

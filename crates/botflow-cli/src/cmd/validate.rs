use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::{ensure_valid, load_spec, print_report};

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Bot spec to check
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,
    /// Print the report as JSON on stdout
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let (_, report) = load_spec(&args.spec)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    ensure_valid(&args.spec, &report)?;
    if !args.json {
        println!(
            "{}: ok ({} warning(s))",
            args.spec.display(),
            report.warnings().count()
        );
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bitvm_ir::driver::{config::ProcedureScript, script::lower_script};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// The procedure script.
    input: PathBuf,

    /// Print the procedure as emitted, without resolving it.
    #[arg(long, default_value_t = false)]
    unresolved: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();

    let script = ProcedureScript::load(&args.input)?;
    tracing::debug!("loaded script {}", args.input.display());
    let procedure = lower_script(&script)?;

    if args.unresolved {
        print!("{procedure}");
        return Ok(());
    }

    let resolved = procedure.resolve()?;
    print!("{resolved}");

    Ok(())
}

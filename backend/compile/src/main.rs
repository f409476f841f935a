use std::path::PathBuf;

use clap::Parser;
use roster::DEFAULT_EMAIL_DOMAIN;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Roster CSV path or http(s) URL
    source: String,

    /// Where the compiled mapping is written
    #[arg(short, long, default_value = "roster.json")]
    output: PathBuf,

    /// JSON file with each house's student and faculty leader
    #[arg(short, long)]
    leaders: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_EMAIL_DOMAIN)]
    domain: String,

    /// Refuse to write a mapping where two occupants share a key
    #[arg(long)]
    strict: bool,

    /// Remote fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    compile::compile_roster(compile::Options {
        source: args.source,
        output: args.output,
        leaders: args.leaders,
        domain: args.domain,
        strict: args.strict,
        timeout: args.timeout,
    })
    .await
}

use clap::Parser;
use tracing::error;

use hevc_pipeline::{
    cli::CliArgs, config::ToolPaths, job::TranscodeJob, utils::setup_logging, Result,
};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if let Err(e) = setup_logging(&args.log_level) {
        eprintln!("Failed to set up logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<()> {
    args.validate()?;

    let tools = ToolPaths::from_env();
    let mut job = TranscodeJob::new(
        tools,
        args.job_options()?,
        args.input.clone(),
        args.output.clone(),
    );
    job.run().await
}

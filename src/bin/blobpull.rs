use blobpull::pull::{self, ConsoleReporter};
use blobpull::{Args, Error, PullConfig};
use clap::Parser;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Failures are reported on stdout; the exit status stays 0.
    if let Err(e) = pull_blobs(args).await {
        println!("{}", e.console_line());
    }
}

async fn pull_blobs(args: Args) -> Result<(), Error> {
    let config = PullConfig::try_from(args)?;
    let report = pull::run(config, Box::new(ConsoleReporter)).await?;
    report.check()
}


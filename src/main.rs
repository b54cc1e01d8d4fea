use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use feedsnap::config::{Config, RawInputs};
use feedsnap::feed::build_client;
use feedsnap::host::{set_failed, ActionsReporter};
use feedsnap::pipeline::{self, feed_output};

/// Every flag falls back to the matching `INPUT_*` variable, which is how
/// the Actions runner passes step inputs.
#[derive(Parser, Debug)]
#[command(
    name = "feedsnap",
    version,
    about = "Fetch RSS/Atom/RDF/JSON feeds and save normalized snapshots"
)]
struct Args {
    /// Feed URL, or a JSON array of URLs
    #[arg(long, env = "INPUT_FEED_URL")]
    feed_url: Option<String>,

    /// Destination path, or a JSON array of paths paired with the URLs
    #[arg(long, env = "INPUT_FILE_PATH")]
    file_path: Option<String>,

    /// JSON object of parser options
    #[arg(long, env = "INPUT_PARSER_OPTIONS")]
    parser_options: Option<String>,

    /// JSON object of fetch options
    #[arg(long, env = "INPUT_FETCH_OPTIONS")]
    fetch_options: Option<String>,

    /// "true" to drop the top-level published date
    #[arg(long, env = "INPUT_REMOVE_PUBLISHED")]
    remove_published: Option<String>,

    /// "true" to drop rss.channel.lastBuildDate
    #[arg(long, env = "INPUT_REMOVE_LAST_BUILD_DATE")]
    remove_last_build_date: Option<String>,

    /// "extract" (default) or "convert"
    #[arg(long, env = "INPUT_MODE")]
    mode: Option<String>,
}

impl From<Args> for RawInputs {
    fn from(args: Args) -> Self {
        Self {
            feed_url: args.feed_url,
            file_path: args.file_path,
            parser_options: args.parser_options,
            fetch_options: args.fetch_options,
            remove_published: args.remove_published,
            remove_last_build_date: args.remove_last_build_date,
            mode: args.mode,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // stdout carries workflow commands, so diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let reporter = ActionsReporter::from_env();

    match run(args, &reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Run failed");
            if let Err(io_err) = set_failed(&mut io::stdout(), &mut io::stderr(), &e.to_string()) {
                tracing::warn!(error = %io_err, "Failed to report failure");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, reporter: &ActionsReporter) -> Result<()> {
    let config = Config::resolve(&args.into())?;
    let client = build_client().context("failed to build HTTP client")?;

    let mut stdout = io::stdout();
    let snapshots = pipeline::run(&config, &client, &mut stdout).await?;

    let output = feed_output(&snapshots)?;
    reporter
        .set_output(&mut stdout, "feed", &output)
        .context("failed to set feed output")?;

    tracing::info!(feeds = snapshots.len(), "All feeds saved");
    Ok(())
}

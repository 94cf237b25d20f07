mod config;
mod github;
mod oep2;
mod pulls;
mod report;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pulls::{PullDetails, PullOrder, PullQuery};

/// Maintain OEP-2 openedx.yaml files across the Open edX GitHub
/// organizations, and read pull request data.
#[derive(Parser, Debug)]
#[command(name = "edx-repo-tools", version, about)]
struct Cli {
    /// Config file to use instead of ./.repo-tools.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split the shared repos manifest into openedx.yaml pull requests,
    /// one per listed repository
    Explode {
        /// Only report what would be done (the default)
        #[arg(long, conflicts_with = "yes")]
        dry: bool,

        /// Actually create the branches, files and pull requests
        #[arg(long)]
        yes: bool,
    },

    /// Gather every openedx.yaml file into one YAML document on stdout
    Implode {
        /// Organization to scan; repeatable. Defaults to the configured list.
        #[arg(long = "org")]
        orgs: Vec<String>,
    },

    /// List pull requests of a repository
    Pulls {
        /// Repository as owner/name
        owner_repo: String,

        /// Only pull requests with this label; repeatable
        #[arg(long = "label")]
        labels: Vec<String>,

        /// open, closed or all
        #[arg(long, default_value = "open")]
        state: String,

        /// Only pull requests updated at or after this RFC 3339 time
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// How much pull request detail to load
        #[arg(long, value_enum, default_value_t = PullDetails::None)]
        details: PullDetails,

        /// Print each pull request's comments too
        #[arg(long)]
        comments: bool,

        /// Group by author instead of streaming in update order
        #[arg(long)]
        by_author: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    debug!(api_url = %config.github.api_url, "loaded configuration");
    let client = github::RestClient::new(&config)?;

    match cli.command {
        Command::Explode { dry, yes } => {
            let dry = dry || !yes;
            info!(dry, "exploding repos manifest");
            let outcomes = oep2::explode(&client, &config.manifest, dry).await?;
            let summary = report::Summary::from_outcomes(&outcomes);
            report::print_summary(&summary, dry);
            info!(
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                "done"
            );
        }
        Command::Implode { orgs } => {
            let orgs = if orgs.is_empty() {
                config.implode.orgs.clone()
            } else {
                orgs
            };
            info!(?orgs, "imploding openedx.yaml files");
            let data = oep2::implode(&client, &orgs).await?;
            print!("{}", oep2::render_imploded(&data)?);
        }
        Command::Pulls {
            owner_repo,
            labels,
            state,
            since,
            details,
            comments,
            by_author,
        } => {
            let order = if by_author {
                PullOrder::Batch(|pull| pull.issue.user_login.clone().unwrap_or_default())
            } else {
                PullOrder::Streaming
            };
            let query = PullQuery {
                labels,
                state: Some(state),
                since,
                details,
                order,
            };
            let mut stream = pulls::get_pulls(&client, &owner_repo, query).await?;
            let mut count = 0;
            while let Some(pull) = stream.next().await? {
                report::print_pull(&pull);
                if comments {
                    let thread = pulls::get_comments(&client, &pull)?.collect_all().await?;
                    for comment in &thread {
                        report::print_comment(comment);
                    }
                }
                count += 1;
            }
            info!(pulls = count, "done");
        }
    }

    Ok(())
}

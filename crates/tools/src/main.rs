use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Campus map engine tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded session against a fixture data set
    Replay {
        /// Fixture with every feature the loader serves
        #[arg(long)]
        data: PathBuf,

        /// Session file: {"steps": [...]}
        #[arg(long)]
        session: PathBuf,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Replay { data, session, json } => {
            info!(data = %data.display(), session = %session.display(), "replaying session");
            let reports = tools::replay_files(&data, &session).await?;
            for report in reports {
                for event in &report.events {
                    if json {
                        println!("{}", serde_json::to_string(event)?);
                    } else {
                        println!("step {}: {event:?}", report.step);
                    }
                }
            }
        }
    }

    Ok(())
}

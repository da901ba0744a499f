use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use perch::core::db::init_demo_data;
use perch::{Config, Engine};

#[derive(Parser)]
#[command(name = "perch")]
#[command(about = "Inspect and seed a perch data directory", long_about = None)]
struct Args {
    /// Directory holding users.json and posts.json (defaults to $PERCH_DATA_DIR or ./data)
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the data files and print what was found
    Stats,
    /// Print a user's home timeline
    Timeline { username: String },
    /// Print the most used hashtags
    Trending {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Search posts by text, or by hashtag when the query starts with '#'
    Search { query: String },
    /// Search usernames
    Users { query: String },
    /// Add demo users, posts and follows, then save
    Seed,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let (engine, report) = Engine::open_with_report(config);

    let output = match args.command {
        Command::Stats => json!({
            "data_dir": engine.config().data_dir().display().to_string(),
            "report": report,
            "users": engine.user_count(),
            "posts": engine.post_count(),
            "hashtags": engine.hashtag_counts(usize::MAX).len(),
        }),
        Command::Timeline { username } => json!(engine.home_timeline(&username)),
        Command::Trending { limit } => json!(engine.hashtag_counts(limit)),
        Command::Search { query } => json!(engine.search_posts(&query)),
        Command::Users { query } => {
            let users: Vec<_> = engine
                .search_users(&query)
                .iter()
                .filter_map(|name| engine.user_summary(name))
                .collect();
            json!(users)
        }
        Command::Seed => {
            init_demo_data(&engine)?;
            engine.save_all().context("saving seeded data")?;
            json!({ "users": engine.user_count(), "posts": engine.post_count() })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "follow",
    about = "Follow: peer-published identities and their feed",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// RPC address of the content node (overrides config and environment)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Local storage directory (overrides config and environment)
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or load the local identity
    Init,
    /// Print the local identity id
    Whoami,
    /// Show an identity (default: self)
    Show(ShowArgs),
    /// List followed identities
    Following,
    /// Follow an identity
    Follow(IdArgs),
    /// Stop following an identity
    Unfollow(IdArgs),
    /// Publish a new post
    Post(PostArgs),
    /// Remove one of your posts
    Rm(CidArgs),
    /// Repost a post to your own list
    Repost(CidArgs),
    /// List the posts of an identity (default: self)
    Posts(ShowArgs),
    /// Show the feed
    Feed(FeedArgs),
    /// Refresh followed identities and rebuild the feed
    Sync,
    /// Republish the local identity
    Publish,
    /// Edit a field of the local identity (dn, av, meta, aux)
    Edit(EditArgs),
    /// Refresh and republish periodically until interrupted
    Daemon,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: Option<String>,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args)]
pub struct CidArgs {
    pub cid: String,
}

#[derive(Args)]
pub struct PostArgs {
    pub body: String,
    /// Files to attach
    #[arg(short, long)]
    pub file: Vec<PathBuf>,
}

#[derive(Args)]
pub struct FeedArgs {
    /// Run an aggregation pass first
    #[arg(long)]
    pub refresh: bool,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct EditArgs {
    pub key: String,
    /// JSON value; anything that is not valid JSON is taken as a string
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_post_with_files() {
        let cli = Cli::try_parse_from(["follow", "post", "hello", "-f", "a.png", "--file", "b.txt"]).unwrap();
        match cli.command {
            Command::Post(args) => {
                assert_eq!(args.body, "hello");
                assert_eq!(args.file.len(), 2);
            }
            _ => panic!("expected post"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["follow", "feed", "--refresh", "--format", "json", "-n", "5"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Feed(args) => {
                assert!(args.refresh);
                assert_eq!(args.limit, Some(5));
            }
            _ => panic!("expected feed"),
        }
    }
}

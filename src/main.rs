use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use truedisc::{cli, config, error, types::Source};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect listened artists from top tracks, top artists and playlists
    Collect(CollectOptions),

    #[clap(about = "Create a playlist of never heard tracks")]
    Playlist(PlaylistOptions),

    /// List collected artists
    Artists(ArtistsOptions),

    /// Show collection progress and cached data
    Status,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct CollectOptions {
    /// Discard an interrupted collection and start over
    #[clap(long)]
    pub fresh: bool,

    /// Interrupted attempts tolerated before giving up
    #[clap(long)]
    pub max_retries: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistOptions {
    /// Stop sampling once more tracks than this were found
    #[clap(long, default_value_t = 100)]
    pub length: usize,

    /// Never seed with artists only known from playlists
    #[clap(long)]
    pub exclude_playlist_only: bool,

    /// Maximum number of recommendation rounds
    #[clap(long, default_value_t = 50)]
    pub rounds: u32,

    /// Sample and print tracks without creating a playlist
    #[clap(long)]
    pub dry_run: bool,

    /// Publish the last sampled track list
    #[clap(long, conflicts_with = "dry_run")]
    pub reuse: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ArtistsOptions {
    /// Search for artists
    #[clap(long)]
    pub search: Option<String>,

    /// Only artists found through this source (top_tracks, top_artists, playlists)
    #[clap(long)]
    pub source: Option<Source>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Collect(opt) => cli::collect(opt.fresh, opt.max_retries).await,
        Command::Playlist(opt) => {
            cli::playlist(cli::PlaylistArgs {
                length: opt.length,
                exclude_playlist_only: opt.exclude_playlist_only,
                rounds: opt.rounds,
                dry_run: opt.dry_run,
                reuse: opt.reuse,
            })
            .await
        }
        Command::Artists(opt) => cli::list_artists(opt.search, opt.source).await,
        Command::Status => cli::status().await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}

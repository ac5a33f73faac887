use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "spots")]
#[command(bin_name = "spots")]
#[command(version)]
#[command(about = "Keep a local map of street-art spots with photos and notes")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'D',
        long,
        env = "SPOTS_DATA_DIR",
        default_value = ".spots",
        global = true,
        help = "Directory holding the spot database, config and legacy snapshot."
    )]
    pub data_dir: PathBuf,

    #[arg(
        short = 'c',
        long,
        env = "SPOTS_CONFIG",
        global = true,
        help = "Config file (defaults to <data-dir>/config.toml when present)."
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Create a spot at a coordinate.")]
    New(NewArgs),
    #[command(about = "List spots in creation order.")]
    Ls(ListArgs),
    #[command(about = "Show one spot by id or short id.")]
    Show(ShowArgs),
    #[command(about = "Edit a spot's title or description.")]
    Update(UpdateArgs),
    #[command(about = "Delete a spot.")]
    Rm(RemoveArgs),
    #[command(about = "Manage a spot's photos.")]
    Images(ImagesArgs),
    #[command(about = "Generate a description from the spot's cover photo.")]
    Describe(DescribeArgs),
    #[command(about = "Render the marker layer.")]
    Markers(MarkersArgs),
    #[command(about = "Click the map: select a nearby marker or create a spot.")]
    Click(ClickArgs),
    #[command(about = "Show storage and migration status.")]
    Status(StatusArgs),
    #[command(about = "Generate shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct NewArgs {
    #[arg(long, allow_hyphen_values = true, help = "Latitude in degrees.")]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true, help = "Longitude in degrees.")]
    pub lng: f64,

    #[arg(short = 't', long, help = "Title (defaults to the placeholder title).")]
    pub title: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, help = "Print JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Spot id or a unique suffix of it.")]
    pub id: String,

    #[arg(long, help = "Print JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(help = "Spot id or a unique suffix of it.")]
    pub id: String,

    #[arg(short = 't', long, help = "Set title.")]
    pub title: Option<String>,

    #[arg(short = 'd', long, help = "Set description.")]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    #[arg(help = "Spot id or a unique suffix of it.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ImagesArgs {
    #[command(subcommand)]
    pub command: ImagesSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum ImagesSubcommands {
    #[command(about = "Attach image files to a spot.")]
    Add(ImagesAddArgs),
    #[command(about = "Remove the image at an index.")]
    Rm(ImageIndexArgs),
    #[command(about = "Use the image at an index as the cover.")]
    Cover(ImageIndexArgs),
}

#[derive(Debug, Args)]
pub struct ImagesAddArgs {
    #[arg(help = "Spot id or a unique suffix of it.")]
    pub id: String,

    #[arg(required = true, help = "JPEG, PNG, GIF or WebP files.")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImageIndexArgs {
    #[arg(help = "Spot id or a unique suffix of it.")]
    pub id: String,

    #[arg(help = "Zero-based image index.")]
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    #[arg(help = "Spot id or a unique suffix of it.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct MarkersArgs {
    #[arg(short = 's', long, help = "Select this spot before rendering.")]
    pub select: Option<String>,

    #[arg(long, help = "Print JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ClickArgs {
    #[arg(long, allow_hyphen_values = true, help = "Latitude in degrees.")]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true, help = "Longitude in degrees.")]
    pub lng: f64,

    #[arg(short = 'y', long, help = "Confirm the create prompt on an empty spot.")]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, help = "Print JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish, elvish, powershell). Auto-detected if omitted.")]
    pub shell: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, ImagesSubcommands};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["spots", "new", "--lat", "-33.86", "--lng", "151.2"])
            .expect("args should parse");
        match cli.command {
            Commands::New(args) => {
                assert_eq!(args.lat, -33.86);
                assert_eq!(args.lng, 151.2);
                assert!(args.title.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_image_subcommands_and_global_data_dir() {
        let cli = Cli::try_parse_from(["spots", "images", "cover", "abc", "2", "-D", "/tmp/x"])
            .expect("args should parse");
        assert_eq!(cli.data_dir, std::path::PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Images(images) => match images.command {
                ImagesSubcommands::Cover(args) => {
                    assert_eq!(args.id, "abc");
                    assert_eq!(args.index, 2);
                }
                other => panic!("unexpected subcommand: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn images_add_requires_files() {
        assert!(Cli::try_parse_from(["spots", "images", "add", "abc"]).is_err());
    }
}

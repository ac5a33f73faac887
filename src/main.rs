mod app;
mod cli;
mod completions;
mod config;
mod db;
mod describe;
mod domain;
mod input;
mod legacy;
mod logging;
mod markers;
mod media;
mod persist;
mod repository;
mod session;
mod spot_id;
mod store;
mod ui;

use clap::Parser;

use app::{App, AppError, ClickOutcome};
use cli::{Commands, ImagesSubcommands};
use config::Config;
use domain::Position;
use legacy::MigrationStatus;
use spot_id::display_id;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(err) => eprintln!("error: could not serialize output: {}", err),
    }
}

async fn run() -> Result<(), AppError> {
    let cli = cli::Cli::parse();
    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref());
    }

    let config = Config::load(&cli.data_dir, cli.config.as_deref())?;
    logging::init_logging(config.log_filter.as_deref());

    let mut app = App::open(config).await?;
    if let Some(summary) = app.migration() {
        if summary.imported_count > 0 {
            eprintln!(
                "imported {} spot(s) from the legacy snapshot",
                summary.imported_count
            );
        }
        if matches!(
            summary.status,
            MigrationStatus::Partial | MigrationStatus::Failed
        ) {
            eprintln!(
                "warning: legacy snapshot import incomplete; the snapshot was kept: {}",
                summary.last_error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    let result = dispatch(&mut app, cli.command).await;
    let stats = app.close().await;
    tracing::debug!(
        puts = stats.puts,
        removes = stats.removes,
        coalesced = stats.coalesced,
        failed = stats.failed,
        "writes drained"
    );
    result
}

async fn dispatch(app: &mut App, command: Commands) -> Result<(), AppError> {
    match command {
        Commands::New(args) => {
            let spot = app.create(Position::new(args.lat, args.lng), args.title.as_deref())?;
            println!("created {} {}", display_id(&spot.id), spot.title);
        }
        Commands::Ls(args) => {
            if args.json {
                print_json(&app.spots());
            } else {
                ui::print_spot_list(app.spots());
            }
        }
        Commands::Show(args) => {
            let spot = app.show(&args.id)?;
            if args.json {
                print_json(&spot);
            } else {
                ui::print_spot_show(&spot);
            }
        }
        Commands::Update(args) => {
            let spot = app.update(&args.id, args.title, args.description)?;
            println!("updated {} {}", display_id(&spot.id), spot.title);
        }
        Commands::Rm(args) => {
            let (id, notices) = app.delete(&args.id).await?;
            println!("removed {}", display_id(&id));
            for notice in notices {
                eprintln!("warning: {}", notice);
            }
        }
        Commands::Images(args) => match args.command {
            ImagesSubcommands::Add(add) => {
                let report = app.add_images(&add.id, &add.files).await?;
                ui::print_upload_report(&report);
            }
            ImagesSubcommands::Rm(target) => {
                let spot = app.remove_image(&target.id, target.index)?;
                println!(
                    "removed image {} from {} ({} left)",
                    target.index,
                    display_id(&spot.id),
                    spot.images.len()
                );
            }
            ImagesSubcommands::Cover(target) => {
                let spot = app.set_cover(&target.id, target.index)?;
                println!("cover of {} is image {}", display_id(&spot.id), spot.cover_index);
            }
        },
        Commands::Describe(args) => {
            let spot = app.describe(&args.id).await?;
            println!("{}", spot.description);
        }
        Commands::Markers(args) => {
            let markers = app.markers(args.select.as_deref())?;
            if args.json {
                print_json(&markers);
            } else {
                if let Some(center) = app.map_center() {
                    println!("centered on {:.5}, {:.5}", center.lat, center.lng);
                }
                for line in app.marker_lines() {
                    println!("{}", line);
                }
            }
        }
        Commands::Click(args) => {
            match app.click(Position::new(args.lat, args.lng), args.yes)? {
                ClickOutcome::Selected(id) => println!("selected {}", display_id(&id)),
                ClickOutcome::Created(spot) => {
                    println!("created {} {}", display_id(&spot.id), spot.title)
                }
                ClickOutcome::Prompted(position) => println!(
                    "no spot here; create one at {:.5}, {:.5}? (re-run with --yes)",
                    position.lat, position.lng
                ),
            }
        }
        Commands::Status(args) => {
            let status = app.status().await;
            if args.json {
                print_json(&status);
            } else {
                ui::print_status(&status);
            }
        }
        Commands::Completions(args) => {
            completions::run_completions_command(args.shell.as_deref())?;
        }
    }
    Ok(())
}

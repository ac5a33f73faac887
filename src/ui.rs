use std::io::{self, IsTerminal};

use crate::app::StatusReport;
use crate::domain::Spot;
use crate::session::UploadReport;
use crate::spot_id::display_id;

pub fn print_spot_list(spots: &[Spot]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Spots"));

    if spots.is_empty() {
        println!("{}", palette.dim("no spots yet"));
        return;
    }

    for spot in spots {
        println!("{}", format_spot_row(spot, &palette));
    }
    println!("{}", palette.dim(&format!("{} spot(s)", spots.len())));
}

fn format_spot_row(spot: &Spot, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {}",
        palette.id(display_id(&spot.id)),
        palette.coords(&format_position(spot)),
        spot.title
    );
    if !spot.images.is_empty() {
        line.push(' ');
        line.push_str(&palette.dim(&format!("[{} photo(s)]", spot.images.len())));
    }
    line
}

pub fn print_spot_show(spot: &Spot) {
    let palette = Palette::auto();
    println!("{} {}", palette.id(&spot.id), palette.heading(&spot.title));
    println!("{} {}", palette.label("at"), format_position(spot));
    if !spot.description.is_empty() {
        println!("{} {}", palette.label("about"), spot.description);
    }
    for (index, image) in spot.images.iter().enumerate() {
        let marker = if index == spot.cover_index { "*" } else { " " };
        println!(
            "{} {} {} ({} bytes)",
            marker,
            palette.dim(&format!("#{index}")),
            image.media_type().unwrap_or("unknown"),
            image.as_str().len()
        );
    }
}

pub fn print_upload_report(report: &UploadReport) {
    let palette = Palette::auto();
    println!(
        "added {} photo(s) to {}",
        report.appended,
        palette.id(display_id(&report.spot_id))
    );
    for (label, err) in &report.failed {
        println!("{} {}: {}", palette.warn("skipped"), label, err);
    }
}

pub fn print_status(status: &StatusReport) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Status"));
    println!("{} {}", palette.label("data dir"), status.data_dir.display());
    let storage = if status.durable {
        status.db_path.display().to_string()
    } else {
        palette.warn("unavailable (changes are not saved)")
    };
    println!("{} {}", palette.label("database"), storage);
    println!(
        "{} {} (expected {})",
        palette.label("schema"),
        status.schema_version.as_deref().unwrap_or("-"),
        status.expected_schema_version
    );
    match status.stored_spot_count {
        Some(stored) => println!(
            "{} {} ({} stored)",
            palette.label("spots"),
            status.spot_count,
            stored
        ),
        None => println!("{} {}", palette.label("spots"), status.spot_count),
    }
    if let Some(import) = &status.legacy_import {
        println!(
            "{} {} spot(s) at {}",
            palette.label("legacy import"),
            import.count.as_deref().unwrap_or("?"),
            import.imported_at.as_deref().unwrap_or("?")
        );
    }
    if status.legacy_snapshot_present {
        println!("{}", palette.warn("legacy snapshot still present"));
    }
    let describe = if status.describe_configured {
        "configured"
    } else {
        "not configured"
    };
    println!("{} {}", palette.label("describe"), describe);
}

fn format_position(spot: &Spot) -> String {
    format!("{:.5}, {:.5}", spot.position.lat, spot.position.lng)
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn coords(&self, text: &str) -> String {
        self.paint("35", text)
    }

    fn label(&self, text: &str) -> String {
        self.paint("90", &format!("{text}:"))
    }

    fn warn(&self, text: &str) -> String {
        self.paint("33", text)
    }
}

use crate::domain::Position;

/// A map interaction, tagged with the element it originated from before it
/// reaches any handler.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MapClick(Position),
    MarkerClick(String),
}

/// Default hit radius in degrees, roughly a marker's footprint at street zoom.
pub const DEFAULT_HIT_RADIUS: f64 = 0.0005;

/// Classifies a click at `position` against the markers currently drawn.
/// The nearest marker within `radius` wins; otherwise it is a map click.
pub fn classify_click<'a, I>(position: Position, markers: I, radius: f64) -> InputEvent
where
    I: IntoIterator<Item = (&'a str, Position)>,
{
    let mut best: Option<(&str, f64)> = None;
    for (spot_id, marker) in markers {
        let distance = planar_distance(position, marker);
        if distance > radius {
            continue;
        }
        match best {
            Some((_, nearest)) if nearest <= distance => {}
            _ => best = Some((spot_id, distance)),
        }
    }
    match best {
        Some((spot_id, _)) => InputEvent::MarkerClick(spot_id.to_string()),
        None => InputEvent::MapClick(position),
    }
}

fn planar_distance(a: Position, b: Position) -> f64 {
    let mean_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let d_lat = a.lat - b.lat;
    let d_lng = (a.lng - b.lng) * mean_lat.cos();
    (d_lat * d_lat + d_lng * d_lng).sqrt()
}

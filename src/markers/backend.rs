use serde::Serialize;

use crate::domain::{EncodedImage, Position, Spot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPriority {
    Normal,
    Elevated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerVisual {
    Photo(EncodedImage),
    Placeholder,
}

impl MarkerVisual {
    pub fn for_spot(spot: &Spot) -> Self {
        match spot.cover_image() {
            Some(image) => MarkerVisual::Photo(image.clone()),
            None => MarkerVisual::Placeholder,
        }
    }
}

/// Everything a backend needs to draw a new marker. `spot_id` is the tag the
/// backend attaches to interactions so they come back as
/// [`crate::input::InputEvent::MarkerClick`].
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec<'a> {
    pub spot_id: &'a str,
    pub position: Position,
    pub visual: MarkerVisual,
    pub priority: MarkerPriority,
}

/// A live map surface that owns marker objects. Handles are opaque to the
/// reconciler and never point back into application state.
pub trait MarkerBackend {
    type Handle;

    fn create(&mut self, spec: MarkerSpec<'_>) -> Self::Handle;
    fn set_position(&mut self, handle: &mut Self::Handle, position: Position);
    fn set_visual(&mut self, handle: &mut Self::Handle, visual: MarkerVisual);
    fn set_priority(&mut self, handle: &mut Self::Handle, priority: MarkerPriority);
    fn destroy(&mut self, handle: Self::Handle);
    fn center_on(&mut self, position: Position);
}

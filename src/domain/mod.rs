pub mod spot;

pub use spot::{now_unix_millis, EncodedImage, Position, Spot, SpotPatch};

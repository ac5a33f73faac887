mod backend;
mod reconcile;
mod text_map;
#[cfg(test)]
mod tests;

pub use backend::MarkerBackend;
#[cfg(test)]
pub use backend::MarkerPriority;
pub use reconcile::{ReconcileReport, Reconciler};
pub use text_map::{RenderedMarker, TextMap};

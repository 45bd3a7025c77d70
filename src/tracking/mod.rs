mod associator;
mod crossing;

pub use associator::{Assignment, Track, TrackAssociator, TrackId};
pub use crossing::CrossingDetector;

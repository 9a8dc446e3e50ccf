pub mod playlist;

pub use playlist::{Channel, Playlist};

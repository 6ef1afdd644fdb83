// Jellyfin REST client — users, items, playlists, images, and the
// path → item-id library index built on top of them.

pub mod client;
pub mod library;
pub mod traits;

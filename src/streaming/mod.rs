//! Request-path responders: content interception, playlists, segments and
//! the client rewrite script.

pub mod interceptor;
pub mod playlist;
pub mod script;
pub mod segment;

pub use interceptor::{ContentQuery, HlsInterceptor, Interception};
pub use playlist::{read_playlist, SKELETON_PLAYLIST};
pub use script::{render_override_script, OVERRIDE_SCRIPT_ROUTE};
pub use segment::{open_segment, Segment};

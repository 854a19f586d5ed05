//! Playback observation hooks
//!
//! Front ends register a single observer at construction; every hook has a
//! default no-op so implementors only override what they care about. The
//! progress and chunk hooks run on the playback thread — keep them short or
//! the audio path degrades.

use std::any::Any;
use std::path::Path;
use std::time::Duration;

use crate::track::TrackRef;


/// Opaque per-track scratch data, created by the observer when a track
/// starts and dropped when it ends. The engine never looks inside.
pub type TrackContext = Box<dyn Any + Send>;


/// A progress notification payload.
#[derive( Debug, Clone )]
pub struct Progress {
    pub track: TrackRef,
    /// Position as a percentage of the track, 0..=100.
    pub percent: u8,
    /// Track duration in seconds, `None` for streams.
    pub duration: Option<u64>,
    /// Wall-clock time since the track started.
    pub elapsed: Duration,
}


/// Side-effect hooks invoked by the engine.
pub trait PlaybackObserver: Send + Sync {
    /// Called when a track starts; the returned context is threaded
    /// through the progress and chunk hooks of that track.
    fn on_track_start( &self, _track: &TrackRef ) -> TrackContext {
        Box::new( () )
    }

    /// Called at the configured progress interval while a track plays.
    fn on_progress( &self, _context: &mut TrackContext, _progress: &Progress ) {}

    /// Called after each chunk was written to the sink, for example to
    /// feed an analyzer.
    fn on_chunk_written( &self, _context: &mut TrackContext, _chunk: &[u8] ) {}

    /// Called when `set_volume` is invoked with notification enabled.
    fn on_volume_changed( &self, _level: u8 ) {}

    /// Called once per sleep-timer tick with the remaining time.
    fn on_sleep_remaining( &self, _remaining: Duration ) {}

    /// Called after `remove_current` relocated or deleted a file.
    fn on_track_removed( &self, _path: &Path ) {}
}


/// Observer that ignores everything.
pub struct NullObserver;


impl PlaybackObserver for NullObserver {}

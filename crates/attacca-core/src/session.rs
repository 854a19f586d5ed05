//! Playback session state
//!
//! The session is the single shared resource of the engine: queue, status,
//! volume and the one-shot transition slots, all guarded by one mutex. The
//! playback loop only takes the lock for short critical sections so that
//! commands never stall the audio path.

use std::sync::Arc;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use serde::{ Deserialize, Serialize };

use crate::track::TrackRef;


/// Current playback status.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize )]
pub enum Status {
    Stopped,
    Playing,
    Paused,
}


/// What to play.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub enum PlaySource {
    /// An explicit list of tracks.
    Tracks( Vec<TrackRef> ),
    /// Every playable file found under a directory, plus its `radios`
    /// sidecar if present.
    Directory( PathBuf ),
    /// A single file or stream.
    Single( TrackRef ),
    /// The configured library directory.
    Library,
}


/// Parameters of a `play` call, retained in the session so the last request
/// can be re-issued.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct PlayRequest {
    pub source: PlaySource,
    pub shuffle: bool,
    pub fade_in: bool,
}


impl PlayRequest {
    /// Plays an explicit list of tracks.
    pub fn tracks( tracks: Vec<TrackRef> ) -> Self {
        Self { source: PlaySource::Tracks( tracks ), shuffle: false, fade_in: false }
    }


    /// Plays a single file or stream.
    pub fn single( track: TrackRef ) -> Self {
        Self { source: PlaySource::Single( track ), shuffle: false, fade_in: false }
    }


    /// Plays everything under the given directory.
    pub fn directory( dir: impl Into<PathBuf> ) -> Self {
        Self { source: PlaySource::Directory( dir.into() ), shuffle: false, fade_in: false }
    }


    /// Plays the whole library directory.
    pub fn library() -> Self {
        Self::default()
    }


    /// Requests a shuffled queue.
    pub fn shuffled( mut self ) -> Self {
        self.shuffle = true;
        self
    }


    /// Requests a volume fade-in at playback start.
    pub fn with_fade_in( mut self ) -> Self {
        self.fade_in = true;
        self
    }
}


impl Default for PlayRequest {
    fn default() -> Self {
        Self { source: PlaySource::Library, shuffle: false, fade_in: false }
    }
}


/// Snapshot of the playing track's position, published by the playback loop
/// at every chunk boundary.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct PlaybackPosition {
    /// Position as a percentage of the track, 0..=100.
    pub percent: u8,
    /// Track duration in seconds, `None` for streams.
    pub duration: Option<u64>,
}


impl PlaybackPosition {
    /// Seconds left before the track's natural end, when the duration is
    /// known.
    pub fn remaining_secs( &self ) -> Option<u64> {
        let duration = self.duration?;
        Some( duration.saturating_sub( duration * u64::from( self.percent ) / 100 ) )
    }
}


/// Cancellation flag shared with worker threads and backends.
///
/// One token is created per playback episode and handed to the backends at
/// open time; cancelling it is how `stop` tells a backend to abandon a
/// blocking read. Fader and sleep-timer workers use their own tokens as
/// their run flag.
#[derive( Debug, Clone, Default )]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}


impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }


    /// Requests cancellation. Irreversible.
    pub fn cancel( &self ) {
        self.cancelled.store( true, Ordering::SeqCst );
    }


    /// Returns whether cancellation was requested.
    pub fn is_cancelled( &self ) -> bool {
        self.cancelled.load( Ordering::SeqCst )
    }
}


/// Sleeps for `total`, in short slices so that cancellation is observed
/// promptly. Returns false when the token was cancelled.
pub(crate) fn sliced_sleep( total: Duration, token: &CancelToken ) -> bool {
    const SLICE: Duration = Duration::from_millis( 25 );

    let mut remaining = total;
    while remaining > Duration::ZERO {
        if token.is_cancelled() {
            return false;
        }
        let nap = remaining.min( SLICE );
        thread::sleep( nap );
        remaining = remaining.saturating_sub( nap );
    }
    !token.is_cancelled()
}


/// The shared playback session. All fields are read and written under the
/// owning mutex in `PlayerInner`.
#[derive( Debug )]
pub(crate) struct Session {
    pub(crate) status: Status,
    pub(crate) queue: Vec<TrackRef>,
    pub(crate) play_index: usize,
    /// Last volume level applied to the mixer, 0..=100.
    pub(crate) volume: u8,
    /// Pending seek percentage, last write wins, consumed by the loop.
    pub(crate) pending_seek: Option<u8>,
    pub(crate) go_next: bool,
    pub(crate) go_prev: bool,
    pub(crate) last_play_args: Option<PlayRequest>,
    /// Track that was active at the last stop, re-inserted first on the
    /// next library play.
    pub(crate) stopped_track: Option<TrackRef>,
}


impl Session {
    pub(crate) fn new( volume: u8 ) -> Self {
        Self {
            status: Status::Stopped,
            queue: Vec::new(),
            play_index: 0,
            volume,
            pending_seek: None,
            go_next: false,
            go_prev: false,
            last_play_args: None,
            stopped_track: None,
        }
    }


    /// The current track while playing or paused.
    pub(crate) fn current( &self ) -> Option<&TrackRef> {
        match self.status {
            Status::Playing | Status::Paused => self.queue.get( self.play_index ),
            Status::Stopped => None,
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_cancel_token_round_trip() {
        let token = CancelToken::new();
        assert!( !token.is_cancelled() );
        token.cancel();
        assert!( token.is_cancelled() );
        assert!( token.clone().is_cancelled() );
    }


    #[test]
    fn test_sliced_sleep_honors_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        assert!( !sliced_sleep( Duration::from_secs( 60 ), &token ) );
    }


    #[test]
    fn test_remaining_secs() {
        let position = PlaybackPosition { percent: 75, duration: Some( 200 ) };
        assert_eq!( position.remaining_secs(), Some( 50 ) );

        let stream = PlaybackPosition { percent: 0, duration: None };
        assert_eq!( stream.remaining_secs(), None );
    }


    #[test]
    fn test_session_current_is_status_gated() {
        let mut session = Session::new( 50 );
        session.queue = vec![ TrackRef::from_location( "/music/a.mp3" ) ];
        assert_eq!( session.current(), None );

        session.status = Status::Playing;
        assert!( session.current().is_some() );

        session.play_index = 5;
        assert_eq!( session.current(), None );
    }
}

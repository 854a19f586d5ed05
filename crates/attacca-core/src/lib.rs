//! Attacca Core - playback orchestration engine
//!
//! Coordinates one dedicated playback thread against several control
//! threads: queue management, the play/pause/stop state machine, seeking,
//! volume control with timed fades, a sleep timer and library search.
//! Audio decoding and output are delegated to backends injected behind the
//! [`source`] and [`sink`] traits.

pub mod config;
pub mod library;
pub mod observer;
pub mod player;
pub mod session;
pub mod sink;
pub mod source;
pub mod track;

mod fade;
mod playback;
mod timer;

pub use config::{ FadeConfig, PlayerConfig, SleepTimerConfig };
pub use library::{ Library, LibraryError };
pub use observer::{ NullObserver, PlaybackObserver, Progress, TrackContext };
pub use player::{ Backend, Player, PlayerError, StopOptions };
pub use session::{ CancelToken, PlayRequest, PlaySource, PlaybackPosition, Status };
pub use sink::{ AudioSink, SinkConfig, SinkError, VolumeControl };
pub use source::{ OpenOptions, SourceError, SourceOpener, TrackSource };
pub use track::TrackRef;

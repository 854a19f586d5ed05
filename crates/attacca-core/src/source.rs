//! Track source contract
//!
//! The decode/resample backend is injected behind these traits; the engine
//! never decodes audio itself. A source is opened once per track and pulled
//! chunk by chunk until it reports end of stream.

use thiserror::Error;

use crate::session::CancelToken;
use crate::track::TrackRef;


/// Errors reported by a track source backend.
#[derive( Debug, Error )]
pub enum SourceError {
    #[error( "Failed to open source: {0}" )]
    Open( String ),

    #[error( "Read error: {0}" )]
    Read( String ),

    #[error( "Seek error: {0}" )]
    Seek( String ),

    #[error( "Source does not support seeking" )]
    Unseekable,
}


/// Options passed to [`SourceOpener::open`].
#[derive( Debug, Clone )]
pub struct OpenOptions {
    /// Downmix to mono.
    pub mono: bool,
    /// Preferred output sample rate.
    pub sample_rate: u32,
    /// Episode cancellation token. Once cancelled, any blocking read or
    /// open must return within a bounded time.
    pub cancel: CancelToken,
}


/// An opened, decodable track.
///
/// Frames are pulled, not pushed: the playback loop calls
/// [`read_frames`](TrackSource::read_frames) in a tight loop and a `None`
/// result ends the track normally. A finished source is not restartable;
/// the loop reopens the track instead.
pub trait TrackSource: Send {
    /// Reads up to `n_frames` frames of interleaved PCM data. Returns
    /// `Ok( None )` at end of stream. The final chunk may be shorter than
    /// requested.
    fn read_frames( &mut self, n_frames: usize ) -> Result<Option<Vec<u8>>, SourceError>;

    /// Seeks to a position given as a percentage of the duration.
    fn set_percentage_pos( &mut self, percent: u8 ) -> Result<(), SourceError>;

    /// Current position as a percentage of the duration.
    fn percentage_pos( &self ) -> u8;

    /// Duration in seconds, `None` when unknown (typically streams).
    fn duration( &self ) -> Option<u64>;

    /// Number of channels delivered by [`read_frames`](TrackSource::read_frames).
    fn channels( &self ) -> u16;

    /// Sample rate of the delivered frames.
    fn sample_rate( &self ) -> u32;

    /// Releases the backend resources. Idempotent.
    fn close( &mut self );
}


/// Factory for [`TrackSource`] instances, injected at player construction.
///
/// An open failure is recoverable: the playback loop logs it, skips to the
/// next track and gives up only after too many consecutive failures.
pub trait SourceOpener: Send + Sync {
    fn open(
        &self,
        track: &TrackRef,
        options: &OpenOptions,
    ) -> Result<Box<dyn TrackSource>, SourceError>;
}

//! Audio sink contract
//!
//! The output backend is injected behind these traits. The data path
//! (open/configure/write/close) is driven exclusively by the playback loop;
//! volume goes through a separate out-of-band mixer object, the way a
//! hardware mixer sits next to the PCM device.

use thiserror::Error;


/// Errors reported by the output backend.
#[derive( Debug, Error )]
pub enum SinkError {
    #[error( "Failed to open sink: {0}" )]
    Open( String ),

    #[error( "Failed to configure sink: {0}" )]
    Configure( String ),

    #[error( "Write error: {0}" )]
    Write( String ),

    #[error( "Volume error: {0}" )]
    Volume( String ),
}


/// Per-track output configuration.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct SinkConfig {
    pub channels: u16,
    pub sample_rate: u32,
    /// Number of frames written per chunk.
    pub chunk_frames: usize,
}


/// PCM data path of the output backend.
pub trait AudioSink: Send {
    /// Opens the output device for one playback episode. The token is the
    /// episode's cancellation flag; once cancelled, a blocking write must
    /// return within a bounded time.
    fn open( &mut self, cancel: &crate::session::CancelToken ) -> Result<(), SinkError>;

    /// Applies a track's output configuration. The engine only calls this
    /// when the configuration differs from the previous track's, so
    /// redundant driver round-trips are already avoided upstream.
    fn configure( &mut self, config: &SinkConfig ) -> Result<(), SinkError>;

    /// Writes one chunk of interleaved PCM data.
    fn write( &mut self, chunk: &[u8] ) -> Result<(), SinkError>;

    /// Forwards the pause state. Backends that delegate transport to an
    /// external process can forward the toggle; the default does nothing.
    fn set_paused( &mut self, _paused: bool ) {}

    /// Closes the output device. Idempotent.
    fn close( &mut self );
}


/// Out-of-band volume path, usually a distinct mixer object from the data
/// sink.
pub trait VolumeControl: Send + Sync {
    /// Applies a volume level, 0..=100.
    fn set_volume( &self, level: u8 ) -> Result<(), SinkError>;
}

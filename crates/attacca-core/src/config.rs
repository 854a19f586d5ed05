//! Engine configuration
//!
//! All tunables live here so a front end can persist and restore them.

use std::path::PathBuf;
use std::time::Duration;

use serde::{ Deserialize, Serialize };


/// Player configuration, injected at construction.
#[derive( Debug, Clone, Serialize, Deserialize )]
pub struct PlayerConfig {
    /// Root directory of the music library.
    pub audio_dir: PathBuf,
    /// Where `remove_current` relocates files when backing up.
    pub backup_dir: PathBuf,
    /// Volume applied when the player is created, 0..=100.
    pub initial_volume: u8,
    /// Downmix to mono, forwarded to the source backend.
    pub mono: bool,
    /// Preferred sample rate, forwarded to the source backend.
    pub sample_rate: u32,
    /// Number of frames read from the source and written to the sink per
    /// loop iteration.
    pub chunk_frames: usize,
    /// Interval between two progress notifications.
    pub progress_interval: Duration,
    /// Pause between retries after a track failed to open.
    pub open_retry_backoff: Duration,
    pub fade: FadeConfig,
    /// Sleep timer armed at each play; `None` disables it.
    pub sleep_timer: Option<SleepTimerConfig>,
}


impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::new(),
            backup_dir: PathBuf::new(),
            initial_volume: 50,
            mono: false,
            sample_rate: 44100,
            chunk_frames: 4096,
            progress_interval: Duration::from_secs( 5 ),
            open_retry_backoff: Duration::from_millis( 500 ),
            fade: FadeConfig::default(),
            sleep_timer: Some( SleepTimerConfig::default() ),
        }
    }
}


impl PlayerConfig {
    /// Configuration rooted at the given library directory, with the
    /// backup directory placed next to it.
    pub fn with_audio_dir( audio_dir: impl Into<PathBuf> ) -> Self {
        let audio_dir = audio_dir.into();
        let backup_dir = audio_dir
            .parent()
            .map( |parent| parent.join( "removed" ) )
            .unwrap_or_else( || PathBuf::from( "removed" ) );
        Self { audio_dir, backup_dir, ..Self::default() }
    }
}


/// Volume fade tuning.
#[derive( Debug, Clone, Serialize, Deserialize )]
pub struct FadeConfig {
    /// Volume change per step.
    pub step: u8,
    /// Level a fade-in ramps toward.
    pub ceiling: u8,
    /// Pause between fade-in steps.
    pub fade_in_interval: Duration,
    /// Pause between fade-out steps.
    pub fade_out_interval: Duration,
}


impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            step: 4,
            ceiling: 85,
            fade_in_interval: Duration::from_millis( 3500 ),
            fade_out_interval: Duration::from_millis( 500 ),
        }
    }
}


/// Sleep timer tuning.
#[derive( Debug, Clone, Serialize, Deserialize )]
pub struct SleepTimerConfig {
    /// Total countdown duration.
    pub total: Duration,
    /// Tick length; remaining time is notified and, near the end, volume
    /// ducked once per tick.
    pub tick: Duration,
    /// On expiry, wait for the current track's natural end before
    /// triggering the faded stop.
    pub wait_for_track_end: bool,
}


impl Default for SleepTimerConfig {
    fn default() -> Self {
        Self {
            total: Duration::from_secs( 3600 ),
            tick: Duration::from_secs( 60 ),
            wait_for_track_end: false,
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!( config.initial_volume, 50 );
        assert_eq!( config.chunk_frames, 4096 );
        assert_eq!( config.fade.ceiling, 85 );
        assert_eq!( config.fade.step, 4 );

        let timer = config.sleep_timer.expect( "sleep timer armed by default" );
        assert_eq!( timer.total, Duration::from_secs( 3600 ) );
        assert_eq!( timer.tick, Duration::from_secs( 60 ) );
    }


    #[test]
    fn test_with_audio_dir_places_backup_next_to_library() {
        let config = PlayerConfig::with_audio_dir( "/data/music" );
        assert_eq!( config.audio_dir, PathBuf::from( "/data/music" ) );
        assert_eq!( config.backup_dir, PathBuf::from( "/data/removed" ) );
    }
}

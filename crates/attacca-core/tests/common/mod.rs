//! Shared test helpers: a scriptable simulated backend that records every
//! interaction, plus player fixtures with compressed timings.

#![allow( dead_code )]

use std::path::{ Path, PathBuf };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::{ Duration, Instant };

use attacca_core::{
    AudioSink, Backend, CancelToken, FadeConfig, OpenOptions, PlaybackObserver, Player,
    PlayerConfig, Progress, SinkConfig, SinkError, SourceError, SourceOpener, TrackContext,
    TrackRef, TrackSource, VolumeControl,
};


/// Everything the simulated backend observed.
#[derive( Default )]
pub struct BackendLog {
    pub opened: Mutex<Vec<TrackRef>>,
    pub seeks: Mutex<Vec<u8>>,
    pub volumes: Mutex<Vec<u8>>,
    pub configs: Mutex<Vec<SinkConfig>>,
    pub pauses: Mutex<Vec<bool>>,
    pub sink_opens: AtomicUsize,
    pub sink_closes: AtomicUsize,
    pub writes: AtomicUsize,
}


impl BackendLog {
    pub fn opened_tracks( &self ) -> Vec<TrackRef> {
        self.opened.lock().unwrap().clone()
    }


    pub fn recorded_seeks( &self ) -> Vec<u8> {
        self.seeks.lock().unwrap().clone()
    }


    pub fn recorded_volumes( &self ) -> Vec<u8> {
        self.volumes.lock().unwrap().clone()
    }


    pub fn write_count( &self ) -> usize {
        self.writes.load( Ordering::SeqCst )
    }
}


/// Opener handing out [`SimSource`] instances, optionally failing the
/// first `fail_opens` attempts.
pub struct SimOpener {
    log: Arc<BackendLog>,
    chunks_per_track: usize,
    read_delay: Duration,
    fail_opens: usize,
    attempts: AtomicUsize,
}


impl SimOpener {
    pub fn new( log: Arc<BackendLog>, chunks_per_track: usize, read_delay: Duration ) -> Self {
        Self {
            log,
            chunks_per_track,
            read_delay,
            fail_opens: 0,
            attempts: AtomicUsize::new( 0 ),
        }
    }


    pub fn failing( mut self, fail_opens: usize ) -> Self {
        self.fail_opens = fail_opens;
        self
    }
}


impl SourceOpener for SimOpener {
    fn open(
        &self,
        track: &TrackRef,
        options: &OpenOptions,
    ) -> Result<Box<dyn TrackSource>, SourceError> {
        let attempt = self.attempts.fetch_add( 1, Ordering::SeqCst );
        if attempt < self.fail_opens {
            return Err( SourceError::Open( "simulated open failure".into() ) );
        }
        self.log.opened.lock().unwrap().push( track.clone() );
        Ok( Box::new( SimSource {
            log: Arc::clone( &self.log ),
            total: self.chunks_per_track,
            remaining: self.chunks_per_track,
            read_delay: self.read_delay,
            cancel: options.cancel.clone(),
            stream: track.is_stream(),
        }))
    }
}


/// Source delivering a fixed number of silent chunks, one per
/// `read_delay`. One chunk counts as one second of audio.
pub struct SimSource {
    log: Arc<BackendLog>,
    total: usize,
    remaining: usize,
    read_delay: Duration,
    cancel: CancelToken,
    stream: bool,
}


impl TrackSource for SimSource {
    fn read_frames( &mut self, n_frames: usize ) -> Result<Option<Vec<u8>>, SourceError> {
        if self.cancel.is_cancelled() || self.remaining == 0 {
            return Ok( None );
        }
        std::thread::sleep( self.read_delay );
        self.remaining -= 1;
        Ok( Some( vec![ 0u8; n_frames * 4 ] ) )
    }


    fn set_percentage_pos( &mut self, percent: u8 ) -> Result<(), SourceError> {
        if self.stream {
            return Err( SourceError::Unseekable );
        }
        self.log.seeks.lock().unwrap().push( percent );
        Ok(())
    }


    fn percentage_pos( &self ) -> u8 {
        ( 100 * ( self.total - self.remaining ) / self.total.max( 1 ) ) as u8
    }


    fn duration( &self ) -> Option<u64> {
        if self.stream { None } else { Some( self.total as u64 ) }
    }


    fn channels( &self ) -> u16 {
        2
    }


    fn sample_rate( &self ) -> u32 {
        44100
    }


    fn close( &mut self ) {}
}


pub struct SimSink {
    log: Arc<BackendLog>,
}


impl AudioSink for SimSink {
    fn open( &mut self, _cancel: &CancelToken ) -> Result<(), SinkError> {
        self.log.sink_opens.fetch_add( 1, Ordering::SeqCst );
        Ok(())
    }


    fn configure( &mut self, config: &SinkConfig ) -> Result<(), SinkError> {
        self.log.configs.lock().unwrap().push( config.clone() );
        Ok(())
    }


    fn write( &mut self, _chunk: &[u8] ) -> Result<(), SinkError> {
        self.log.writes.fetch_add( 1, Ordering::SeqCst );
        Ok(())
    }


    fn set_paused( &mut self, paused: bool ) {
        self.log.pauses.lock().unwrap().push( paused );
    }


    fn close( &mut self ) {
        self.log.sink_closes.fetch_add( 1, Ordering::SeqCst );
    }
}


pub struct SimMixer {
    log: Arc<BackendLog>,
}


impl VolumeControl for SimMixer {
    fn set_volume( &self, level: u8 ) -> Result<(), SinkError> {
        self.log.volumes.lock().unwrap().push( level );
        Ok(())
    }
}


/// Observer recording every notification for assertions.
#[derive( Default )]
pub struct RecordingObserver {
    pub progress: Mutex<Vec<Progress>>,
    pub volume_changes: Mutex<Vec<u8>>,
    pub sleep_remaining: Mutex<Vec<Duration>>,
    pub removed: Mutex<Vec<PathBuf>>,
}


impl PlaybackObserver for RecordingObserver {
    fn on_progress( &self, _context: &mut TrackContext, progress: &Progress ) {
        self.progress.lock().unwrap().push( progress.clone() );
    }


    fn on_volume_changed( &self, level: u8 ) {
        self.volume_changes.lock().unwrap().push( level );
    }


    fn on_sleep_remaining( &self, remaining: Duration ) {
        self.sleep_remaining.lock().unwrap().push( remaining );
    }


    fn on_track_removed( &self, path: &Path ) {
        self.removed.lock().unwrap().push( path.to_path_buf() );
    }
}


pub fn sim_backend( log: &Arc<BackendLog>, chunks_per_track: usize ) -> Backend {
    sim_backend_with(
        log,
        SimOpener::new( Arc::clone( log ), chunks_per_track, Duration::from_millis( 2 ) ),
    )
}


pub fn sim_backend_with( log: &Arc<BackendLog>, opener: SimOpener ) -> Backend {
    Backend {
        opener: Box::new( opener ),
        sink: Box::new( SimSink { log: Arc::clone( log ) } ),
        mixer: Box::new( SimMixer { log: Arc::clone( log ) } ),
    }
}


/// Config with timings compressed to test scale.
pub fn test_config( audio_dir: PathBuf, backup_dir: PathBuf ) -> PlayerConfig {
    PlayerConfig {
        audio_dir,
        backup_dir,
        initial_volume: 50,
        mono: false,
        sample_rate: 44100,
        chunk_frames: 64,
        progress_interval: Duration::from_millis( 40 ),
        open_retry_backoff: Duration::from_millis( 1 ),
        fade: FadeConfig {
            step: 10,
            ceiling: 80,
            fade_in_interval: Duration::from_millis( 10 ),
            fade_out_interval: Duration::from_millis( 10 ),
        },
        sleep_timer: None,
    }
}


pub struct Fixture {
    pub log: Arc<BackendLog>,
    pub player: Player,
    pub audio_dir: PathBuf,
    pub backup_dir: PathBuf,
    _dir: tempfile::TempDir,
}


pub fn fixture( chunks_per_track: usize ) -> Fixture {
    fixture_with( chunks_per_track, |_| {} )
}


pub fn fixture_with( chunks_per_track: usize, tweak: impl FnOnce( &mut PlayerConfig ) ) -> Fixture {
    build_fixture( chunks_per_track, 0, None, tweak )
}


pub fn observed_fixture(
    chunks_per_track: usize,
    observer: Arc<RecordingObserver>,
    tweak: impl FnOnce( &mut PlayerConfig ),
) -> Fixture {
    build_fixture( chunks_per_track, 0, Some( observer ), tweak )
}


pub fn failing_fixture( fail_opens: usize, chunks_per_track: usize ) -> Fixture {
    build_fixture( chunks_per_track, fail_opens, None, |_| {} )
}


fn build_fixture(
    chunks_per_track: usize,
    fail_opens: usize,
    observer: Option<Arc<RecordingObserver>>,
    tweak: impl FnOnce( &mut PlayerConfig ),
) -> Fixture {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let audio_dir = dir.path().join( "music" );
    let backup_dir = dir.path().join( "removed" );
    std::fs::create_dir_all( &audio_dir ).unwrap();

    let mut config = test_config( audio_dir.clone(), backup_dir.clone() );
    tweak( &mut config );

    let log = Arc::new( BackendLog::default() );
    let opener = SimOpener::new( Arc::clone( &log ), chunks_per_track, Duration::from_millis( 2 ) )
        .failing( fail_opens );
    let backend = sim_backend_with( &log, opener );

    let player = match observer {
        Some( observer ) => Player::with_observer( config, backend, observer ).unwrap(),
        None => Player::new( config, backend ).unwrap(),
    };

    Fixture { log, player, audio_dir, backup_dir, _dir: dir }
}


/// Polls a predicate until it holds or the timeout elapses.
pub fn wait_until( timeout: Duration, mut predicate: impl FnMut() -> bool ) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep( Duration::from_millis( 5 ) );
    }
    predicate()
}


pub fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}


pub fn file_track( name: &str ) -> TrackRef {
    TrackRef::File( PathBuf::from( "/music" ).join( name ) )
}

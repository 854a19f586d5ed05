//! Core player implementation
//!
//! The Player owns the playback session and orchestrates the worker
//! threads: the playback loop, the volume fader and the sleep timer.
//!
//! Locking discipline: the `commands` guard serializes the compound
//! handlers (`play`, `stop`, `play_pause`, `remove_current`,
//! `search_and_play`); internal cross-calls go through the `*_inner`
//! functions, which assume the guard is held. Leaf commands (`seek`,
//! `set_volume`, `play_next`, `play_prev`) only take the session lock so
//! the fader and timer threads can call them freely. Worker joins happen
//! while holding the commands guard but never the session or workers lock,
//! and worker threads never take the commands guard themselves — when one
//! needs a stop it spawns a one-shot helper gated on its cancellation
//! token.

use std::fs;
use std::path::Path;
use std::sync::{ Arc, Mutex, Weak };
use std::thread;
use std::time::Instant;

use rand::seq::SliceRandom;
use thiserror::Error;

use crate::config::PlayerConfig;
use crate::fade::{ self, FadeDirection, Fader };
use crate::library::{ self, Library };
use crate::observer::{ NullObserver, PlaybackObserver };
use crate::playback;
use crate::session::{ CancelToken, PlayRequest, PlaySource, PlaybackPosition, Session, Status };
use crate::sink::{ AudioSink, SinkError, VolumeControl };
use crate::source::SourceOpener;
use crate::timer::{ self, SleepTimer };
use crate::track::TrackRef;


/// Errors surfaced by player commands. Expected failure cases (stopped
/// state restrictions, empty results) are logged and reported through the
/// boolean return values instead.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( "Sink error: {0}" )]
    Sink( #[from] SinkError ),

    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),
}


/// The injected backend pair plus its mixer.
pub struct Backend {
    pub opener: Box<dyn SourceOpener>,
    pub sink: Box<dyn AudioSink>,
    pub mixer: Box<dyn VolumeControl>,
}


/// Options of a stop request.
#[derive( Debug, Clone, Copy )]
pub struct StopOptions {
    /// Remember the current track so the next library play resumes it.
    pub save_current: bool,
    /// Ramp the volume down first and stop when the fade completes.
    pub fade_out: bool,
}


impl Default for StopOptions {
    fn default() -> Self {
        Self { save_current: true, fade_out: false }
    }
}


/// Worker handles, at most one live instance of each kind.
#[derive( Default )]
pub(crate) struct Workers {
    pub(crate) play: Option<( thread::JoinHandle<()>, CancelToken )>,
    pub(crate) fader: Option<Fader>,
    pub(crate) timer: Option<SleepTimer>,
}


/// Shared state behind the public [`Player`] handle.
pub(crate) struct PlayerInner {
    pub(crate) config: PlayerConfig,
    pub(crate) session: Mutex<Session>,
    pub(crate) workers: Mutex<Workers>,
    pub(crate) commands: Mutex<()>,
    pub(crate) opener: Box<dyn SourceOpener>,
    pub(crate) sink: Mutex<Box<dyn AudioSink>>,
    pub(crate) mixer: Box<dyn VolumeControl>,
    pub(crate) observer: Arc<dyn PlaybackObserver>,
    pub(crate) library: Library,
    /// Position snapshot of the playing track, published by the loop.
    pub(crate) position: Mutex<Option<PlaybackPosition>>,
    /// Self-handle for spawning worker threads.
    this: Weak<PlayerInner>,
}


impl PlayerInner {
    /// Strong self-handle. Every caller reaches this through a live Arc,
    /// so the upgrade holds.
    pub(crate) fn arc( &self ) -> Arc<PlayerInner> {
        self.this.upgrade().expect( "player state dropped" )
    }


    pub(crate) fn status( &self ) -> Status {
        self.session.lock().unwrap().status
    }


    pub(crate) fn volume( &self ) -> u8 {
        self.session.lock().unwrap().volume
    }


    /// Starts playing the resolved queue. Assumes the commands guard.
    pub(crate) fn play_inner( &self, request: PlayRequest ) -> bool {
        if self.status() != Status::Stopped {
            self.stop_inner( StopOptions::default() );
        }

        // remember the request so it can be re-issued later
        self.session.lock().unwrap().last_play_args = Some( request.clone() );

        let mut queue = match &request.source {
            PlaySource::Tracks( tracks ) => tracks.clone(),
            PlaySource::Single( track ) => vec![ track.clone() ],
            PlaySource::Directory( dir ) => self.resolve_directory( dir ),
            PlaySource::Library => self.resolve_directory( &self.config.audio_dir ),
        };

        if queue.is_empty() {
            tracing::error!( "Empty queue, nothing to play" );
            return false;
        }

        if request.shuffle {
            queue.shuffle( &mut rand::thread_rng() );
        }

        if matches!( request.source, PlaySource::Directory( _ ) | PlaySource::Library ) {
            // try to resume the last stopped track first
            let stopped = self.session.lock().unwrap().stopped_track.clone();
            if let Some( track ) = stopped {
                let exists = track.as_path().map( Path::is_file ).unwrap_or( false );
                if exists {
                    queue.insert( 0, track );
                } else {
                    tracing::warn!(
                        "Not re-inserting vanished last track {} at the front of the queue",
                        track
                    );
                }
            }
        }

        let cancel = CancelToken::new();
        {
            let mut session = self.session.lock().unwrap();
            session.queue = queue;
            session.play_index = 0;
            session.status = Status::Playing;
            session.pending_seek = None;
            session.go_next = false;
            session.go_prev = false;
        }

        let worker = self.arc();
        let worker_cancel = cancel.clone();
        let fade_in = request.fade_in;
        let handle = thread::spawn( move || playback::run_queue( worker, fade_in, worker_cancel ) );

        let old_timer = {
            let mut workers = self.workers.lock().unwrap();
            workers.play = Some(( handle, cancel ));
            workers.timer.take()
        };
        if let Some( timer ) = old_timer {
            timer.cancel_and_join();
        }
        let timer = timer::arm( self );
        self.workers.lock().unwrap().timer = timer;

        true
    }


    /// Resolves a directory into a queue: playable files plus the `radios`
    /// sidecar.
    fn resolve_directory( &self, dir: &Path ) -> Vec<TrackRef> {
        let mut queue: Vec<TrackRef> = match library::scan_dir( dir ) {
            Ok( files ) => files.into_iter().map( TrackRef::File ).collect(),
            Err( e ) => {
                tracing::error!( "Failed to scan {:?}: {}", dir, e );
                Vec::new()
            }
        };
        queue.extend( library::read_radios_sidecar( dir ) );
        queue
    }


    /// Stops playback. Assumes the commands guard.
    pub(crate) fn stop_inner( &self, options: StopOptions ) {
        tracing::debug!( "Stop" );

        let fader = { self.workers.lock().unwrap().fader.take() };
        let mut degrade = false;
        let mut restore = None;
        if let Some( fader ) = fader {
            if fader.direction == FadeDirection::Out {
                restore = Some( fader.prefade );
                if options.fade_out {
                    tracing::warn!( "Fade-out already in progress, stopping immediately" );
                    degrade = true;
                }
            }
            fader.cancel_and_join();
        }

        if options.fade_out && !degrade {
            if self.status() == Status::Stopped {
                return;
            }
            // the actual halt happens asynchronously when the fade
            // completes
            let fader = fade::start_fade_out( self, options.save_current );
            self.workers.lock().unwrap().fader = Some( fader );
            return;
        }

        self.stop_immediate( options.save_current );
        if let Some( level ) = restore {
            if let Err( e ) = self.set_volume( level, true ) {
                tracing::warn!( "Could not restore pre-fade volume: {}", e );
            }
        }
    }


    fn stop_immediate( &self, save_current: bool ) {
        let was_active = {
            let mut session = self.session.lock().unwrap();
            let was_active = session.status != Status::Stopped;
            if was_active {
                session.stopped_track =
                    if save_current { session.current().cloned() } else { None };
                session.status = Status::Stopped;
            }
            session.pending_seek = None;
            session.go_next = false;
            session.go_prev = false;
            was_active
        };

        let ( play, timer ) = {
            let mut workers = self.workers.lock().unwrap();
            ( workers.play.take(), workers.timer.take() )
        };
        if let Some( timer ) = timer {
            timer.cancel_and_join();
        }
        if let Some(( handle, cancel )) = play {
            // cancelling the episode token tells a backend stuck in a
            // blocking read to give up; the join happens outside the
            // session lock, which the loop still needs on its way out
            cancel.cancel();
            if handle.join().is_err() {
                tracing::error!( "Playback thread panicked" );
            }
        }
        *self.position.lock().unwrap() = None;

        if was_active {
            tracing::info!( "Stopped" );
        }
    }


    /// Spawns a one-shot helper performing a stop, gated on the given
    /// token. Used wherever a worker thread needs a stop it must not
    /// issue itself: the playback loop's failure cap, fade-out completion
    /// and sleep-timer expiry.
    pub(crate) fn deferred_stop( &self, gate: CancelToken, options: StopOptions ) {
        let inner = self.arc();
        thread::spawn( move || {
            let _commands = inner.commands.lock().unwrap();
            if gate.is_cancelled() {
                return;
            }
            inner.stop_inner( options );
        });
    }


    /// Toggles play/pause; re-issues the last play request when stopped.
    /// Assumes the commands guard.
    pub(crate) fn play_pause_inner( &self ) {
        tracing::debug!( "Play or pause" );
        if self.status() == Status::Stopped {
            let request = self
                .session
                .lock()
                .unwrap()
                .last_play_args
                .clone()
                .unwrap_or_else( || PlayRequest::library().shuffled() );
            self.play_inner( request );
            return;
        }

        let paused = {
            let mut session = self.session.lock().unwrap();
            session.status = match session.status {
                Status::Playing => Status::Paused,
                _ => Status::Playing,
            };
            session.status == Status::Paused
        };
        self.sink.lock().unwrap().set_paused( paused );
        tracing::info!( "{}", if paused { "Paused" } else { "Resumed" } );
    }


    pub(crate) fn play_next( &self ) -> bool {
        let mut session = self.session.lock().unwrap();
        self.play_next_locked( &mut session )
    }


    /// `play_next` body for callers already holding the session lock.
    pub(crate) fn play_next_locked( &self, session: &mut Session ) -> bool {
        if session.status == Status::Stopped {
            tracing::error!( "Cannot play next track: player is stopped" );
            return false;
        }
        session.play_index += 1;
        session.go_next = true;
        true
    }


    pub(crate) fn play_prev( &self ) -> bool {
        let mut session = self.session.lock().unwrap();
        if session.status == Status::Stopped {
            tracing::error!( "Cannot play previous track: player is stopped" );
            return false;
        }
        if session.queue.is_empty() {
            return false;
        }
        session.play_index = if session.play_index == 0 {
            session.queue.len() - 1
        } else {
            session.play_index - 1
        };
        session.go_prev = true;
        true
    }


    pub(crate) fn seek( &self, percent: u8 ) -> bool {
        let percent = percent.min( 100 );
        let mut session = self.session.lock().unwrap();
        if session.status == Status::Stopped {
            tracing::error!( "Cannot seek: player is stopped" );
            return false;
        }
        match session.current().map( TrackRef::is_stream ) {
            Some( true ) => {
                tracing::error!( "Cannot seek in a stream" );
                false
            }
            Some( false ) => {
                // last write wins, the loop applies it at the next chunk
                session.pending_seek = Some( percent );
                true
            }
            None => {
                tracing::error!( "Cannot seek: no current track" );
                false
            }
        }
    }


    pub(crate) fn set_volume( &self, level: u8, notify: bool ) -> Result<(), PlayerError> {
        let level = level.min( 100 );
        {
            // the mixer write and the session update stay paired under
            // the lock
            let mut session = self.session.lock().unwrap();
            self.mixer.set_volume( level )?;
            session.volume = level;
        }
        if notify {
            self.observer.on_volume_changed( level );
        }
        Ok(())
    }


    /// Zeroes the volume and starts the fade-in worker. Called by the
    /// playback loop when the play request asked for a fade-in.
    pub(crate) fn start_volume_fade_in( &self ) {
        if let Err( e ) = self.set_volume( 0, true ) {
            tracing::warn!( "Could not zero the volume for fade-in: {}", e );
        }
        let fader = fade::start_fade_in( self );
        let old = {
            let mut workers = self.workers.lock().unwrap();
            workers.fader.replace( fader )
        };
        // normally the previous fader was already cancelled by the last
        // stop or play
        if let Some( old ) = old {
            old.cancel_and_join();
        }
    }


    /// Removes the current track from disk and from the queue. Assumes
    /// the commands guard.
    pub(crate) fn remove_current_inner( &self, backup: bool ) -> Result<bool, PlayerError> {
        let ( removed, empty ) = {
            let mut session = self.session.lock().unwrap();
            let current = match session.current() {
                Some( track ) => track.clone(),
                None => {
                    tracing::error!( "Cannot remove: nothing is playing" );
                    return Ok( false );
                }
            };
            let path = match current.as_path() {
                Some( path ) if path.is_file() => path.to_path_buf(),
                _ => {
                    tracing::error!( "Cannot remove {} which is not a regular file", current );
                    return Ok( false );
                }
            };

            // the queue is only touched once the file operation succeeded
            if backup {
                self.backup_file( &path )?;
            } else {
                fs::remove_file( &path )?;
            }
            tracing::info!( "Removed {}", path.display() );

            let index = session.play_index;
            session.queue.remove( index );
            let empty = session.queue.is_empty();
            if !empty {
                // step back so the next-track signal lands on the entry
                // that followed the removed one; removing index 0 leans
                // on the loop's wrap-to-zero guard
                session.play_index =
                    if index == 0 { session.queue.len() - 1 } else { index - 1 };
                self.play_next_locked( &mut session );
            }
            ( path, empty )
        };

        if empty {
            tracing::info!( "No more tracks in the queue" );
            self.stop_inner( StopOptions::default() );
        }
        self.observer.on_track_removed( &removed );
        Ok( true )
    }


    /// Relocates a file under the backup root, preserving its path
    /// relative to the library root.
    fn backup_file( &self, path: &Path ) -> Result<(), PlayerError> {
        let relative = match path.strip_prefix( self.library.audio_dir() ) {
            Ok( relative ) => relative,
            Err( _ ) => Path::new( path.file_name().unwrap_or( path.as_os_str() ) ),
        };
        let target = self.config.backup_dir.join( relative );
        if let Some( parent ) = target.parent() {
            fs::create_dir_all( parent )?;
        }
        if fs::rename( path, &target ).is_err() {
            // renames fail across filesystems, fall back to copy + remove
            fs::copy( path, &target )?;
            fs::remove_file( path )?;
        }
        tracing::info!( "Moved {} to {}", path.display(), target.display() );
        Ok(())
    }


    /// Searches the library and plays the results. Assumes the commands
    /// guard.
    pub(crate) fn search_and_play_inner( &self, pattern: &str, shuffle: bool ) -> bool {
        tracing::info!( "Searching tracks: {:?}", pattern );
        let started = Instant::now();

        let results = match self.library.search( pattern ) {
            Ok( results ) => results,
            Err( e ) => {
                tracing::error!( "Search for {:?} failed: {}", pattern, e );
                return false;
            }
        };
        tracing::info!( "Found {} results in {:?}", results.len(), started.elapsed() );

        if results.is_empty() {
            tracing::warn!( "No results for pattern {:?}, not playing", pattern );
            return false;
        }

        // playing the most recent files shuffled would defeat the query
        let shuffle = shuffle && !pattern.starts_with( "#recent" );
        self.play_inner( PlayRequest {
            source: PlaySource::Tracks( results ),
            shuffle,
            fade_in: false,
        })
    }
}


/// The playback engine.
///
/// Single-owner handle: dropping it shuts the engine down. Backends are
/// injected at construction and the observer receives the side-effect
/// notifications.
pub struct Player {
    inner: Arc<PlayerInner>,
}


impl Player {
    /// Creates a player with the default (silent) observer. The initial
    /// volume is applied to the mixer right away.
    pub fn new( config: PlayerConfig, backend: Backend ) -> Result<Self, PlayerError> {
        Self::with_observer( config, backend, Arc::new( NullObserver ) )
    }


    /// Creates a player with the given observer.
    pub fn with_observer(
        config: PlayerConfig,
        backend: Backend,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Result<Self, PlayerError> {
        let library = Library::new( config.audio_dir.clone() );
        let initial_volume = config.initial_volume.min( 100 );
        let inner = Arc::new_cyclic( |this| PlayerInner {
            session: Mutex::new( Session::new( initial_volume ) ),
            workers: Mutex::new( Workers::default() ),
            commands: Mutex::new(()),
            opener: backend.opener,
            sink: Mutex::new( backend.sink ),
            mixer: backend.mixer,
            observer,
            library,
            position: Mutex::new( None ),
            this: this.clone(),
            config,
        });
        inner.set_volume( initial_volume, false )?;
        Ok( Self { inner } )
    }


    /// Plays a new queue, stopping the current one first if needed.
    /// Returns false when the request resolves to nothing playable.
    pub fn play( &self, request: PlayRequest ) -> bool {
        let _commands = self.inner.commands.lock().unwrap();
        self.inner.play_inner( request )
    }


    /// Stops playback immediately, remembering the current track.
    pub fn stop( &self ) {
        self.stop_with( StopOptions::default() );
    }


    /// Stops playback with explicit options. With `fade_out` the call
    /// returns early and the actual halt happens when the fade completes.
    pub fn stop_with( &self, options: StopOptions ) {
        let _commands = self.inner.commands.lock().unwrap();
        self.inner.stop_inner( options );
    }


    /// Toggles between playing and paused; when stopped, re-issues the
    /// last play request (or plays the library shuffled).
    pub fn play_pause( &self ) {
        let _commands = self.inner.commands.lock().unwrap();
        self.inner.play_pause_inner();
    }


    /// Skips to the next track. Returns false when stopped.
    pub fn play_next( &self ) -> bool {
        self.inner.play_next()
    }


    /// Goes back to the previous track, wrapping around the queue.
    /// Returns false when stopped.
    pub fn play_prev( &self ) -> bool {
        self.inner.play_prev()
    }


    /// Requests a seek to a percentage of the current track, clamped to
    /// 0..=100. Repeated calls before the loop applies the seek overwrite
    /// each other. Returns false when stopped or on a stream.
    pub fn seek( &self, percent: u8 ) -> bool {
        self.inner.seek( percent )
    }


    /// Applies a volume level (clamped to 0..=100) to the mixer and
    /// records it in the session.
    pub fn set_volume( &self, level: u8, notify: bool ) -> Result<(), PlayerError> {
        self.inner.set_volume( level, notify )
    }


    /// Removes the current track, moving it under the backup root (or
    /// deleting it outright). Returns `Ok( false )` when there is nothing
    /// suitable to remove; filesystem failures propagate with the queue
    /// untouched.
    pub fn remove_current( &self, backup: bool ) -> Result<bool, PlayerError> {
        let _commands = self.inner.commands.lock().unwrap();
        self.inner.remove_current_inner( backup )
    }


    /// Searches the library and plays the results if any.
    pub fn search_and_play( &self, pattern: &str, shuffle: bool ) -> bool {
        let _commands = self.inner.commands.lock().unwrap();
        self.inner.search_and_play_inner( pattern, shuffle )
    }


    /// Current playback status.
    pub fn status( &self ) -> Status {
        self.inner.status()
    }


    /// Current track while playing or paused.
    pub fn current( &self ) -> Option<TrackRef> {
        self.inner.session.lock().unwrap().current().cloned()
    }


    /// Display name of the current track, empty when stopped.
    pub fn current_display_name( &self ) -> String {
        self.inner
            .session
            .lock()
            .unwrap()
            .current()
            .map( |track| track.display_name( self.inner.library.audio_dir() ) )
            .unwrap_or_default()
    }


    /// A copy of the current queue.
    pub fn queue( &self ) -> Vec<TrackRef> {
        self.inner.session.lock().unwrap().queue.clone()
    }


    /// Position snapshot of the playing track.
    pub fn position( &self ) -> Option<PlaybackPosition> {
        *self.inner.position.lock().unwrap()
    }


    /// Current volume level.
    pub fn volume( &self ) -> u8 {
        self.inner.volume()
    }


    /// The library index this player searches.
    pub fn library( &self ) -> &Library {
        &self.inner.library
    }


    /// Stops playback and joins every worker thread.
    pub fn shutdown( &self ) {
        {
            let _commands = self.inner.commands.lock().unwrap();
            self.inner.stop_inner( StopOptions::default() );
        }
        // anything a racing command re-created is cancelled and joined
        // without holding the guard, so a worker blocked on it can finish
        let ( fader, timer ) = {
            let mut workers = self.inner.workers.lock().unwrap();
            ( workers.fader.take(), workers.timer.take() )
        };
        if let Some( fader ) = fader {
            fader.cancel_and_join();
        }
        if let Some( timer ) = timer {
            timer.cancel_and_join();
        }
    }
}


impl Drop for Player {
    fn drop( &mut self ) {
        self.shutdown();
    }
}

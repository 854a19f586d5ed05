//! The playback loop
//!
//! One dedicated thread per play episode pulls chunks from the track
//! source and writes them to the sink. Control signals (stop, pause, seek,
//! next/prev) are observed at chunk boundaries, never pushed into the
//! loop, which keeps the inner path lock-light and bounds command latency
//! to one chunk period.

use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

use crate::observer::{ Progress, TrackContext };
use crate::player::{ PlayerInner, StopOptions };
use crate::session::{ CancelToken, PlaybackPosition, Status };
use crate::sink::SinkConfig;
use crate::source::{ OpenOptions, TrackSource };
use crate::track::TrackRef;


/// Consecutive open/configure failures tolerated before the queue is
/// declared unplayable and the player stopped.
const MAX_OPEN_FAILURES: u32 = 10;

/// Poll interval while paused.
const PAUSE_POLL: Duration = Duration::from_millis( 50 );


/// Body of the playback thread, spawned by `play` for one episode.
pub(crate) fn run_queue( inner: Arc<PlayerInner>, fade_in: bool, cancel: CancelToken ) {
    {
        let result = inner.sink.lock().unwrap().open( &cancel );
        if let Err( e ) = result {
            tracing::error!( "Failed to open the audio sink: {}", e );
            inner.deferred_stop( cancel, StopOptions { save_current: false, fade_out: false } );
            return;
        }
    }

    if fade_in {
        inner.start_volume_fade_in();
    }

    let mut failures = 0u32;
    let mut sink_config: Option<SinkConfig> = None;

    loop {
        let track = {
            let mut session = inner.session.lock().unwrap();
            if session.status == Status::Stopped {
                break;
            }
            if session.queue.is_empty() {
                tracing::error!( "Queue is empty, leaving the playback loop" );
                break;
            }
            if session.play_index >= session.queue.len() {
                tracing::warn!( "Play index {} out of range, wrapping to 0", session.play_index );
                session.play_index = 0;
            }
            session.queue[ session.play_index ].clone()
        };

        tracing::info!( "Will now play {}", track );
        let options = OpenOptions {
            mono: inner.config.mono,
            sample_rate: inner.config.sample_rate,
            cancel: cancel.clone(),
        };
        let mut source = match inner.opener.open( &track, &options ) {
            Ok( source ) => source,
            Err( e ) => {
                failures += 1;
                tracing::warn!(
                    "Failed to open {} ({} consecutive failures): {}",
                    track,
                    failures,
                    e
                );
                if failures > MAX_OPEN_FAILURES {
                    give_up( &inner, &cancel );
                    break;
                }
                advance( &inner );
                thread::sleep( inner.config.open_retry_backoff );
                continue;
            }
        };

        match source.duration() {
            Some( secs ) => tracing::info!( "Duration: {} min {} s", secs / 60, secs % 60 ),
            None => tracing::info!( "Duration is unknown" ),
        }

        let config = SinkConfig {
            channels: source.channels(),
            sample_rate: source.sample_rate(),
            chunk_frames: inner.config.chunk_frames,
        };
        // skip the driver round-trip when nothing changed since the
        // previous track
        if sink_config.as_ref() != Some( &config ) {
            let result = inner.sink.lock().unwrap().configure( &config );
            if let Err( e ) = result {
                failures += 1;
                tracing::error!( "Failed to configure the sink for {}: {}", track, e );
                source.close();
                if failures > MAX_OPEN_FAILURES {
                    give_up( &inner, &cancel );
                    break;
                }
                advance( &inner );
                thread::sleep( inner.config.open_retry_backoff );
                continue;
            }
            sink_config = Some( config );
        }
        failures = 0;

        play_track( &inner, source.as_mut(), &track );

        source.close();
        *inner.position.lock().unwrap() = None;

        let mut session = inner.session.lock().unwrap();
        if session.pending_seek.take().is_some() {
            // a seek landing at the very end of a track is dropped
            tracing::debug!( "Dropping seek requested at end of track" );
        }
        if session.go_next || session.go_prev {
            // the index was already adjusted by the command that set the
            // flag, just consume it
            session.go_next = false;
            session.go_prev = false;
        } else {
            session.play_index += 1;
        }
    }

    tracing::debug!( "End of queue" );
    inner.sink.lock().unwrap().close();
}


/// Plays one opened track until it ends or a control signal breaks out.
/// No error escapes: a failing read or write logs and ends the track.
fn play_track( inner: &Arc<PlayerInner>, source: &mut dyn TrackSource, track: &TrackRef ) {
    let chunk_frames = inner.config.chunk_frames;
    let mut context = inner.observer.on_track_start( track );
    let started = Instant::now();
    let mut last_progress = Instant::now();

    // first notification just before the first read
    notify_progress( inner, &*source, track, started, &mut context );
    publish_position( inner, &*source );

    let mut data = match source.read_frames( chunk_frames ) {
        Ok( data ) => data,
        Err( e ) => {
            tracing::warn!( "Read failed at start of {}: {}", track, e );
            return;
        }
    };

    while let Some( chunk ) = data {
        // pause is a poll-sleep so control can still observe a stop
        loop {
            let status = inner.session.lock().unwrap().status;
            if status != Status::Paused {
                break;
            }
            thread::sleep( PAUSE_POLL );
        }

        let seek_pending = {
            let session = inner.session.lock().unwrap();
            if session.status == Status::Stopped || session.go_next || session.go_prev {
                return;
            }
            session.pending_seek.is_some()
        };

        // skipped while a seek is pending: the reported position would be
        // stale the moment the seek is applied
        if !seek_pending && last_progress.elapsed() >= inner.config.progress_interval {
            last_progress = Instant::now();
            notify_progress( inner, &*source, track, started, &mut context );
        }

        {
            let result = inner.sink.lock().unwrap().write( &chunk );
            if let Err( e ) = result {
                tracing::error!( "Sink write failed for {}: {}", track, e );
                return;
            }
        }
        inner.observer.on_chunk_written( &mut context, &chunk );
        publish_position( inner, &*source );

        let seek = { inner.session.lock().unwrap().pending_seek.take() };
        if let Some( percent ) = seek {
            tracing::info!( "Seek detected: {}%", percent );
            if let Err( e ) = source.set_percentage_pos( percent ) {
                tracing::warn!( "Seek to {}% failed: {}", percent, e );
            }
        }

        data = match source.read_frames( chunk_frames ) {
            Ok( data ) => data,
            Err( e ) => {
                tracing::warn!( "Read failed in {}: {}", track, e );
                return;
            }
        };
    }
}


fn give_up( inner: &Arc<PlayerInner>, cancel: &CancelToken ) {
    tracing::error!( "Too many consecutive failures, stopping the player" );
    // the stop must come from a helper thread: this thread cannot join
    // itself
    inner.deferred_stop(
        cancel.clone(),
        StopOptions { save_current: false, fade_out: false },
    );
}


fn advance( inner: &Arc<PlayerInner> ) {
    let mut session = inner.session.lock().unwrap();
    session.play_index += 1;
}


fn notify_progress(
    inner: &Arc<PlayerInner>,
    source: &dyn TrackSource,
    track: &TrackRef,
    started: Instant,
    context: &mut TrackContext,
) {
    let progress = Progress {
        track: track.clone(),
        percent: source.percentage_pos(),
        duration: source.duration(),
        elapsed: started.elapsed(),
    };
    inner.observer.on_progress( context, &progress );
}


fn publish_position( inner: &PlayerInner, source: &dyn TrackSource ) {
    let position = PlaybackPosition {
        percent: source.percentage_pos(),
        duration: source.duration(),
    };
    *inner.position.lock().unwrap() = Some( position );
}

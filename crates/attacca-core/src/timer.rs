//! Sleep timer
//!
//! Countdown worker armed at each play. Notifies the remaining time once
//! per tick, ducks the volume over the last quarter of the countdown and
//! triggers a faded stop on expiry, optionally deferring to the current
//! track's natural end.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::SleepTimerConfig;
use crate::player::{ PlayerInner, StopOptions };
use crate::session::{ sliced_sleep, CancelToken };


/// Seconds from the track's natural end considered close enough for a
/// timer waiting on the current track.
const NEAR_END_SECS: u64 = 10;

/// Poll interval while waiting for the track end.
const TRACK_END_POLL: Duration = Duration::from_secs( 2 );


/// Handle over a running sleep timer.
pub(crate) struct SleepTimer {
    token: CancelToken,
    handle: Option<thread::JoinHandle<()>>,
}


impl SleepTimer {
    /// Cancels the worker and waits for it. Worker sleeps are sliced, so
    /// the join is bounded.
    pub(crate) fn cancel_and_join( mut self ) {
        self.token.cancel();
        if let Some( handle ) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!( "Sleep timer thread panicked" );
            }
        }
    }
}


/// Arms the configured sleep timer, if enabled.
pub(crate) fn arm( inner: &PlayerInner ) -> Option<SleepTimer> {
    let config = inner.config.sleep_timer.clone()?;
    let token = CancelToken::new();
    let worker = inner.arc();
    let worker_token = token.clone();
    let handle = thread::spawn( move || timer_loop( worker, worker_token, config ) );
    Some( SleepTimer { token, handle: Some( handle ) } )
}


fn timer_loop( inner: Arc<PlayerInner>, token: CancelToken, config: SleepTimerConfig ) {
    tracing::info!( "Sleep timer armed for {:?}", config.total );
    let ticks = ( config.total.as_millis() / config.tick.as_millis().max( 1 ) ).max( 1 ) as u32;

    for tick in 0..ticks {
        if !sliced_sleep( config.tick, &token ) {
            tracing::info!( "Sleep timer cancelled" );
            return;
        }
        let remaining = config.total.saturating_sub( config.tick * ( tick + 1 ) );
        inner.observer.on_sleep_remaining( remaining );

        // duck the volume over the last quarter of the countdown
        if f64::from( tick ) > 0.75 * f64::from( ticks ) {
            let level = inner.volume().saturating_sub( 1 );
            if let Err( e ) = inner.set_volume( level, true ) {
                tracing::warn!( "Sleep timer volume duck failed: {}", e );
            }
        }
    }

    if config.wait_for_track_end {
        wait_for_track_end( &inner, &token );
        if token.is_cancelled() {
            return;
        }
    }

    tracing::info!( "Sleep timer expired, stopping with a fade-out" );
    // the stop needs the command guard; see fade_out_loop for why this
    // thread cannot take it itself
    let stopper = Arc::clone( &inner );
    let gate = token.clone();
    thread::spawn( move || {
        let _commands = stopper.commands.lock().unwrap();
        if gate.is_cancelled() {
            return;
        }
        stopper.stop_inner( StopOptions { save_current: true, fade_out: true } );
    });
}


/// Polls the published position until the current track is about to end.
/// An unknown position or duration triggers immediately.
fn wait_for_track_end( inner: &Arc<PlayerInner>, token: &CancelToken ) {
    loop {
        let remaining = inner
            .position
            .lock()
            .unwrap()
            .and_then( |position| position.remaining_secs() );
        match remaining {
            Some( secs ) if secs >= NEAR_END_SECS => {}
            _ => return,
        }
        if !sliced_sleep( TRACK_END_POLL, token ) {
            return;
        }
    }
}

//! Volume fades
//!
//! Background workers that ramp the volume up (play start) or down (stop
//! request). A fader never touches the playback status; it only calls
//! `set_volume` and, for a fade-out, hands the final stop to a gated
//! helper thread.

use std::sync::Arc;
use std::thread;

use crate::player::{ PlayerInner, StopOptions };
use crate::session::{ sliced_sleep, CancelToken };


/// Level a fade-in starts from.
const FADE_IN_FLOOR: u8 = 5;


#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub(crate) enum FadeDirection {
    In,
    Out,
}


/// Handle over a running fade worker.
pub(crate) struct Fader {
    pub(crate) direction: FadeDirection,
    /// Volume at fade start, restored after a fade-out stop.
    pub(crate) prefade: u8,
    token: CancelToken,
    handle: Option<thread::JoinHandle<()>>,
}


impl Fader {
    /// Cancels the worker and waits for it. Worker sleeps are sliced, so
    /// the join is bounded.
    pub(crate) fn cancel_and_join( mut self ) {
        self.token.cancel();
        if let Some( handle ) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!( "Fade thread panicked" );
            }
        }
    }
}


/// Starts a fade-in worker ramping toward the configured ceiling.
pub(crate) fn start_fade_in( inner: &PlayerInner ) -> Fader {
    let token = CancelToken::new();
    let prefade = inner.volume();
    let worker = inner.arc();
    let worker_token = token.clone();
    let handle = thread::spawn( move || fade_in_loop( worker, worker_token ) );
    Fader {
        direction: FadeDirection::In,
        prefade,
        token,
        handle: Some( handle ),
    }
}


fn fade_in_loop( inner: Arc<PlayerInner>, token: CancelToken ) {
    let fade = inner.config.fade.clone();

    let mut level = FADE_IN_FLOOR;
    while level < fade.ceiling {
        // a user pushing the volume above the ramp wins
        if inner.volume() < level {
            if let Err( e ) = inner.set_volume( level, true ) {
                tracing::warn!( "Fade-in volume update failed: {}", e );
            }
        }
        if !sliced_sleep( fade.fade_in_interval, &token ) {
            return;
        }
        level = level.saturating_add( fade.step );
    }
    if inner.volume() < fade.ceiling {
        if let Err( e ) = inner.set_volume( fade.ceiling, true ) {
            tracing::warn!( "Fade-in volume update failed: {}", e );
        }
    }
}


/// Starts a fade-out worker that ramps to silence and then performs the
/// actual stop.
pub(crate) fn start_fade_out( inner: &PlayerInner, save_current: bool ) -> Fader {
    let token = CancelToken::new();
    let prefade = inner.volume();
    let worker = inner.arc();
    let worker_token = token.clone();
    let handle = thread::spawn( move || fade_out_loop( worker, worker_token, save_current ) );
    Fader {
        direction: FadeDirection::Out,
        prefade,
        token,
        handle: Some( handle ),
    }
}


fn fade_out_loop( inner: Arc<PlayerInner>, token: CancelToken, save_current: bool ) {
    let fade = inner.config.fade.clone();

    let mut level = inner.volume();
    while level > 0 {
        level = level.saturating_sub( fade.step );
        if let Err( e ) = inner.set_volume( level, true ) {
            tracing::warn!( "Fade-out volume update failed: {}", e );
        }
        if !sliced_sleep( fade.fade_out_interval, &token ) {
            return;
        }
    }

    // the real stop needs the command guard, which this thread must never
    // take: its owner joins it while holding that guard. The stop handler
    // finds this fader registered and restores the pre-fade volume.
    let stopper = Arc::clone( &inner );
    let gate = token.clone();
    thread::spawn( move || {
        let _commands = stopper.commands.lock().unwrap();
        if gate.is_cancelled() {
            return;
        }
        stopper.stop_inner( StopOptions { save_current, fade_out: false } );
    });
}

//! Integration tests for library search, directory resolution and
//! `remove_current`, exercising the real filesystem through tempdirs.

mod common;

use std::fs::{ self, File };
use std::io::Write;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::{ Duration, SystemTime };

use attacca_core::{ PlayRequest, Status, TrackRef };

use common::*;


const WAIT: Duration = Duration::from_secs( 3 );


fn create_track( dir: &Path, name: &str ) -> PathBuf {
    let path = dir.join( name );
    if let Some( parent ) = path.parent() {
        fs::create_dir_all( parent ).unwrap();
    }
    let mut file = File::create( &path ).unwrap();
    file.write_all( b"pcm" ).unwrap();
    path
}


fn set_mtime( path: &Path, time: SystemTime ) {
    let file = File::options().write( true ).open( path ).unwrap();
    file.set_modified( time ).unwrap();
}


#[test]
fn test_remove_current_with_backup_on_last_track_stops() {
    let observer = Arc::new( RecordingObserver::default() );
    let f = observed_fixture( 10_000, Arc::clone( &observer ), |_| {} );
    let track = create_track( &f.audio_dir, "sub/a.mp3" );

    assert!( f.player.play( PlayRequest::tracks( vec![ TrackRef::File( track.clone() ) ] ) ) );
    assert!( wait_until( WAIT, || f.log.write_count() > 0 ) );

    assert!( f.player.remove_current( true ).unwrap() );

    // the queue became empty, so the player stopped
    assert_eq!( f.player.status(), Status::Stopped );
    assert!( !track.exists() );
    // relocated under the backup root at the same relative path
    assert!( f.backup_dir.join( "sub/a.mp3" ).is_file() );
    assert_eq!( observer.removed.lock().unwrap().clone(), vec![ track ] );
}


#[test]
fn test_remove_current_keeps_playing_the_next_entry() {
    let f = fixture( 10_000 );
    let a = create_track( &f.audio_dir, "a.mp3" );
    let b = create_track( &f.audio_dir, "b.mp3" );
    let queue = vec![ TrackRef::File( a.clone() ), TrackRef::File( b.clone() ) ];

    assert!( f.player.play( PlayRequest::tracks( queue ) ) );
    assert!( wait_until( WAIT, || f.log.opened_tracks().len() == 1 ) );

    assert!( f.player.remove_current( false ).unwrap() );

    assert_eq!( f.player.status(), Status::Playing );
    assert_eq!( f.player.queue(), vec![ TrackRef::File( b.clone() ) ] );
    assert!( !a.exists() );

    // playback continues at the entry that was next before the removal
    assert!( wait_until( WAIT, || f.log.opened_tracks().len() == 2 ) );
    assert_eq!( f.log.opened_tracks()[ 1 ], TrackRef::File( b ) );

    f.player.stop();
}


#[test]
fn test_remove_current_rejected_when_stopped() {
    let f = fixture( 10_000 );
    assert!( !f.player.remove_current( true ).unwrap() );
}


#[test]
fn test_remove_current_rejected_for_streams() {
    let f = fixture( 10_000 );
    let radio = TrackRef::stream( "Radio", "http://radio.example/live" );
    assert!( f.player.play( PlayRequest::single( radio ) ) );
    assert!( wait_until( WAIT, || f.log.write_count() > 0 ) );

    assert!( !f.player.remove_current( true ).unwrap() );
    assert_eq!( f.player.status(), Status::Playing );
    assert_eq!( f.player.queue().len(), 1 );

    f.player.stop();
}


#[test]
fn test_search_and_play_recent_keeps_recency_order() {
    let f = fixture( 10_000 );
    let base = SystemTime::now() - Duration::from_secs( 1000 );
    let mut paths = Vec::new();
    for ( index, name ) in [ "one.mp3", "two.mp3", "three.mp3", "four.mp3" ].iter().enumerate() {
        let path = create_track( &f.audio_dir, name );
        set_mtime( &path, base + Duration::from_secs( 100 * index as u64 ) );
        paths.push( path );
    }

    // shuffle is suppressed for recency queries
    assert!( f.player.search_and_play( "#recent:3", true ) );
    assert_eq!(
        f.player.queue(),
        vec![
            TrackRef::File( paths[ 3 ].clone() ),
            TrackRef::File( paths[ 2 ].clone() ),
            TrackRef::File( paths[ 1 ].clone() ),
        ]
    );

    f.player.stop();
}


#[test]
fn test_search_and_play_with_no_results_changes_nothing() {
    let f = fixture( 10_000 );
    create_track( &f.audio_dir, "a.mp3" );

    assert!( !f.player.search_and_play( "doesnotmatch", false ) );
    assert_eq!( f.player.status(), Status::Stopped );
    assert!( f.player.queue().is_empty() );
}


#[test]
fn test_search_and_play_pattern_matches_paths() {
    let f = fixture( 10_000 );
    let hit = create_track( &f.audio_dir, "Albums/Artist - Song.mp3" );
    create_track( &f.audio_dir, "other.mp3" );

    assert!( f.player.search_and_play( "artist", false ) );
    assert_eq!( f.player.queue(), vec![ TrackRef::File( hit ) ] );

    f.player.stop();
}


#[test]
fn test_library_play_appends_radios_and_resumes_the_stopped_track() {
    let f = fixture( 10_000 );
    create_track( &f.audio_dir, "a.mp3" );
    create_track( &f.audio_dir, "b.mp3" );
    let mut radios = File::create( f.audio_dir.join( "radios" ) ).unwrap();
    writeln!( radios, "http://radio.example/live" ).unwrap();

    assert!( f.player.play( PlayRequest::library() ) );
    let queue = f.player.queue();
    assert_eq!( queue.len(), 3 );
    assert!( queue[ 2 ].is_stream() );

    assert!( wait_until( WAIT, || f.log.write_count() > 0 ) );
    let playing = f.player.current().unwrap();
    f.player.stop();

    // the track active at the stop comes back first
    assert!( f.player.play( PlayRequest::library() ) );
    let queue = f.player.queue();
    assert_eq!( queue.len(), 4 );
    assert_eq!( queue[ 0 ], playing );

    f.player.stop();
}


#[test]
fn test_play_pause_reissues_the_last_request() {
    let f = fixture( 10_000 );
    let track = TrackRef::File( create_track( &f.audio_dir, "a.mp3" ) );

    assert!( f.player.play( PlayRequest::tracks( vec![ track.clone() ] ) ) );
    assert!( wait_until( WAIT, || f.log.write_count() > 0 ) );
    f.player.stop();

    // play_pause on a stopped player re-runs the previous play call
    f.player.play_pause();
    assert!( wait_until( WAIT, || f.player.status() == Status::Playing ) );
    assert_eq!( f.player.queue(), vec![ track.clone() ] );
    assert_eq!( f.log.opened_tracks(), vec![ track.clone(), track ] );

    f.player.stop();
}

//! Library scanning and search
//!
//! Discovers playable files under the library root and resolves search
//! patterns: plain case-insensitive regexes, `#recent[:N]` named queries,
//! and stream urls passed through verbatim.

use std::cmp::Reverse;
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::SystemTime;

use regex::RegexBuilder;
use thiserror::Error;

use crate::track::{ path_is_stream, TrackRef };


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "wma", "aiff", "alac",
];


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Invalid search pattern: {0}" )]
    InvalidPattern( String ),
}


/// Index over the files of one library root.
#[derive( Debug, Clone )]
pub struct Library {
    audio_dir: PathBuf,
}


impl Library {
    /// Creates an index rooted at the given directory.
    pub fn new( audio_dir: PathBuf ) -> Self {
        Self { audio_dir }
    }


    /// The library root.
    pub fn audio_dir( &self ) -> &Path {
        &self.audio_dir
    }


    /// All playable files under the root, in walk order.
    pub fn scan( &self ) -> Result<Vec<PathBuf>, LibraryError> {
        scan_dir( &self.audio_dir )
    }


    /// All playable files under the root, most recently modified first.
    pub fn recent( &self ) -> Result<Vec<PathBuf>, LibraryError> {
        let mut files = self.scan()?;
        files.sort_by_key( |path| Reverse( modified( path ) ) );
        Ok( files )
    }


    /// Resolves a search pattern into a queue of tracks.
    ///
    /// - empty or `"*"`: every playable file under the root;
    /// - a url with a scheme: a single live stream;
    /// - `#recent[:N]`: files by modification time descending, truncated
    ///   to `N` when given;
    /// - anything else: a case-insensitive regex over full file paths.
    pub fn search( &self, pattern: &str ) -> Result<Vec<TrackRef>, LibraryError> {
        let pattern = pattern.trim();

        if pattern.is_empty() || pattern == "*" {
            return Ok( self.scan()?.into_iter().map( TrackRef::File ).collect() );
        }

        if path_is_stream( pattern ) {
            return Ok( vec![ TrackRef::stream( pattern, pattern ) ] );
        }

        if let Some( query ) = pattern.strip_prefix( '#' ) {
            return self.named_query( query );
        }

        let regex = RegexBuilder::new( pattern )
            .case_insensitive( true )
            .build()
            .map_err( |e| LibraryError::InvalidPattern( e.to_string() ) )?;

        let matches = self
            .scan()?
            .into_iter()
            .filter( |path| {
                path.to_str().map( |s| regex.is_match( s ) ).unwrap_or( false )
            })
            .map( TrackRef::File )
            .collect();
        Ok( matches )
    }


    /// Resolves a `#keyword[:options]` query. Unknown keywords are logged
    /// and yield nothing.
    fn named_query( &self, query: &str ) -> Result<Vec<TrackRef>, LibraryError> {
        let ( keyword, options ) = match query.split_once( ':' ) {
            Some(( keyword, options )) => ( keyword, Some( options ) ),
            None => ( query, None ),
        };

        match keyword {
            "recent" => {
                let mut files = self.recent()?;
                // the limit only applies when the suffix is a plain number
                if let Some( limit ) = options.and_then( |o| o.parse::<usize>().ok() ) {
                    files.truncate( limit );
                    tracing::info!( "Queue reduced to its {} first entries", limit );
                }
                Ok( files.into_iter().map( TrackRef::File ).collect() )
            }
            other => {
                tracing::error!( "Unknown special '#' query {:?}", other );
                Ok( Vec::new() )
            }
        }
    }
}


/// Scans a directory tree for playable files, depth first. Inaccessible
/// subdirectories are skipped with a warning.
pub fn scan_dir( dir: &Path ) -> Result<Vec<PathBuf>, LibraryError> {
    let mut files = Vec::new();
    walk( dir, &mut files )?;
    Ok( files )
}


fn walk( dir: &Path, files: &mut Vec<PathBuf> ) -> Result<(), LibraryError> {
    let entries = match fs::read_dir( dir ) {
        Ok( entries ) => entries,
        Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!( "Access denied: {:?}", dir );
            return Ok(());
        }
        Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err( LibraryError::NotFound( dir.to_path_buf() ) );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            walk( &path, files )?;
        } else if is_audio_file( &path ) {
            files.push( path );
        }
    }

    Ok(())
}


/// Checks if a file has a supported audio extension.
fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


/// Modification time, with unreadable entries sinking to the epoch.
fn modified( path: &Path ) -> SystemTime {
    fs::metadata( path )
        .and_then( |meta| meta.modified() )
        .unwrap_or( SystemTime::UNIX_EPOCH )
}


/// Reads the `radios` sidecar of a directory: one stream url per line,
/// lines without a scheme are skipped with a warning. A missing sidecar is
/// not an error.
pub fn read_radios_sidecar( dir: &Path ) -> Vec<TrackRef> {
    let path = dir.join( "radios" );
    if !path.is_file() {
        return Vec::new();
    }

    let contents = match fs::read_to_string( &path ) {
        Ok( contents ) => contents,
        Err( e ) => {
            tracing::warn!( "Could not read radios sidecar {:?}: {}", path, e );
            return Vec::new();
        }
    };

    let mut radios = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if path_is_stream( line ) {
            radios.push( TrackRef::stream( line, line ) );
        } else {
            tracing::warn!( "Ignoring radios entry without a scheme: {:?}", line );
        }
    }
    radios
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;


    fn touch( dir: &Path, name: &str ) -> PathBuf {
        let path = dir.join( name );
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent ).unwrap();
        }
        File::create( &path ).unwrap();
        path
    }


    #[test]
    fn test_scan_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch( dir.path(), "a.mp3" );
        let b = touch( dir.path(), "sub/b.FLAC" );
        touch( dir.path(), "notes.txt" );
        touch( dir.path(), "radios" );

        let library = Library::new( dir.path().to_path_buf() );
        let mut files = library.scan().unwrap();
        files.sort();

        let mut expected = vec![ a, b ];
        expected.sort();
        assert_eq!( files, expected );
    }


    #[test]
    fn test_scan_missing_root_is_an_error() {
        let library = Library::new( PathBuf::from( "/nonexistent/music" ) );
        assert!( matches!( library.scan(), Err( LibraryError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_search_stream_pattern_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::new( dir.path().to_path_buf() );

        let results = library.search( "http://radio.example/live" ).unwrap();
        assert_eq!( results, vec![ TrackRef::stream( "http://radio.example/live", "http://radio.example/live" ) ] );
    }


    #[test]
    fn test_search_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let hit = touch( dir.path(), "Artist - Song.mp3" );
        touch( dir.path(), "other.mp3" );

        let library = Library::new( dir.path().to_path_buf() );
        let results = library.search( "artist" ).unwrap();
        assert_eq!( results, vec![ TrackRef::File( hit ) ] );
    }


    #[test]
    fn test_search_invalid_regex_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::new( dir.path().to_path_buf() );
        assert!( matches!(
            library.search( "[unclosed" ),
            Err( LibraryError::InvalidPattern( _ ) )
        ));
    }


    #[test]
    fn test_search_unknown_named_query_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch( dir.path(), "a.mp3" );

        let library = Library::new( dir.path().to_path_buf() );
        assert!( library.search( "#frecent" ).unwrap().is_empty() );
    }


    #[test]
    fn test_recent_orders_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch( dir.path(), "old.mp3" );
        let mid = touch( dir.path(), "mid.mp3" );
        let new = touch( dir.path(), "new.mp3" );

        let base = SystemTime::now() - std::time::Duration::from_secs( 600 );
        for ( path, offset ) in [ ( &old, 0 ), ( &mid, 100 ), ( &new, 200 ) ] {
            let file = File::options().write( true ).open( path ).unwrap();
            file.set_modified( base + std::time::Duration::from_secs( offset ) ).unwrap();
        }

        let library = Library::new( dir.path().to_path_buf() );
        assert_eq!( library.recent().unwrap(), vec![ new.clone(), mid, old ] );

        let limited = library.search( "#recent:1" ).unwrap();
        assert_eq!( limited, vec![ TrackRef::File( new ) ] );
    }


    #[test]
    fn test_recent_ignores_non_numeric_limit() {
        let dir = tempfile::tempdir().unwrap();
        touch( dir.path(), "a.mp3" );
        touch( dir.path(), "b.mp3" );

        let library = Library::new( dir.path().to_path_buf() );
        assert_eq!( library.search( "#recent:many" ).unwrap().len(), 2 );
    }


    #[test]
    fn test_radios_sidecar_keeps_only_streams() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create( dir.path().join( "radios" ) ).unwrap();
        writeln!( file, "http://radio.example/one" ).unwrap();
        writeln!( file ).unwrap();
        writeln!( file, "not a url" ).unwrap();
        writeln!( file, "https://radio.example/two" ).unwrap();

        let radios = read_radios_sidecar( dir.path() );
        assert_eq!( radios, vec![
            TrackRef::stream( "http://radio.example/one", "http://radio.example/one" ),
            TrackRef::stream( "https://radio.example/two", "https://radio.example/two" ),
        ]);
    }


    #[test]
    fn test_radios_sidecar_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!( read_radios_sidecar( dir.path() ).is_empty() );
    }
}

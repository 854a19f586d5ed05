//! Queue entries
//!
//! A track is either a local audio file or a live web stream. Streams are
//! recognized by the scheme separator embedded in their location and cannot
//! be seeked.

use std::fmt;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };


/// Returns whether the given location designates a stream.
pub fn path_is_stream( path: &str ) -> bool {
    path.contains( "://" )
}


/// A single entry of the play queue.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub enum TrackRef {
    /// A local audio file.
    File( PathBuf ),
    /// A web stream, carrying the name to display instead of the url.
    Stream { name: String, url: String },
}


impl TrackRef {
    /// Creates a stream entry.
    pub fn stream( name: impl Into<String>, url: impl Into<String> ) -> Self {
        TrackRef::Stream { name: name.into(), url: url.into() }
    }


    /// Builds a track from a raw location string, classifying it as a
    /// stream when it embeds a scheme separator.
    pub fn from_location( location: &str ) -> Self {
        if path_is_stream( location ) {
            TrackRef::stream( location, location )
        } else {
            TrackRef::File( PathBuf::from( location ) )
        }
    }


    /// Returns whether this entry is a stream.
    pub fn is_stream( &self ) -> bool {
        match self {
            TrackRef::Stream { .. } => true,
            TrackRef::File( path ) => {
                path.to_str().map( path_is_stream ).unwrap_or( false )
            }
        }
    }


    /// The local path of a file entry.
    pub fn as_path( &self ) -> Option<&Path> {
        match self {
            TrackRef::File( path ) if !self.is_stream() => Some( path ),
            _ => None,
        }
    }


    /// The url of a stream entry.
    pub fn url( &self ) -> Option<&str> {
        match self {
            TrackRef::Stream { url, .. } => Some( url ),
            _ => None,
        }
    }


    /// Display name: for files, the path relative to the library root with
    /// the extension stripped; for streams, the stored name.
    pub fn display_name( &self, audio_dir: &Path ) -> String {
        match self {
            TrackRef::Stream { name, .. } => name.clone(),
            TrackRef::File( path ) => {
                let relative = path.strip_prefix( audio_dir ).unwrap_or( path );
                relative.with_extension( "" ).to_string_lossy().into_owned()
            }
        }
    }
}


impl fmt::Display for TrackRef {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            TrackRef::File( path ) => write!( f, "{}", path.display() ),
            TrackRef::Stream { url, .. } => write!( f, "{}", url ),
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_from_location_classifies_streams() {
        let track = TrackRef::from_location( "http://radio.example/live" );
        assert!( track.is_stream() );
        assert_eq!( track.url(), Some( "http://radio.example/live" ) );
        assert_eq!( track.as_path(), None );
    }


    #[test]
    fn test_from_location_classifies_files() {
        let track = TrackRef::from_location( "/music/album/song.mp3" );
        assert!( !track.is_stream() );
        assert_eq!( track.as_path(), Some( Path::new( "/music/album/song.mp3" ) ) );
    }


    #[test]
    fn test_display_name_strips_root_and_extension() {
        let track = TrackRef::File( PathBuf::from( "/music/album/song.mp3" ) );
        assert_eq!( track.display_name( Path::new( "/music" ) ), "album/song" );
    }


    #[test]
    fn test_display_name_outside_root_keeps_full_path() {
        let track = TrackRef::File( PathBuf::from( "/elsewhere/song.mp3" ) );
        assert_eq!( track.display_name( Path::new( "/music" ) ), "/elsewhere/song" );
    }


    #[test]
    fn test_display_name_of_stream_is_its_name() {
        let track = TrackRef::stream( "My Radio", "http://radio.example/live" );
        assert_eq!( track.display_name( Path::new( "/music" ) ), "My Radio" );
    }
}

//! Native player control seam.

/// Commands the playback engine sends back to the native media element.
///
/// The coordinator is the only writer of playback state; this trait is how
/// that state is mirrored onto the real player after a seek or a
/// play/pause transition.
pub trait PlayerControl {
    /// Moves the native playhead to `media_time` seconds.
    fn seek_to(&mut self, media_time: f64);
    
    /// Starts or pauses native playback.
    fn set_playing(&mut self, playing: bool);
}

impl<P: PlayerControl + ?Sized> PlayerControl for Box<P> {
    fn seek_to(&mut self, media_time: f64) {
        (**self).seek_to(media_time);
    }
    
    fn set_playing(&mut self, playing: bool) {
        (**self).set_playing(playing);
    }
}

/// A player that ignores every command.
///
/// Used when the engine runs headless (replays, tests) and there is no
/// media element to drive.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedPlayer;

impl PlayerControl for DetachedPlayer {
    fn seek_to(&mut self, _media_time: f64) {}
    
    fn set_playing(&mut self, _playing: bool) {}
}

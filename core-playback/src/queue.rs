//! Play queue for collection playback.

use core_library::CollectionRef;

/// Ordered track ids with a cursor.
///
/// The cursor starts on the first track. `next` and `previous` stop at the
/// ends instead of wrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    source: Option<CollectionRef>,
    tracks: Vec<String>,
    position: usize,
}

impl Queue {
    pub fn new(tracks: Vec<String>) -> Self {
        Self {
            source: None,
            tracks,
            position: 0,
        }
    }

    /// A queue over a collection's tracks, remembering where it came from.
    pub fn from_collection(collection: CollectionRef, tracks: Vec<String>) -> Self {
        Self {
            source: Some(collection),
            ..Self::new(tracks)
        }
    }

    pub fn source(&self) -> Option<&CollectionRef> {
        self.source.as_ref()
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&str> {
        self.tracks.get(self.position).map(String::as_str)
    }

    pub fn has_next(&self) -> bool {
        self.position + 1 < self.tracks.len()
    }

    /// Advance and return the new current track, or `None` at the end.
    pub fn next(&mut self) -> Option<&str> {
        if !self.has_next() {
            return None;
        }
        self.position += 1;
        self.current()
    }

    /// Step back and return the new current track, or `None` at the start.
    pub fn previous(&mut self) -> Option<&str> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.current()
    }

    /// Move the cursor to the first occurrence of `track_id`.
    pub fn jump_to(&mut self, track_id: &str) -> bool {
        match self.tracks.iter().position(|t| t == track_id) {
            Some(index) => {
                self.position = index;
                true
            }
            None => false,
        }
    }

    /// Drop `track_id` everywhere it appears, keeping the cursor on the same
    /// track when that track survives.
    pub fn remove(&mut self, track_id: &str) {
        let before_cursor = self.tracks[..self.position.min(self.tracks.len())]
            .iter()
            .filter(|t| *t == track_id)
            .count();
        self.tracks.retain(|t| t != track_id);
        self.position = self
            .position
            .saturating_sub(before_cursor)
            .min(self.tracks.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> Queue {
        Queue::new(vec!["t1".into(), "t2".into(), "t3".into()])
    }

    #[test]
    fn test_walks_forward_and_back() {
        let mut q = queue();
        assert_eq!(q.current(), Some("t1"));
        assert_eq!(q.next(), Some("t2"));
        assert_eq!(q.next(), Some("t3"));
        assert_eq!(q.next(), None);
        assert_eq!(q.current(), Some("t3"));
        assert_eq!(q.previous(), Some("t2"));
        assert_eq!(q.previous(), Some("t1"));
        assert_eq!(q.previous(), None);
    }

    #[test]
    fn test_empty_queue() {
        let mut q = Queue::default();
        assert!(q.is_empty());
        assert_eq!(q.current(), None);
        assert_eq!(q.next(), None);
        assert_eq!(q.previous(), None);
    }

    #[test]
    fn test_jump_to() {
        let mut q = queue();
        assert!(q.jump_to("t3"));
        assert_eq!(q.position(), 2);
        assert!(!q.jump_to("missing"));
        assert_eq!(q.current(), Some("t3"));
    }

    #[test]
    fn test_remove_keeps_cursor_on_track() {
        let mut q = queue();
        q.jump_to("t3");
        q.remove("t1");
        assert_eq!(q.current(), Some("t3"));
        assert_eq!(q.len(), 2);

        q.remove("t3");
        assert_eq!(q.current(), Some("t2"));
    }

    #[test]
    fn test_collection_source_is_kept() {
        let q = Queue::from_collection(CollectionRef::album("a1"), vec!["t1".into()]);
        assert_eq!(q.source(), Some(&CollectionRef::album("a1")));
    }
}

use super::record::Record;
use super::Ring;
use crate::error::Result;

mod stream;

pub use stream::RecordStream;

/// Drains the records currently in the ring without blocking.
///
/// Ends when the ring is empty, or after yielding an error.
/// Records written later can be picked up by iterating again.
pub struct Records<'a> {
    ring: &'a Ring,
    done: bool,
}

impl<'a> Records<'a> {
    pub(crate) fn new(ring: &'a Ring) -> Self {
        Self { ring, done: false }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.ring.try_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

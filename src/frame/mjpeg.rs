//! Splits a raw MJPEG byte stream into whole JPEG images.

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const DEFAULT_MAX_PENDING: usize = 4 * 1024 * 1024;

pub struct MjpegSplitter {
    pending: Vec<u8>,
    max_pending: usize,
}

impl MjpegSplitter {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING)
    }

    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending,
        }
    }

    /// Feeds one chunk and returns the newest image it completed, if any.
    /// Older images completed by the same chunk are discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut newest = None;
        loop {
            let Some(start) = find(&self.pending, &SOI, 0) else {
                // keep a dangling 0xFF, it may be the first half of a marker
                let keep_tail = self.pending.last() == Some(&0xFF);
                self.pending.clear();
                if keep_tail {
                    self.pending.push(0xFF);
                }
                break;
            };

            let Some(eoi) = find(&self.pending, &EOI, start + SOI.len()) else {
                self.pending.drain(..start);
                break;
            };

            let end = eoi + EOI.len();
            newest = Some(self.pending[start..end].to_vec());
            self.pending.drain(..end);
        }

        // an image larger than the limit can never complete
        if self.pending.len() > self.max_pending {
            self.pending.clear();
        }

        newest
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for MjpegSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|window| window == marker)
        .map(|pos| pos + from)
}

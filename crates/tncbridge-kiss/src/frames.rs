use crate::escape::FEND;

/// Iterator over the delimited frames at the start of a buffer.
///
/// Each item is a raw frame including its opening and closing FEND. A
/// closing FEND may also open the next frame. Empty frames (`FEND FEND`)
/// are skipped. Iteration stops at the first byte run that is not a
/// complete frame; [`Frames::remainder`] returns it.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Frames<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            done: false,
        }
    }

    /// Bytes not yet returned as frames.
    ///
    /// A lone trailing FEND is a closing delimiter and is not part of the
    /// remainder.
    pub fn remainder(&self) -> &'a [u8] {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        if rest == [FEND] {
            &[]
        } else {
            rest
        }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let rest = &self.buf[self.pos..];
            if rest.first() != Some(&FEND) {
                self.done = true;
                break;
            }
            let Some(close) = rest[1..].iter().position(|&b| b == FEND).map(|i| i + 1) else {
                self.done = true;
                break;
            };
            let start = self.pos;
            self.pos += close;
            if close == 1 {
                continue;
            }
            return Some(&self.buf[start..=self.pos]);
        }
        None
    }
}

/// Frames found in a buffer and the undelimited bytes after them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized<'a> {
    pub frames: Vec<&'a [u8]>,
    pub remainder: &'a [u8],
}

/// Split `buffer` into delimited frames.
///
/// Returns no frames if the buffer does not start with FEND.
pub fn tokenize(buffer: &[u8]) -> Tokenized<'_> {
    let mut frames = Frames::new(buffer);
    let found: Vec<&[u8]> = frames.by_ref().collect();
    Tokenized {
        frames: found,
        remainder: frames.remainder(),
    }
}

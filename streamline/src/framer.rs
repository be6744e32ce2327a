use heapless::String;

const EOS_TERMINATOR: u8 = b'\n';

/// Output of [`LineFramer::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<const N: usize> {
    /// A complete line, terminator stripped.
    Line(String<N>),
    /// The buffer filled before a terminator; carries what was buffered.
    /// Everything up to the next terminator is dropped.
    Overflow(String<N>),
}

/// Accumulates bytes into newline-terminated lines of at most `N` bytes.
///
/// `\r` is ignored. Non-ASCII bytes are stored as `?` so that every line is
/// valid UTF-8 and can be echoed back verbatim in an error response.
pub struct LineFramer<const N: usize> {
    buffer: String<N>,
    discarding: bool,
}

impl<const N: usize> LineFramer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            discarding: false,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    pub fn push(&mut self, byte: u8) -> Option<Frame<N>> {
        match byte {
            b'\r' => None,
            EOS_TERMINATOR => {
                if self.discarding {
                    self.reset();
                    return None;
                }
                let line = core::mem::take(&mut self.buffer);
                Some(Frame::Line(line))
            }
            _ if self.discarding => None,
            _ => {
                let c = if byte.is_ascii() { byte as char } else { '?' };
                if self.buffer.push(c).is_ok() {
                    return None;
                }
                let partial = core::mem::take(&mut self.buffer);
                self.discarding = true;
                Some(Frame::Overflow(partial))
            }
        }
    }
}

impl<const N: usize> Default for LineFramer<N> {
    fn default() -> Self {
        Self::new()
    }
}

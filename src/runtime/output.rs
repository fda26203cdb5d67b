use std::io::{self, Write};

use parking_lot::Mutex;

enum Sink {
    Stdout,
    Buffer(Vec<u8>),
}

/// The program's output stream. Each `println` writes one whole line under
/// the sink's own lock, so lines from different workers never interleave.
pub struct Output {
    sink: Mutex<Sink>,
}

impl Output {
    pub fn stdout() -> Self {
        Self {
            sink: Mutex::new(Sink::Stdout),
        }
    }

    /// An in-memory sink whose contents can be read back with [`Self::contents`].
    pub fn buffer() -> Self {
        Self {
            sink: Mutex::new(Sink::Buffer(Vec::new())),
        }
    }

    pub fn println(&self, line: &str) -> io::Result<()> {
        let mut sink = self.sink.lock();
        match &mut *sink {
            Sink::Stdout => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", line)?;
                stdout.flush()
            }
            Sink::Buffer(buffer) => writeln!(buffer, "{}", line),
        }
    }

    /// Everything written so far to a buffer sink; empty for stdout.
    pub fn contents(&self) -> String {
        match &*self.sink.lock() {
            Sink::Stdout => String::new(),
            Sink::Buffer(buffer) => String::from_utf8_lossy(buffer).into_owned(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::stdout()
    }
}

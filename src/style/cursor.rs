use std::io::{self, Write};

pub const ERASE_LINE: &str = "\x1b[2K";
pub const ERASE_TILL_LINE_END: &str = "\x1b[0J";

/// Cursor control over any writer. Every call flushes.
#[derive(Debug)]
pub struct Cursor<W: Write> {
    out: W,
}

impl Cursor<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Cursor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, seq: &str) -> io::Result<()> {
        self.out.write_all(seq.as_bytes())?;
        self.out.flush()
    }

    /// Move to `line`, `column` (1-based, as the terminal counts)
    pub fn set_pos(&mut self, line: u16, column: u16) -> io::Result<()> {
        self.emit(&format!("\x1b[{};{}f", line, column))
    }

    pub fn hide(&mut self, hidden: bool) -> io::Result<()> {
        self.emit(if hidden { "\x1b[?25l" } else { "\x1b[?25h" })
    }

    pub fn erase_line(&mut self) -> io::Result<()> {
        self.emit(ERASE_LINE)
    }

    pub fn erase_till_line_end(&mut self) -> io::Result<()> {
        self.emit(ERASE_TILL_LINE_END)
    }

    /// Write `ch` at column `x` of line `y`
    pub fn put_char(&mut self, ch: char, x: u16, y: u16) -> io::Result<()> {
        self.set_pos(y, x)?;
        let mut buf = [0u8; 4];
        self.emit(ch.encode_utf8(&mut buf))
    }
}

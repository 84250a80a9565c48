//! Standard I/O abstraction for script instances.
//!
//! Host functions that talk to the outside world go through the instance's
//! [`ScriptEnvironment`] rather than the process streams directly, so a
//! host can capture, redirect, or discard script output per instance.
//! Writes are best-effort: a failing sink swallows the output the way a
//! broken console would, never faulting the script.

use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::rc::Rc;

/// The stdin/stdout/stderr surface an instance runs against.
///
/// Cloning shares the underlying streams, so a host can keep a handle to
/// read back what the instance wrote.
///
/// # Example
///
/// ```
/// use rookscript::ScriptEnvironment;
///
/// let env = ScriptEnvironment::captured();
/// env.println("hello");
/// assert_eq!(env.take_output(), "hello\n");
/// ```
#[derive(Clone)]
pub struct ScriptEnvironment {
    stdin: Option<Rc<RefCell<dyn BufRead>>>,
    stdout: Option<Rc<RefCell<dyn Write>>>,
    stderr: Option<Rc<RefCell<dyn Write>>>,
    captured_out: Option<Rc<RefCell<Vec<u8>>>>,
    captured_err: Option<Rc<RefCell<Vec<u8>>>>,
}

impl ScriptEnvironment {
    /// Wire the environment to the process's standard streams.
    pub fn standard() -> Self {
        Self {
            stdin: Some(Rc::new(RefCell::new(BufReader::new(io::stdin())))),
            stdout: Some(Rc::new(RefCell::new(io::stdout()))),
            stderr: Some(Rc::new(RefCell::new(io::stderr()))),
            captured_out: None,
            captured_err: None,
        }
    }

    /// No streams at all: reads see end-of-input, writes vanish.
    pub fn detached() -> Self {
        Self {
            stdin: None,
            stdout: None,
            stderr: None,
            captured_out: None,
            captured_err: None,
        }
    }

    /// Buffer output and error output in memory, retrievable with
    /// [`take_output`](Self::take_output) /
    /// [`take_error_output`](Self::take_error_output).
    pub fn captured() -> Self {
        let out = Rc::new(RefCell::new(Vec::new()));
        let err = Rc::new(RefCell::new(Vec::new()));
        Self {
            stdin: None,
            stdout: Some(out.clone()),
            stderr: Some(err.clone()),
            captured_out: Some(out),
            captured_err: Some(err),
        }
    }

    /// Replace standard input with fixed text.
    pub fn with_input(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(Rc::new(RefCell::new(Cursor::new(text.into().into_bytes()))));
        self
    }

    /// Replace standard output with an arbitrary sink.
    pub fn with_output(mut self, sink: impl Write + 'static) -> Self {
        self.stdout = Some(Rc::new(RefCell::new(sink)));
        self.captured_out = None;
        self
    }

    /// Replace standard error with an arbitrary sink.
    pub fn with_error_output(mut self, sink: impl Write + 'static) -> Self {
        self.stderr = Some(Rc::new(RefCell::new(sink)));
        self.captured_err = None;
        self
    }

    pub fn print(&self, text: &str) {
        if let Some(out) = &self.stdout {
            let _ = out.borrow_mut().write_all(text.as_bytes());
        }
    }

    pub fn println(&self, text: &str) {
        if let Some(out) = &self.stdout {
            let mut out = out.borrow_mut();
            let _ = out.write_all(text.as_bytes());
            let _ = out.write_all(b"\n");
        }
    }

    pub fn print_err(&self, text: &str) {
        if let Some(err) = &self.stderr {
            let _ = err.borrow_mut().write_all(text.as_bytes());
        }
    }

    pub fn println_err(&self, text: &str) {
        if let Some(err) = &self.stderr {
            let mut err = err.borrow_mut();
            let _ = err.write_all(text.as_bytes());
            let _ = err.write_all(b"\n");
        }
    }

    /// Read one line from standard input, without its trailing newline.
    /// Returns `None` at end-of-input or with no input stream attached.
    pub fn read_line(&self) -> Option<String> {
        let stdin = self.stdin.as_ref()?;
        let mut line = String::new();
        match stdin.borrow_mut().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
        }
    }

    /// Drain captured standard output. Empty unless built with
    /// [`captured`](Self::captured).
    pub fn take_output(&self) -> String {
        match &self.captured_out {
            Some(buf) => String::from_utf8_lossy(&std::mem::take(&mut *buf.borrow_mut())).into_owned(),
            None => String::new(),
        }
    }

    /// Drain captured standard error.
    pub fn take_error_output(&self) -> String {
        match &self.captured_err {
            Some(buf) => String::from_utf8_lossy(&std::mem::take(&mut *buf.borrow_mut())).into_owned(),
            None => String::new(),
        }
    }
}

impl Default for ScriptEnvironment {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_captured_output() {
        let env = ScriptEnvironment::captured();
        env.print("a");
        env.println("b");
        env.println_err("oops");
        assert_eq!(env.take_output(), "ab\n");
        assert_eq!(env.take_error_output(), "oops\n");
        // Draining clears the buffer.
        assert_eq!(env.take_output(), "");
    }

    #[test]
    fn test_input_lines() {
        let env = ScriptEnvironment::detached().with_input("one\ntwo\n");
        assert_eq!(env.read_line(), Some("one".to_string()));
        assert_eq!(env.read_line(), Some("two".to_string()));
        assert_eq!(env.read_line(), None);
    }

    #[test]
    fn test_detached_swallows_everything() {
        let env = ScriptEnvironment::detached();
        env.println("gone");
        assert_eq!(env.read_line(), None);
        assert_eq!(env.take_output(), "");
    }

    #[test]
    fn test_clones_share_streams() {
        let env = ScriptEnvironment::captured();
        let other = env.clone();
        other.println("shared");
        assert_eq!(env.take_output(), "shared\n");
    }
}

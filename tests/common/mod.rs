use moonwalk::interpreter::Interpreter;
use std::{cell::RefCell, io, rc::Rc};

/// In-memory `print` sink that stays readable after the interpreter takes it.
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub fn capturing() -> (Interpreter, Capture) {
    let out = Capture::default();
    (Interpreter::new().with_output(out.clone()), out)
}

/// Runs `source` and returns everything it printed.
#[allow(dead_code)]
pub fn output_of(source: &str) -> String {
    let (mut interp, out) = capturing();
    interp.run(source).unwrap();
    out.text()
}

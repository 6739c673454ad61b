//! Block-length modulation signal buffer with a fill cursor.
//!
//! Control events land at arbitrary frame offsets inside a block; the
//! fill cursor tracks the last written position so later readers can
//! extend the most recent value across the rest of the block without
//! knowing when events arrived.

#[derive(Debug)]
pub struct ModBuffer {
    buf: Vec<i8>,
    fli: usize,
}

impl ModBuffer {
    pub fn new(capacity: usize) -> ModBuffer {
        ModBuffer {
            buf: vec![0; capacity],
            fli: 0,
        }
    }

    /// Reinitializes with a single value at the start.
    pub fn clear(&mut self, val: i8) {
        self.buf[0] = val;
        self.fli = 0;
    }

    /// Carries the last value of this block over as the first value of
    /// the next.
    pub fn cycle(&mut self) {
        self.buf[0] = self.buf[self.fli];
        self.fli = 0;
    }

    /// Extends the value at the fill cursor up to `pos` included.
    pub fn repeat_upto(&mut self, pos: usize) {
        let val = self.buf[self.fli];
        for v in &mut self.buf[self.fli..=pos] {
            *v = val;
        }
        self.fli = pos;
    }

    /// Fills the first `size` entries with a constant.
    pub fn fill_entire(&mut self, val: i8, size: usize) {
        for v in &mut self.buf[..size] {
            *v = val;
        }
        self.fli = size - 1;
    }

    /// Extends the current value up to `pos` excluded, then writes the
    /// new value at `pos`.
    pub fn append(&mut self, pos: usize, val: i8) {
        let old = self.buf[self.fli];
        for v in &mut self.buf[self.fli..pos] {
            *v = old;
        }
        self.buf[pos] = val;
        self.fli = pos;
    }

    /// Completes the block and returns it for reading.
    pub fn for_input(&mut self, size: usize) -> &[i8] {
        self.repeat_upto(size - 1);
        &self.buf[..size]
    }

    /// Hands the block out for a generator to overwrite.
    pub fn for_output(&mut self, size: usize) -> &mut [i8] {
        self.fli = size - 1;
        &mut self.buf[..size]
    }

    /// Read access without touching the cursor; valid only after
    /// `for_input`/`for_output` completed the block.
    pub fn as_slice(&self, size: usize) -> &[i8] {
        &self.buf[..size]
    }
}

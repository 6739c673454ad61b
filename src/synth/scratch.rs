//! Block buffer pool.
//!
//! Voices borrow zeroed scratch buffers for the duration of one render
//! block and hand them back before the block ends. Returned storage is
//! recycled, so after the first few blocks rendering does not allocate.

#[derive(Debug, Default)]
pub struct Scratch {
    i8bufs: Vec<Vec<i8>>,
    i16bufs: Vec<Vec<i16>>,
    i32bufs: Vec<Vec<i32>>,
    outstanding: usize,
}

impl Scratch {
    pub fn new() -> Scratch {
        Scratch::default()
    }

    pub fn take_i8(&mut self, n: usize) -> Vec<i8> {
        self.outstanding += 1;
        let mut buf = self.i8bufs.pop().unwrap_or_default();
        buf.clear();
        buf.resize(n, 0);
        buf
    }

    pub fn give_i8(&mut self, buf: Vec<i8>) {
        self.outstanding -= 1;
        self.i8bufs.push(buf);
    }

    pub fn take_i16(&mut self, n: usize) -> Vec<i16> {
        self.outstanding += 1;
        let mut buf = self.i16bufs.pop().unwrap_or_default();
        buf.clear();
        buf.resize(n, 0);
        buf
    }

    pub fn give_i16(&mut self, buf: Vec<i16>) {
        self.outstanding -= 1;
        self.i16bufs.push(buf);
    }

    pub fn take_i32(&mut self, n: usize) -> Vec<i32> {
        self.outstanding += 1;
        let mut buf = self.i32bufs.pop().unwrap_or_default();
        buf.clear();
        buf.resize(n, 0);
        buf
    }

    pub fn give_i32(&mut self, buf: Vec<i32>) {
        self.outstanding -= 1;
        self.i32bufs.push(buf);
    }

    /// True when every borrowed buffer has been returned.
    pub fn is_empty(&self) -> bool {
        self.outstanding == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_come_back_zeroed() {
        let mut pool = Scratch::new();
        let mut a = pool.take_i16(64);
        a[10] = 1234;
        pool.give_i16(a);
        let b = pool.take_i16(64);
        assert!(b.iter().all(|&v| v == 0));
        pool.give_i16(b);
        assert!(pool.is_empty());
    }

    #[test]
    fn outstanding_tracks_both_types() {
        let mut pool = Scratch::new();
        let a = pool.take_i8(16);
        let b = pool.take_i16(16);
        assert!(!pool.is_empty());
        pool.give_i8(a);
        assert!(!pool.is_empty());
        pool.give_i16(b);
        assert!(pool.is_empty());
    }

    #[test]
    fn storage_is_recycled() {
        let mut pool = Scratch::new();
        let a = pool.take_i8(256);
        let ptr = a.as_ptr();
        pool.give_i8(a);
        let b = pool.take_i8(128);
        assert_eq!(b.as_ptr(), ptr);
        pool.give_i8(b);
    }
}

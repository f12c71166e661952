//! Output files shared between the writer and metadata threads

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

/// A write target that is either owned by one thread or shared behind a lock.
///
/// When sample blocks and inline headers go to the same file, both threads hold a
/// `Shared` handle and every record is written under the lock, so the file only ever
/// sees whole blocks and whole headers.
pub enum OutputTarget<W> {
    Owned(W),
    Shared(Arc<Mutex<W>>),
}

impl<W: Write> OutputTarget<W> {
    pub fn shared(inner: W) -> Arc<Mutex<W>> {
        Arc::new(Mutex::new(inner))
    }

    /// Issue a single write for `record` and report how much of it landed.
    /// A short count is the caller's to report, not retried here.
    pub fn write_record(&mut self, record: &[u8]) -> io::Result<usize> {
        match self {
            OutputTarget::Owned(w) => w.write(record),
            OutputTarget::Shared(w) => {
                let mut guard = w
                    .lock()
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "output lock poisoned"))?;
                guard.write(record)
            }
        }
    }

    /// Write the whole record, still under a single lock acquisition
    pub fn write_all_record(&mut self, record: &[u8]) -> io::Result<()> {
        match self {
            OutputTarget::Owned(w) => w.write_all(record),
            OutputTarget::Shared(w) => {
                let mut guard = w
                    .lock()
                    .map_err(|_| io::Error::new(io::ErrorKind::Other, "output lock poisoned"))?;
                guard.write_all(record)
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputTarget::Owned(w) => w.flush(),
            OutputTarget::Shared(w) => w
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "output lock poisoned"))?
                .flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_shared_records_never_interleave() {
        let file = OutputTarget::shared(Vec::new());
        let mut handles = Vec::new();
        for byte in [b'a', b'b'] {
            let mut target = OutputTarget::Shared(file.clone());
            handles.push(thread::spawn(move || {
                let record = [byte; 64];
                for _ in 0..200 {
                    target.write_all_record(&record).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let bytes = file.lock().unwrap().clone();
        assert_eq!(bytes.len(), 2 * 200 * 64);
        for chunk in bytes.chunks_exact(64) {
            assert!(chunk.iter().all(|b| *b == chunk[0]));
        }
    }
}

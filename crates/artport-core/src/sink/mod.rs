//! Local download sink.
//!
//! Writes the response body into the caller's file at explicit offsets
//! (pwrite on unix). Resume keeps the verified prefix; restart truncates.

mod writer;

pub use writer::LocalSink;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_all(path: &std::path::Path) -> Vec<u8> {
        let mut buf = Vec::new();
        std::fs::File::open(path)
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        std::fs::write(&path, b"old contents").unwrap();
        let sink = LocalSink::create(&path).unwrap();
        sink.write_at(0, b"new").unwrap();
        sink.sync().unwrap();
        assert_eq!(read_all(&path), b"new");
    }

    #[test]
    fn resume_keeps_prefix_and_drops_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.jar");
        std::fs::write(&path, b"0123456789garbage").unwrap();
        let sink = LocalSink::open_for_resume(&path, 10).unwrap().expect("prefix");
        assert_eq!(sink.len().unwrap(), 10);
        sink.write_at(10, b"ab").unwrap();
        assert_eq!(read_all(&path), b"0123456789ab");
    }

    #[test]
    fn resume_needs_enough_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jar");
        std::fs::write(&path, b"0123").unwrap();
        assert!(LocalSink::open_for_resume(&path, 10).unwrap().is_none());
        let missing = dir.path().join("missing.jar");
        assert!(LocalSink::open_for_resume(&missing, 1).unwrap().is_none());
    }

    #[test]
    fn discard_empties_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.jar");
        std::fs::write(&path, b"partial").unwrap();
        let sink = LocalSink::open_for_resume(&path, 7).unwrap().unwrap();
        sink.discard().unwrap();
        assert_eq!(sink.len().unwrap(), 0);
    }

    #[test]
    fn prefix_reader_reads_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.jar");
        std::fs::write(&path, b"hello world").unwrap();
        let sink = LocalSink::open_for_resume(&path, 5).unwrap().unwrap();
        let mut buf = Vec::new();
        sink.prefix_reader().unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn hash_prefix_covers_kept_bytes() {
        use crate::checksum::{ChecksumAlgorithm, StreamingDigest};
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.jar");
        std::fs::write(&path, b"hello\ntrailing").unwrap();
        let sink = LocalSink::open_for_resume(&path, 6).unwrap().unwrap();
        let mut d = StreamingDigest::new(ChecksumAlgorithm::Sha256);
        sink.hash_prefix(&mut d, 6).unwrap();
        assert_eq!(
            d.finalize_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }
}

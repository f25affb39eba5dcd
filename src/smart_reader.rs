use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Opens a table and transparently peels off gzip layers (including
/// BGZF and concatenated members), detected by magic bytes rather than
/// file extension.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let mut reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(file));

    // Nested layers are rare; cap them so a crafted file cannot loop forever.
    const MAX_DEPTH: usize = 4;
    for _ in 0..MAX_DEPTH {
        let is_gzip = {
            let buf = reader.fill_buf()?;
            // GZIP magic: 1f 8b
            buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b
        };
        if !is_gzip {
            break;
        }
        tracing::debug!(path = %path.display(), "detected gzip layer");
        reader = Box::new(BufReader::new(MultiGzDecoder::new(reader)));
    }
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::io::{Read, Write};

    #[test]
    fn reads_plain_and_gzip_alike() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("calls.tsv");
        std::fs::write(&plain, "marker\ts1\n").unwrap();

        let gz = dir.path().join("calls.tsv.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"marker\ts1\n").unwrap();
        std::fs::write(&gz, enc.finish().unwrap()).unwrap();

        for path in [&plain, &gz] {
            let mut text = String::new();
            open_input(path).unwrap().read_to_string(&mut text).unwrap();
            assert_eq!(text, "marker\ts1\n");
        }
    }
}

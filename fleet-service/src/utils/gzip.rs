use std::io::Read;

use flate2::read::GzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

pub fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Text form of a response body, decompressing gzip output first.
pub fn body_text(bytes: &[u8]) -> String {
    if is_gzip(bytes) {
        match gunzip(bytes) {
            Ok(plain) => return String::from_utf8_lossy(&plain).into_owned(),
            Err(e) => tracing::debug!(error = %e, "Failed to decompress captured body"),
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    #[test]
    fn gzip_bodies_are_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"id":"x"}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        assert!(is_gzip(&compressed));
        assert_eq!(body_text(&compressed), r#"{"id":"x"}"#);
        assert_eq!(body_text(b"plain"), "plain");
    }
}

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use crate::error::ConvertError;

/// Sample encoding of a headerless real-valued capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Uint8,
    Int8,
}

impl SampleEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleEncoding::Uint8 | SampleEncoding::Int8 => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleEncoding::Uint8 => "uint8",
            SampleEncoding::Int8 => "int8",
        }
    }

    /// Maps one raw byte to a centered amplitude in [-1, 1).
    #[inline]
    pub fn normalize_sample(&self, raw: u8) -> f64 {
        match self {
            SampleEncoding::Uint8 => (raw as f64 - 128.0) / 128.0,
            SampleEncoding::Int8 => (raw as i8) as f64 / 128.0,
        }
    }

    pub fn normalize(&self, raw: &[u8]) -> Vec<f64> {
        raw.iter().map(|&x| self.normalize_sample(x)).collect()
    }
}

impl FromStr for SampleEncoding {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uint8" | "u8" => Ok(SampleEncoding::Uint8),
            "int8" | "i8" => Ok(SampleEncoding::Int8),
            _ => Err(ConvertError::config(format!(
                "unsupported input dtype '{}' (expected uint8 or int8)",
                s
            ))),
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequential chunked reader over a raw capture.
///
/// Yields batches of at most `chunk_samples` raw samples. The last batch may
/// be short; once a read returns nothing the iterator is exhausted for good.
pub struct SampleSource<R> {
    reader: R,
    chunk_bytes: usize,
    done: bool,
}

impl<R: Read> SampleSource<R> {
    pub fn new(reader: R, chunk_samples: usize, encoding: SampleEncoding) -> Self {
        Self {
            reader,
            chunk_bytes: chunk_samples.max(1) * encoding.bytes_per_sample(),
            done: false,
        }
    }

    fn fill(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_bytes];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

impl<R: Read> Iterator for SampleSource<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill() {
            Ok(batch) if batch.is_empty() => {
                self.done = true;
                None
            }
            Ok(batch) => Some(Ok(batch)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_uint8_anchor_values() {
        let enc = SampleEncoding::Uint8;
        assert_eq!(enc.normalize_sample(0), -1.0);
        assert_eq!(enc.normalize_sample(128), 0.0);
        assert!((enc.normalize_sample(255) - 0.9921875).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_range() {
        for enc in [SampleEncoding::Uint8, SampleEncoding::Int8] {
            for raw in 0..=255u8 {
                let v = enc.normalize_sample(raw);
                assert!((-1.0..=1.0).contains(&v), "{enc} {raw} -> {v}");
            }
        }
    }

    #[test]
    fn test_int8_reinterprets_bytes() {
        let enc = SampleEncoding::Int8;
        assert_eq!(enc.normalize_sample(0x80), -1.0);
        assert_eq!(enc.normalize_sample(0), 0.0);
        assert_eq!(enc.normalize_sample(64), 0.5);
    }

    #[test]
    fn test_unknown_dtype_rejected() {
        assert!(matches!(
            "float32".parse::<SampleEncoding>(),
            Err(ConvertError::Configuration(_))
        ));
        assert_eq!("UINT8".parse::<SampleEncoding>().unwrap(), SampleEncoding::Uint8);
    }

    #[test]
    fn test_chunks_with_short_tail() {
        let data: Vec<u8> = (0..10).collect();
        let source = SampleSource::new(Cursor::new(data), 4, SampleEncoding::Uint8);
        let sizes: Vec<usize> = source.map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut source = SampleSource::new(Cursor::new(Vec::new()), 16, SampleEncoding::Int8);
        assert!(source.next().is_none());
        assert!(source.next().is_none());
    }
}

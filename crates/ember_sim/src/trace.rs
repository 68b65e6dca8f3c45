//! Per-cycle trace output.
//!
//! The [`TraceSink`] trait receives the top-level port values after every
//! cycle. [`LineTrace`] renders them as one text line per cycle, stable enough
//! to diff across runs:
//!
//! ```text
//!    3: a=05 b=1 y=0c
//! ```

use std::io::Write;

use ember_common::Bits;

use crate::error::SimError;

/// Receives port values once per completed cycle.
pub trait TraceSink {
    /// Records the port values at the end of `cycle`, in declaration order.
    fn record(&mut self, cycle: u64, ports: &[(String, Bits)]) -> Result<(), SimError>;

    /// Flushes any buffered output.
    fn finish(&mut self) -> Result<(), SimError>;
}

/// Formats one trace line without a trailing newline.
pub fn format_line(cycle: u64, ports: &[(String, Bits)]) -> String {
    let mut line = format!("{cycle:>4}:");
    for (name, value) in ports {
        line.push(' ');
        line.push_str(name);
        line.push('=');
        line.push_str(&value.to_hex());
    }
    line
}

/// Writes one text line per cycle.
pub struct LineTrace<W: Write> {
    writer: W,
    lines: u64,
}

impl<W: Write> LineTrace<W> {
    /// Creates a trace writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Number of lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for LineTrace<W> {
    fn record(&mut self, cycle: u64, ports: &[(String, Bits)]) -> Result<(), SimError> {
        writeln!(self.writer, "{}", format_line(cycle, ports))?;
        self.lines += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SimError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<(String, Bits)> {
        vec![
            ("a".into(), Bits::truncated(8, 5)),
            ("en".into(), Bits::from_bool(true)),
        ]
    }

    #[test]
    fn line_format() {
        assert_eq!(format_line(3, &ports()), "   3: a=05 en=1");
        assert_eq!(format_line(12345, &[]), "12345:");
    }

    #[test]
    fn writes_one_line_per_record() {
        let mut trace = LineTrace::new(Vec::new());
        trace.record(0, &ports()).unwrap();
        trace.record(1, &ports()).unwrap();
        trace.finish().unwrap();
        assert_eq!(trace.lines(), 2);
        let text = String::from_utf8(trace.into_inner()).unwrap();
        assert_eq!(text, "   0: a=05 en=1\n   1: a=05 en=1\n");
    }

    #[test]
    fn writes_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        let file = std::fs::File::create(&path).unwrap();
        let mut trace = LineTrace::new(std::io::BufWriter::new(file));
        trace.record(7, &ports()).unwrap();
        trace.finish().unwrap();
        drop(trace);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["   7: a=05 en=1"]);
    }
}

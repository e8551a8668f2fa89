//! Plain-text transform log: one `dx, dy, dtheta` line per processed frame.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{Result, Transform};

/// Buffered writer for the optional per-frame transform log.
#[derive(Debug)]
pub struct TransformLog {
    writer: BufWriter<File>,
}

impl TransformLog {
    /// Create (or truncate) the log file at the given path.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append the raw transform estimated for one frame pair.
    pub fn record(&mut self, transform: &Transform) -> Result<()> {
        writeln!(
            self.writer,
            "{}, {}, {}",
            transform.dx, transform.dy, transform.da
        )?;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_log_writes_one_line_per_transform() {
        let path = std::env::temp_dir().join("stabilize_rs_translog_test.txt");
        {
            let mut log = TransformLog::create(&path).unwrap();
            log.record(&Transform::new(1.5, -2.0, 0.25)).unwrap();
            log.record(&Transform::identity()).unwrap();
            log.flush().unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1.5, -2, 0.25");
        assert_eq!(lines[1], "0, 0, 0");

        fs::remove_file(&path).ok();
    }
}

//! Waveform recording in the playback format.

use crate::Result;
use csv::WriterBuilder;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tandem_core::SampleBuffer;
use tracing::debug;

/// Appends every buffer as four `channel;v;v;...` lines.
pub struct WaveformRecorder<W: Write = File> {
    writer: csv::Writer<W>,
    path: Option<PathBuf>,
    buffers: u64,
}

impl WaveformRecorder<File> {
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!("Recording waveforms to {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::new(file)
        })
    }
}

impl<W: Write> WaveformRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: WriterBuilder::new()
                .delimiter(b';')
                .has_headers(false)
                .flexible(true)
                .from_writer(writer),
            path: None,
            buffers: 0,
        }
    }

    pub fn write(&mut self, buffer: &SampleBuffer) -> Result<()> {
        for (index, channel) in buffer.channels().iter().enumerate() {
            let fields = std::iter::once(index.to_string())
                .chain(channel.iter().map(ToString::to_string));
            self.writer.write_record(fields)?;
        }
        self.buffers += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn buffers(&self) -> u64 {
        self.buffers
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse_groups;
    use std::io::Cursor;

    fn buffer() -> SampleBuffer {
        SampleBuffer::new([vec![1, -2], vec![3, 4], vec![5, 6], vec![7, 8]]).unwrap()
    }

    #[test]
    fn test_line_format() {
        let mut recorder = WaveformRecorder::new(Vec::new());
        recorder.write(&buffer()).unwrap();
        let text = String::from_utf8(recorder.into_inner().unwrap()).unwrap();
        assert_eq!(text, "0;1;-2\n1;3;4\n2;5;6\n3;7;8\n");
    }

    #[test]
    fn test_recording_plays_back() {
        let mut recorder = WaveformRecorder::new(Vec::new());
        recorder.write(&buffer()).unwrap();
        recorder.write(&buffer()).unwrap();
        assert_eq!(recorder.buffers(), 2);

        let groups = parse_groups(Cursor::new(recorder.into_inner().unwrap())).unwrap();
        assert_eq!(groups, vec![buffer(), buffer()]);
    }

    #[test]
    fn test_append_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waves.csv");
        {
            let mut recorder = WaveformRecorder::append(&path).unwrap();
            recorder.write(&buffer()).unwrap();
            recorder.flush().unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }
}

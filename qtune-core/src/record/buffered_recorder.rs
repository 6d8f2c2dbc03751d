use super::{keys, Record, Recorder};

/// Buffered recorder.
///
/// Keeps every record in memory. Used in tests and by callers that inspect the
/// telemetry of a run after it finished.
#[derive(Debug, Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Per-episode records, in the order they were written.
    pub fn episodes(&self) -> impl Iterator<Item = &Record> {
        self.of_kind(keys::KIND_EPISODE)
    }

    /// Run-summary records.
    pub fn summaries(&self) -> impl Iterator<Item = &Record> {
        self.of_kind(keys::KIND_SUMMARY)
    }

    fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Record> {
        self.buf
            .iter()
            .filter(move |r| r.get_string(keys::KIND).map_or(false, |k| k == kind))
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}

//! CSV sink for the telemetry of a tuning run.
use anyhow::Result;
use csv::{Writer, WriterBuilder};
use log::warn;
use qtune_core::record::{keys, Record, RecordValue, Recorder};
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    path::Path,
};

/// Name of the file with one row per episode.
pub const EPISODES_FILE: &str = "episodes.csv";

/// Name of the file with one row per finished run.
pub const SUMMARY_FILE: &str = "summary.csv";

// Vec<_> fields do not support headers in the csv crate, so arrays are joined with `;`.
#[derive(Debug, Serialize)]
struct EpisodeRow {
    episode_id: i64,
    total_reward: f64,
    aborted: bool,
    abort_reason: String,
    actions: String,
    params: String,
    epsilon: f64,
    accumulated_cost: f64,
    timestamp: String,
}

impl TryFrom<&Record> for EpisodeRow {
    type Error = anyhow::Error;

    fn try_from(record: &Record) -> Result<Self> {
        Ok(Self {
            episode_id: record.get_integer(keys::EPISODE_ID)?,
            total_reward: record.get_scalar(keys::TOTAL_REWARD)?,
            aborted: record.get_flag(keys::ABORTED)?,
            abort_reason: record.get_string(keys::ABORT_REASON)?,
            actions: record.get_string(keys::ACTIONS)?,
            params: joined(record, keys::PARAMS)?,
            epsilon: record.get_scalar(keys::EPSILON)?,
            accumulated_cost: record.get_scalar(keys::ACCUMULATED_COST)?,
            timestamp: text(record, keys::TIMESTAMP),
        })
    }
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    episodes: i64,
    best_episode_id: i64,
    best_reward: f64,
    best_actions: String,
    best_params: String,
    timestamp: String,
}

impl TryFrom<&Record> for SummaryRow {
    type Error = anyhow::Error;

    fn try_from(record: &Record) -> Result<Self> {
        Ok(Self {
            episodes: record.get_integer(keys::EPISODES)?,
            best_episode_id: record.get_integer(keys::BEST_EPISODE_ID)?,
            best_reward: record.get_scalar(keys::BEST_REWARD)?,
            best_actions: record.get_string(keys::ACTIONS)?,
            best_params: joined(record, keys::PARAMS)?,
            timestamp: text(record, keys::TIMESTAMP),
        })
    }
}

fn joined(record: &Record, key: &str) -> Result<String> {
    Ok(RecordValue::Array1(record.get_array1(key)?).to_string())
}

fn text(record: &Record, key: &str) -> String {
    record.get(key).map_or_else(String::new, |v| v.to_string())
}

fn open(path: &Path) -> Result<Writer<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let empty = file.metadata()?.len() == 0;
    Ok(WriterBuilder::new().has_headers(empty).from_writer(file))
}

/// Appends telemetry records to CSV files.
///
/// Per-episode records go to [`EPISODES_FILE`], run summaries to [`SUMMARY_FILE`].
/// Headers are written only when a file is created. Records that cannot be written
/// are logged and skipped; the run is never interrupted by the sink.
pub struct CsvRecorder {
    episodes: Writer<File>,
    summary: Writer<File>,
}

impl CsvRecorder {
    /// Opens or creates the files in `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            episodes: open(&dir.join(EPISODES_FILE))?,
            summary: open(&dir.join(SUMMARY_FILE))?,
        })
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        match record.get_string(keys::KIND)?.as_str() {
            keys::KIND_EPISODE => self.episodes.serialize(EpisodeRow::try_from(record)?)?,
            keys::KIND_SUMMARY => {
                self.summary.serialize(SummaryRow::try_from(record)?)?;
                self.summary.flush()?;
            }
            kind => warn!("Ignored record of unknown kind {}", kind),
        }
        Ok(())
    }
}

impl Recorder for CsvRecorder {
    fn write(&mut self, record: Record) {
        if let Err(e) = self.write_record(&record) {
            warn!("Failed to write record: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.episodes.flush().and(self.summary.flush()) {
            warn!("Failed to flush CSV files: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn episode(id: i64, aborted: bool) -> Record {
        Record::from_slice(&[
            (keys::KIND, RecordValue::String(keys::KIND_EPISODE.to_string())),
            (keys::EPISODE_ID, RecordValue::Integer(id)),
            (keys::TOTAL_REWARD, RecordValue::Scalar(-1.5)),
            (keys::ABORTED, RecordValue::Flag(aborted)),
            (keys::ABORT_REASON, RecordValue::String(String::new())),
            (keys::ACTIONS, RecordValue::String("+kp".to_string())),
            (keys::PARAMS, RecordValue::Array1(vec![1.5, 0.25])),
            (keys::EPSILON, RecordValue::Scalar(0.5)),
            (keys::ACCUMULATED_COST, RecordValue::Scalar(1.5)),
        ])
    }

    #[test]
    fn test_append_across_runs() -> Result<()> {
        let dir = TempDir::new("qtune_csv")?;

        let mut recorder = CsvRecorder::new(dir.path())?;
        recorder.write(episode(0, false));
        recorder.write(episode(1, true));
        recorder.flush();
        drop(recorder);

        let mut recorder = CsvRecorder::new(dir.path())?;
        recorder.write(episode(0, false));
        recorder.flush();
        drop(recorder);

        let mut rdr = csv::Reader::from_path(dir.path().join(EPISODES_FILE))?;
        assert_eq!(
            rdr.headers()?.iter().collect::<Vec<_>>(),
            vec![
                "episode_id",
                "total_reward",
                "aborted",
                "abort_reason",
                "actions",
                "params",
                "epsilon",
                "accumulated_cost",
                "timestamp"
            ]
        );
        let rows = rdr.records().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][2], "true");
        assert_eq!(&rows[1][5], "1.5;0.25");
        Ok(())
    }

    #[test]
    fn test_malformed_record_is_skipped() -> Result<()> {
        let dir = TempDir::new("qtune_csv")?;
        let mut recorder = CsvRecorder::new(dir.path())?;
        recorder.write(Record::from_scalar(keys::TOTAL_REWARD, 1.0));
        recorder.write(episode(3, false));
        recorder.flush();

        let mut rdr = csv::Reader::from_path(dir.path().join(EPISODES_FILE))?;
        assert_eq!(rdr.records().count(), 1);
        Ok(())
    }
}

use crate::session::RunSummary;
use sdt_core::ResponseRecord;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Destination for a finished run. Called at most once per session.
pub trait PersistenceSink {
    fn persist(&mut self, summary: &RunSummary, records: &[ResponseRecord]) -> io::Result<()>;
}

/// Writes `<participant>.csv` and `<participant>.json` into a data directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    data_dir: PathBuf,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a RunSummary,
    records: &'a [ResponseRecord],
}

impl FileSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn csv_path(&self, participant: &str) -> PathBuf {
        self.data_dir.join(format!("{participant}.csv"))
    }

    pub fn json_path(&self, participant: &str) -> PathBuf {
        self.data_dir.join(format!("{participant}.json"))
    }

    fn write_csv(path: &Path, records: &[ResponseRecord]) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, ",resp,reaction_time_ms,block,position,word")?;
        for (i, r) in records.iter().enumerate() {
            writeln!(
                out,
                "{},{},{},{},{},{}",
                i,
                u8::from(r.pressed),
                r.reaction_time_ms,
                r.block + 1,
                r.position,
                csv_field(&r.word)
            )?;
        }
        out.flush()
    }

    fn write_json(path: &Path, summary: &RunSummary, records: &[ResponseRecord]) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, &Report { summary, records })?;
        out.flush()
    }
}

impl PersistenceSink for FileSink {
    /// Both files are written to `.tmp` siblings first and only renamed into
    /// place once both writes succeeded, so a failed persist leaves neither.
    fn persist(&mut self, summary: &RunSummary, records: &[ResponseRecord]) -> io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let participant = &summary.plan.participant;
        let csv = self.csv_path(participant);
        let json = self.json_path(participant);
        let csv_tmp = csv.with_extension("csv.tmp");
        let json_tmp = json.with_extension("json.tmp");

        let written = Self::write_csv(&csv_tmp, records)
            .and_then(|()| Self::write_json(&json_tmp, summary, records));
        if let Err(e) = written {
            discard(&[csv_tmp.as_path(), json_tmp.as_path()]);
            return Err(e);
        }

        fs::rename(&json_tmp, &json)
            .inspect_err(|_| discard(&[csv_tmp.as_path(), json_tmp.as_path()]))?;
        fs::rename(&csv_tmp, &csv)
            .inspect_err(|_| discard(&[csv_tmp.as_path(), json.as_path()]))?;
        debug!(csv = %csv.display(), json = %json.display(), "results written");
        Ok(())
    }
}

fn discard(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "could not remove partial result file");
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Keeps every persisted run in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub writes: Vec<(RunSummary, Vec<ResponseRecord>)>,
}

impl PersistenceSink for MemorySink {
    fn persist(&mut self, summary: &RunSummary, records: &[ResponseRecord]) -> io::Result<()> {
        self.writes.push((summary.clone(), records.to_vec()));
        Ok(())
    }
}

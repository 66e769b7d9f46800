//! External merge sort of heap files.

use log::{debug, info};

use crate::common::config::{DEFAULT_SORT_BUFFER_PAGES, MIN_SORT_BUFFER_PAGES, PAGE_SIZE};
use crate::common::{Error, Result};
use crate::database::Database;
use crate::heap::{HeapFile, HeapScan};

use super::comparator::RecordComparator;
use super::merge::Merger;
use super::schema::{Schema, SortOrder};

/// Name of run `index` produced by merge pass `pass` (pass 0 is run
/// generation) of a sort writing to `output`.
pub fn run_file_name(output: &str, pass: usize, index: usize) -> String {
    format!("{}.sort.temp.{}.{}", output, pass, index)
}

/// What to sort and how much memory it may use.
///
/// # Example
/// ```
/// use extsortdb::sort::{Field, Schema, SortJob, SortOrder};
///
/// let schema = Schema::new(vec![Field::integer(), Field::string(28)])?;
/// let job = SortJob::new("people", "people_by_age", schema, 0)
///     .order(SortOrder::Descending)
///     .buffer_pages(4);
/// assert_eq!(job.buffer_pages, 4);
/// # Ok::<(), extsortdb::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SortJob {
    pub input: String,
    pub output: String,
    pub schema: Schema,
    /// Index of the key field in `schema`.
    pub key_index: usize,
    pub order: SortOrder,
    /// Pages of memory for run generation; merges read `buffer_pages - 1`
    /// inputs at a time.
    pub buffer_pages: usize,
}

impl SortJob {
    pub fn new(input: &str, output: &str, schema: Schema, key_index: usize) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            schema,
            key_index,
            order: SortOrder::Ascending,
            buffer_pages: DEFAULT_SORT_BUFFER_PAGES,
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn buffer_pages(mut self, buffer_pages: usize) -> Self {
        self.buffer_pages = buffer_pages;
        self
    }
}

/// Outcome of a completed sort.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSummary {
    /// Records written to the output file.
    pub records: usize,
    /// Sorted runs produced by run generation.
    pub initial_runs: usize,
    /// Merge passes performed (0 when the input fit in one run).
    pub merge_passes: usize,
    /// Files written by each merge pass, in pass order.
    pub pass_outputs: Vec<usize>,
    /// Most heap file scans a single merge held open at once.
    pub max_open_scans: usize,
}

/// A validated sort job bound to a database.
///
/// # Algorithm
/// ```text
/// input ──scan──▶ [buffer: records_per_run records] ──sort──▶ run 0.0
///                                                            run 0.1
///                                                              ...
/// pass 1: merge groups of M = buffer_pages - 1 runs ──▶ runs 1.x
/// pass 2: ...                                        ──▶ output
/// ```
/// If the whole input fits in one buffer load it is written straight to the
/// output and no merge happens.
pub struct ExternalSort<'db> {
    db: &'db Database,
    job: SortJob,
    comparator: RecordComparator,
    record_len: usize,
    records_per_run: usize,
}

impl<'db> ExternalSort<'db> {
    /// Validate `job` against `db`.
    ///
    /// # Errors
    /// `Configuration` if the key cannot be compared, the budget is under
    /// three pages or too small for one record, or the output name is taken.
    pub fn new(db: &'db Database, job: SortJob) -> Result<Self> {
        let comparator = RecordComparator::new(&job.schema, job.key_index, job.order)?;

        if job.buffer_pages < MIN_SORT_BUFFER_PAGES {
            return Err(Error::Configuration(format!(
                "sort needs at least {} buffer pages, got {}",
                MIN_SORT_BUFFER_PAGES, job.buffer_pages
            )));
        }

        let record_len = job.schema.record_len();
        let records_per_run = job
            .buffer_pages
            .checked_mul(PAGE_SIZE)
            .map(|budget| budget / record_len)
            .ok_or_else(|| {
                Error::Configuration(format!("{} buffer pages is too many", job.buffer_pages))
            })?;
        if records_per_run == 0 {
            return Err(Error::Configuration(format!(
                "{} buffer pages cannot hold a {}-byte record",
                job.buffer_pages, record_len
            )));
        }

        if db.catalog().lookup(&job.output).is_some() {
            return Err(Error::Configuration(format!(
                "output file '{}' already exists",
                job.output
            )));
        }

        Ok(Self {
            db,
            job,
            comparator,
            record_len,
            records_per_run,
        })
    }

    pub fn job(&self) -> &SortJob {
        &self.job
    }

    /// Records held by one buffer load.
    pub fn records_per_run(&self) -> usize {
        self.records_per_run
    }

    /// Merge fan-in.
    pub fn fan_in(&self) -> usize {
        self.job.buffer_pages - 1
    }

    /// Sort the input file into the output file.
    ///
    /// The input is left untouched. On error, run files written so far stay
    /// in the catalog.
    pub fn run(self) -> Result<SortSummary> {
        info!(
            "sorting '{}' into '{}' ({} buffer pages, {} records per run)",
            self.job.input, self.job.output, self.job.buffer_pages, self.records_per_run
        );

        let (runs, records) = self.generate_runs()?;
        let mut summary = SortSummary {
            records,
            initial_runs: runs.len(),
            ..SortSummary::default()
        };

        match runs.len() {
            0 => {
                HeapFile::create(self.db, &self.job.output)?;
            }
            1 => {}
            _ => {
                let merger = Merger::new(self.db, &self.comparator, &self.job.output, self.fan_in());
                let stats = merger.merge_all(runs)?;
                summary.merge_passes = stats.pass_outputs.len();
                summary.pass_outputs = stats.pass_outputs;
                summary.max_open_scans = stats.max_open_scans;
            }
        }

        info!(
            "sorted {} records into '{}': {} runs, {} merge passes",
            summary.records, self.job.output, summary.initial_runs, summary.merge_passes
        );
        Ok(summary)
    }

    /// Pass 0: cut the input into sorted runs.
    ///
    /// Returns the run names and the number of records read. When the input
    /// fits in a single run, that run is the output file.
    fn generate_runs(&self) -> Result<(Vec<String>, usize)> {
        let input = HeapFile::open(self.db, &self.job.input)?;
        let mut scan = input.open_scan();

        let mut buffer = vec![0u8; self.records_per_run * self.record_len];
        let mut lookahead: Option<Vec<u8>> = None;
        let mut runs = Vec::new();
        let mut total = 0usize;

        loop {
            let mut filled = 0usize;
            if let Some(record) = lookahead.take() {
                self.store(&mut buffer, filled, &record);
                filled += 1;
            }

            let mut exhausted = false;
            while filled < self.records_per_run {
                match self.next_record(&mut scan)? {
                    Some(record) => {
                        self.store(&mut buffer, filled, &record);
                        filled += 1;
                    }
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            if filled == 0 {
                break;
            }
            if !exhausted {
                lookahead = self.next_record(&mut scan)?;
                exhausted = lookahead.is_none();
            }

            let name = if runs.is_empty() && exhausted {
                self.job.output.clone()
            } else {
                run_file_name(&self.job.output, 0, runs.len())
            };
            self.write_run(&name, &buffer, filled)?;
            debug!("wrote run '{}' ({} records)", name, filled);

            runs.push(name);
            total += filled;
            if exhausted {
                break;
            }
        }

        Ok((runs, total))
    }

    /// Next input record, `None` at end of input.
    fn next_record(&self, scan: &mut HeapScan<'_, '_>) -> Result<Option<Vec<u8>>> {
        match scan.next().transpose()? {
            Some((_, record)) if record.len() != self.record_len => Err(Error::BadRecordPointer {
                expected: self.record_len,
                actual: record.len(),
            }),
            Some((_, record)) => Ok(Some(record)),
            None => Ok(None),
        }
    }

    fn store(&self, buffer: &mut [u8], index: usize, record: &[u8]) {
        let at = index * self.record_len;
        buffer[at..at + self.record_len].copy_from_slice(record);
    }

    /// Sort the first `count` records of `buffer` and write them to `name`.
    fn write_run(&self, name: &str, buffer: &[u8], count: usize) -> Result<()> {
        let record = |i: usize| &buffer[i * self.record_len..(i + 1) * self.record_len];

        let mut order: Vec<usize> = (0..count).collect();
        order.sort_unstable_by(|&a, &b| self.comparator.compare(record(a), record(b)));

        let run = HeapFile::create(self.db, name)?;
        for i in order {
            run.insert(record(i))?;
        }
        Ok(())
    }
}

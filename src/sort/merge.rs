//! Bounded fan-in k-way merging of sorted runs.

use log::{debug, warn};

use crate::common::{Error, Result};
use crate::database::Database;
use crate::heap::{HeapFile, HeapScan};

use super::comparator::RecordComparator;
use super::external_sort::run_file_name;

/// Counters from a sequence of merge passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MergeStats {
    /// Destinations written by each pass.
    pub pass_outputs: Vec<usize>,
    pub max_open_scans: usize,
}

/// One merge input: an open scan plus its current record.
struct MergeSource<'a, 'db> {
    scan: HeapScan<'a, 'db>,
    current: Option<Vec<u8>>,
}

impl<'a, 'db> MergeSource<'a, 'db> {
    fn open(file: &'a HeapFile<'db>) -> Result<Self> {
        let mut scan = file.open_scan();
        let current = Self::fetch(&mut scan)?;
        Ok(Self { scan, current })
    }

    fn fetch(scan: &mut HeapScan<'a, 'db>) -> Result<Option<Vec<u8>>> {
        Ok(scan.next().transpose()?.map(|(_, record)| record))
    }

    /// Hand out the current record and read the next one.
    fn advance(&mut self) -> Result<Option<Vec<u8>>> {
        let next = Self::fetch(&mut self.scan)?;
        Ok(std::mem::replace(&mut self.current, next))
    }
}

/// Repeatedly merges groups of at most `fan_in` runs until one file, named
/// `output`, remains.
pub(crate) struct Merger<'a, 'db> {
    db: &'db Database,
    comparator: &'a RecordComparator,
    output: &'a str,
    fan_in: usize,
}

impl<'a, 'db> Merger<'a, 'db> {
    pub(crate) fn new(
        db: &'db Database,
        comparator: &'a RecordComparator,
        output: &'a str,
        fan_in: usize,
    ) -> Self {
        debug_assert!(fan_in >= 2);
        Self {
            db,
            comparator,
            output,
            fan_in,
        }
    }

    /// Merge `runs` down to the output file, deleting each run once it has
    /// been consumed.
    ///
    /// # Errors
    /// `Configuration` if `runs` is empty.
    pub(crate) fn merge_all(&self, mut runs: Vec<String>) -> Result<MergeStats> {
        if runs.is_empty() {
            return Err(Error::Configuration("nothing to merge".into()));
        }
        if runs.len() == 1 {
            warn!(
                "merging a single run '{}' by itself; it is copied to '{}'",
                runs[0], self.output
            );
        }

        let mut stats = MergeStats::default();
        let mut pass = 0;
        loop {
            pass += 1;
            let last_pass = runs.len() <= self.fan_in;

            let mut written = Vec::with_capacity(runs.len().div_ceil(self.fan_in));
            for (group, sources) in runs.chunks(self.fan_in).enumerate() {
                let dest = if last_pass {
                    self.output.to_string()
                } else {
                    run_file_name(self.output, pass, group)
                };
                let open_scans = self.merge_group(sources, &dest)?;
                stats.max_open_scans = stats.max_open_scans.max(open_scans);
                written.push(dest);
            }

            debug!(
                "merge pass {}: {} runs into {} files",
                pass,
                runs.len(),
                written.len()
            );
            stats.pass_outputs.push(written.len());
            runs = written;

            if last_pass {
                break;
            }
        }
        Ok(stats)
    }

    /// Merge the runs named by `sources` into a new file `dest`, then delete
    /// the sources. Returns how many scans were open at once.
    fn merge_group(&self, sources: &[String], dest: &str) -> Result<usize> {
        let mut inputs = sources
            .iter()
            .map(|name| HeapFile::open(self.db, name))
            .collect::<Result<Vec<_>>>()?;
        let output = HeapFile::create(self.db, dest)?;

        let (written, open_scans) = {
            let mut heads = inputs
                .iter()
                .map(MergeSource::open)
                .collect::<Result<Vec<_>>>()?;

            let mut written = 0usize;
            while let Some(winner) = self.pick_min(&heads) {
                if let Some(record) = heads[winner].advance()? {
                    output.insert(&record)?;
                    written += 1;
                }
            }
            (written, heads.len())
        };

        for input in &mut inputs {
            input.delete_file()?;
        }
        debug!(
            "merged {} runs into '{}' ({} records)",
            sources.len(),
            dest,
            written
        );
        Ok(open_scans)
    }

    /// Source with the least current record; the lowest index wins ties.
    fn pick_min(&self, heads: &[MergeSource<'_, '_>]) -> Option<usize> {
        let mut best: Option<(usize, &[u8])> = None;
        for (i, head) in heads.iter().enumerate() {
            let Some(record) = head.current.as_deref() else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, least)) => self.comparator.compare(record, least).is_lt(),
            };
            if better {
                best = Some((i, record));
            }
        }
        best.map(|(i, _)| i)
    }
}

// Proteome k-mer counting.
//
// This module turns one FASTA proteome file into the dense count arrays the
// stochastic transform consumes. A rolling (LEN-1)-residue window, kept as a
// base-AA_NUMBER integer, indexes the `second` array; appending the next
// residue to it indexes the LEN-mer `vector`.
//
// `second` is bumped both for the initial prefix of every record and on every
// rolling step, so it accumulates `total + complement` entries overall. That
// double count is intentional: it is the denominator the stochastic model
// divides by.

use bio::io::fasta;
use std::io;
use std::path::Path;

use crate::encoding::{encode, AA_NUMBER, LEN, M, M1, M2};
use crate::error::{PhylosigError, Result};
use crate::utils;

/// Dense per-genome counts produced by one pass over a proteome file.
pub struct RawCounts {
    /// Single-residue counts.
    pub one: [i64; AA_NUMBER],
    /// (LEN-1)-mer counts, length M1.
    pub second: Vec<i64>,
    /// LEN-mer counts, length M.
    pub vector: Vec<i64>,
    /// Number of LEN-mers observed (sum of `vector`).
    pub total: i64,
    /// Number of residues observed (sum of `one`).
    pub total_l: i64,
    /// Number of records whose initial window was counted into `second`.
    pub complement: i64,
}

impl RawCounts {
    fn new() -> Self {
        RawCounts {
            one: [0; AA_NUMBER],
            second: vec![0; M1],
            vector: vec![0; M],
            total: 0,
            total_l: 0,
            complement: 0,
        }
    }
}

/// Counts one proteome file into a [`RawCounts`].
pub struct ProteomeCounter {
    counts: RawCounts,
    /// Rolling (LEN-1)-mer window as a base-AA_NUMBER integer, in [0, M1).
    window: usize,
}

impl ProteomeCounter {
    fn new() -> Self {
        ProteomeCounter {
            counts: RawCounts::new(),
            window: 0,
        }
    }

    /// Parse `path` and return its dense counts.
    ///
    /// FASTA record headers are discarded; record bodies are residue letters
    /// with line breaks already stripped by the reader. A record body shorter
    /// than the initial (LEN-1)-residue window ends the file. Any body byte
    /// without a residue code is a fatal [`PhylosigError::InvalidResidue`].
    pub fn count_from_file(path: &Path) -> Result<RawCounts> {
        let reader = utils::open_proteome(path)?;
        let mut counter = ProteomeCounter::new();

        for result in fasta::Reader::new(reader).records() {
            let record = result.map_err(io_error)?;
            if !counter.push_record(path, record.seq())? {
                break;
            }
        }

        Ok(counter.counts)
    }

    /// Count one record body. Returns false when the body is too short to
    /// seed the window, which ends the file.
    fn push_record(&mut self, path: &Path, seq: &[u8]) -> Result<bool> {
        if seq.len() < LEN - 1 {
            return Ok(false);
        }
        self.init_window(path, &seq[..LEN - 1])?;
        for &ch in &seq[LEN - 1..] {
            self.extend(path, ch)?;
        }
        Ok(true)
    }

    /// Seed the rolling window from the first LEN-1 residues of a record.
    fn init_window(&mut self, path: &Path, prefix: &[u8]) -> Result<()> {
        self.counts.complement += 1;
        self.window = 0;
        for &ch in prefix {
            let enc = residue(path, ch)?;
            self.counts.one[enc] += 1;
            self.counts.total_l += 1;
            self.window = self.window * AA_NUMBER + enc;
        }
        self.counts.second[self.window] += 1;
        Ok(())
    }

    /// Roll the window over one more residue.
    fn extend(&mut self, path: &Path, ch: u8) -> Result<()> {
        let enc = residue(path, ch)?;
        self.counts.one[enc] += 1;
        self.counts.total_l += 1;
        let index = self.window * AA_NUMBER + enc;
        self.counts.vector[index] += 1;
        self.counts.total += 1;
        self.window = (self.window % M2) * AA_NUMBER + enc;
        self.counts.second[self.window] += 1;
        Ok(())
    }
}

/// Map a body byte to its residue code, rejecting anything the table has no
/// code for. Non-letters never reach `encode`.
#[inline]
fn residue(path: &Path, ch: u8) -> Result<usize> {
    if ch.is_ascii_uppercase() {
        let enc = encode(ch);
        if enc >= 0 {
            return Ok(enc as usize);
        }
    }
    Err(PhylosigError::InvalidResidue {
        path: path.to_path_buf(),
        byte: ch,
    })
}

fn io_error(e: impl std::error::Error + Send + Sync + 'static) -> PhylosigError {
    PhylosigError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
}

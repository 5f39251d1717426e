// Stochastic deviation signatures.
//
// The transform sweeps the full LEN-mer index space once, comparing each
// observed count against the expectation of a second-order Markov model
// built from the two overlapping (LEN-1)-mer distributions, and keeps the
// relative deviations that are non-zero. The sweep is memory-bound, so each
// index is decomposed with carried counters instead of fresh div/mod.

use rayon::prelude::*;

use crate::counts::RawCounts;
use crate::encoding::{AA_NUMBER, EPSILON, M1};

/// Indices swept per rayon task. The sweep is bandwidth-bound; coarse
/// chunks keep the scheduling overhead negligible.
const SWEEP_CHUNK: usize = 4_000_000;

/// Sparse deviation signature of one genome.
///
/// `ti` holds strictly ascending LEN-mer indices, `tv` the deviation at
/// each. Equal lengths by construction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Signature {
    pub ti: Vec<u32>,
    pub tv: Vec<f64>,
}

impl Signature {
    pub fn len(&self) -> usize {
        self.ti.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ti.is_empty()
    }
}

/// Collapse dense counts into a sparse signature, consuming them.
///
/// For index `i` the expected count is
/// `(p_two[i / AA] * p_one[i % AA] + p_two[i % M1] * p_one[i / M1]) * total / 2`
/// and the emitted value is the relative deviation `(observed - E) / E`.
/// Expectations at or below EPSILON and deviations of exactly zero are
/// dropped; an unobserved k-mer with a positive expectation keeps its -1.
pub fn transform(counts: RawCounts) -> Signature {
    let RawCounts {
        one,
        second,
        vector,
        total,
        total_l,
        complement,
    } = counts;

    if total_l == 0 {
        return Signature::default();
    }

    let total_plus_complement = (total + complement) as f64;
    let half_total = total as f64 * 0.5;

    let mut p_one = [0.0f64; AA_NUMBER];
    for (p, &n) in p_one.iter_mut().zip(one.iter()) {
        *p = n as f64 / total_l as f64;
    }

    let p_two: Vec<f64> = second
        .iter()
        .map(|&n| n as f64 / total_plus_complement)
        .collect();
    drop(second);

    let parts: Vec<(Vec<u32>, Vec<f64>)> = vector
        .par_chunks(SWEEP_CHUNK)
        .enumerate()
        .map(|(chunk, observed)| {
            sweep_range(chunk * SWEEP_CHUNK, observed, &p_one, &p_two, half_total)
        })
        .collect();
    drop(vector);

    let count = parts.iter().map(|(ti, _)| ti.len()).sum();
    let mut sig = Signature {
        ti: Vec::with_capacity(count),
        tv: Vec::with_capacity(count),
    };
    for (ti, tv) in parts {
        sig.ti.extend_from_slice(&ti);
        sig.tv.extend_from_slice(&tv);
    }
    sig
}

/// Sweep one contiguous index range, emitting (index, deviation) pairs in
/// ascending order. The four decomposition counters are seeded from the
/// range start and then carried, so the inner loop has no division.
fn sweep_range(
    start: usize,
    observed: &[i64],
    p_one: &[f64; AA_NUMBER],
    p_two: &[f64],
    half_total: f64,
) -> (Vec<u32>, Vec<f64>) {
    let mut ti = Vec::new();
    let mut tv = Vec::new();

    let mut i_mod_aa = start % AA_NUMBER;
    let mut i_div_aa = start / AA_NUMBER;
    let mut i_mod_m1 = start % M1;
    let mut i_div_m1 = start / M1;

    for (offset, &count) in observed.iter().enumerate() {
        let expected =
            (p_two[i_div_aa] * p_one[i_mod_aa] + p_two[i_mod_m1] * p_one[i_div_m1]) * half_total;

        if i_mod_aa == AA_NUMBER - 1 {
            i_mod_aa = 0;
            i_div_aa += 1;
        } else {
            i_mod_aa += 1;
        }
        if i_mod_m1 == M1 - 1 {
            i_mod_m1 = 0;
            i_div_m1 += 1;
        } else {
            i_mod_m1 += 1;
        }

        if expected > EPSILON {
            let deviation = (count as f64 - expected) / expected;
            if deviation != 0.0 {
                ti.push((start + offset) as u32);
                tv.push(deviation);
            }
        }
    }

    (ti, tv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counts::ProteomeCounter;
    use crate::encoding::M;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Letters with a residue code; excludes the 'J'/'O' sentinels.
    const RESIDUES: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

    fn counts_of(body: &str) -> RawCounts {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.faa");
        std::fs::write(&path, body).unwrap();
        ProteomeCounter::count_from_file(&path).unwrap()
    }

    fn random_proteome(seed: u64, n_residues: usize) -> String {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut body = String::from(">random\n");
        for i in 0..n_residues {
            body.push(RESIDUES[rng.gen_range(0..RESIDUES.len())] as char);
            if i % 70 == 69 {
                body.push('\n');
            }
        }
        body.push('\n');
        body
    }

    #[test]
    fn minimal_record_has_empty_signature() {
        // Seven 'A's: the lone observed 6-mer matches its expectation
        // exactly, so its deviation is zero and nothing survives.
        let sig = transform(counts_of(">hdr\nAAAAAAA\n"));
        assert!(sig.is_empty());
    }

    #[test]
    fn empty_input_has_empty_signature() {
        let sig = transform(counts_of(""));
        assert!(sig.is_empty());
    }

    #[test]
    fn indices_strictly_ascending() {
        let sig = transform(counts_of(&random_proteome(7, 4000)));
        assert!(!sig.is_empty());
        assert_eq!(sig.ti.len(), sig.tv.len());
        for w in sig.ti.windows(2) {
            assert!(w[0] < w[1]);
        }
        assert!((*sig.ti.last().unwrap() as usize) < M);
    }

    #[test]
    fn unobserved_kmer_with_expectation_keeps_minus_one() {
        // Hand-built counts: residue 0 dominates, residue 1 appears in the
        // single-residue model only. Index 1 then has a positive
        // expectation but a zero observed count.
        let mut c = RawCounts {
            one: [0; AA_NUMBER],
            second: vec![0; M1],
            vector: vec![0; M],
            total: 2,
            total_l: 10,
            complement: 1,
        };
        c.one[0] = 8;
        c.one[1] = 2;
        c.second[0] = 3;
        c.vector[0] = 2;

        let sig = transform(c);
        // Index M1 also carries an expectation: its (LEN-1)-suffix is 0
        // (p_two = 1) and its first residue is 1 (p_one = 0.2).
        assert_eq!(sig.ti, vec![0, 1, M1 as u32]);
        // index 0: E = (1*0.8 + 1*0.8) * 1 = 1.6, observed 2 -> 0.25
        assert!((sig.tv[0] - 0.25).abs() < 1e-12);
        // index 1: E = (1*0.2 + 0*0.8) * 1 = 0.2, observed 0 -> -1
        assert_eq!(sig.tv[1], -1.0);
        assert_eq!(sig.tv[2], -1.0);
    }

    #[test]
    fn carried_counters_match_direct_decomposition() {
        // Sweep a range that straddles both carry boundaries and check the
        // emitted deviations against a direct div/mod evaluation.
        let start = M1 - 2 * AA_NUMBER - 3;
        let observed = vec![1i64; 4 * AA_NUMBER];
        let mut p_one = [0.0; AA_NUMBER];
        for (a, p) in p_one.iter_mut().enumerate() {
            *p = (a + 1) as f64 / 300.0;
        }
        let p_two: Vec<f64> = (0..M1).map(|s| ((s % 97) + 1) as f64 / 1e4).collect();

        let (ti, tv) = sweep_range(start, &observed, &p_one, &p_two, 50.0);
        assert!(!ti.is_empty());
        for (&i, &d) in ti.iter().zip(tv.iter()) {
            let i = i as usize;
            let e = (p_two[i / AA_NUMBER] * p_one[i % AA_NUMBER]
                + p_two[i % M1] * p_one[i / M1])
                * 50.0;
            assert!(e > EPSILON);
            assert!((d - (1.0 - e) / e).abs() < 1e-12, "index {i}");
        }
    }
}

// Cosine correlation of two sparse signatures.

use crate::signature::Signature;

/// Correlation between two signatures in [-1, 1].
///
/// Walks both sorted index lists at once: the squared norms accumulate over
/// every index present in either operand, the dot product only where both
/// hit the same index. Returns 0.0 if either operand is empty.
pub fn compare(a: &Signature, b: &Signature) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    let mut p = 0;
    let mut q = 0;

    while p < a.len() && q < b.len() {
        let na = a.ti[p];
        let nb = b.ti[q];
        if na < nb {
            let t = a.tv[p];
            norm_a += t * t;
            p += 1;
        } else if nb < na {
            let t = b.tv[q];
            norm_b += t * t;
            q += 1;
        } else {
            let ta = a.tv[p];
            let tb = b.tv[q];
            norm_a += ta * ta;
            norm_b += tb * tb;
            dot += ta * tb;
            p += 1;
            q += 1;
        }
    }
    while p < a.len() {
        let t = a.tv[p];
        norm_a += t * t;
        p += 1;
    }
    while q < b.len() {
        let t = b.tv[q];
        norm_b += t * t;
        q += 1;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

//! Convergence verification.
//!
//! Once both parties have drained their queues, they can check they hold the
//! same document by comparing digests instead of full text.

use docshare_core::DocumentDigest;

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both parties hold identical text.
    Converged,
    /// The texts differ.
    Diverged {
        local: DocumentDigest,
        remote: DocumentDigest,
    },
}

impl ConvergenceResult {
    /// Check if the parties have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare our text against the digest the peer reported.
pub fn verify_convergence(local_text: &str, remote: &DocumentDigest) -> ConvergenceResult {
    let local = DocumentDigest::of(local_text);
    if &local == remote {
        ConvergenceResult::Converged
    } else {
        ConvergenceResult::Diverged {
            local,
            remote: *remote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_converges() {
        let remote = DocumentDigest::of("YhelloX");
        assert!(verify_convergence("YhelloX", &remote).is_converged());
    }

    #[test]
    fn test_different_text_diverges() {
        let remote = DocumentDigest::of("XhelloY");
        let result = verify_convergence("YhelloX", &remote);
        assert_eq!(
            result,
            ConvergenceResult::Diverged {
                local: DocumentDigest::of("YhelloX"),
                remote,
            }
        );
    }
}

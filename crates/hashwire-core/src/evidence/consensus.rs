//! Cross-source agreement for extracted values.

use crate::domain::EvidenceSource;

/// Default relative tolerance for two values to count as agreeing.
pub const DEFAULT_TOLERANCE: f64 = 0.15;

/// A value read from one document (or from a generated answer citing one).
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: f64,
    pub source: EvidenceSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    pub value: f64,
    pub sources: Vec<EvidenceSource>,
}

/// `|a - b| <= tolerance * max(|a|, |b|)`.
pub fn agrees(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs())
}

/// Largest cluster of candidates from at least two distinct sites in which
/// every pair of values agrees. Each cluster is grown greedily from an anchor
/// that always belongs to it. Ties go to the tighter cluster, then to the
/// earlier anchor. The consensus value is the cluster mean and sources keep
/// candidate order.
pub fn find_consensus(candidates: &[Candidate], tolerance: f64) -> Option<Consensus> {
    let mut best: Option<(Vec<usize>, f64)> = None;

    for (anchor, _) in candidates.iter().enumerate() {
        let mut members: Vec<usize> = vec![anchor];
        for (i, candidate) in candidates.iter().enumerate() {
            if i == anchor {
                continue;
            }
            let fits = members.iter().all(|&m| {
                let member = &candidates[m];
                member.source.site != candidate.source.site
                    && agrees(member.value, candidate.value, tolerance)
            });
            if fits {
                members.push(i);
            }
        }
        if members.len() < 2 {
            continue;
        }
        members.sort_unstable();

        let spread = spread(candidates, &members);
        let better = match &best {
            None => true,
            Some((current, current_spread)) => {
                members.len() > current.len()
                    || (members.len() == current.len() && spread < *current_spread)
            }
        };
        if better {
            best = Some((members, spread));
        }
    }

    best.map(|(members, _)| Consensus {
        value: members.iter().map(|&i| candidates[i].value).sum::<f64>() / members.len() as f64,
        sources: members.iter().map(|&i| candidates[i].source.clone()).collect(),
    })
}

fn spread(candidates: &[Candidate], members: &[usize]) -> f64 {
    let (min, max) = members
        .iter()
        .map(|&i| candidates[i].value)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(value: f64, url: &str) -> Candidate {
        Candidate {
            value,
            source: EvidenceSource::new("doc", url, None),
        }
    }

    #[test]
    fn test_agreeing_pair_wins_over_outlier() {
        let candidates = [
            cand(1.4, "https://a.example/1"),
            cand(1.45, "https://b.example/2"),
            cand(2.5, "https://c.example/3"),
        ];
        let consensus = find_consensus(&candidates, DEFAULT_TOLERANCE).unwrap();
        assert!((consensus.value - 1.425).abs() < 1e-9);
        let sites: Vec<_> = consensus.sources.iter().map(|s| s.site.as_str()).collect();
        assert_eq!(sites, vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_same_site_does_not_count_twice() {
        let candidates = [
            cand(1.4, "https://a.example/1"),
            cand(1.41, "https://a.example/2"),
        ];
        assert!(find_consensus(&candidates, DEFAULT_TOLERANCE).is_none());
    }

    #[test]
    fn test_no_agreement() {
        let candidates = [
            cand(20.0, "https://a.example"),
            cand(60.0, "https://b.example"),
        ];
        assert!(find_consensus(&candidates, DEFAULT_TOLERANCE).is_none());
        assert!(find_consensus(&[], DEFAULT_TOLERANCE).is_none());
    }

    #[test]
    fn test_larger_cluster_preferred() {
        let candidates = [
            cand(50.0, "https://a.example"),
            cand(52.0, "https://b.example"),
            cand(30.0, "https://c.example"),
            cand(31.0, "https://d.example"),
            cand(30.5, "https://e.example"),
        ];
        let consensus = find_consensus(&candidates, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(consensus.sources.len(), 3);
        assert!((consensus.value - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_members_agree_pairwise() {
        // 86 and 115 each agree with 100 but not with each other.
        let candidates = [
            cand(86.0, "https://a.example"),
            cand(100.0, "https://b.example"),
            cand(115.0, "https://c.example"),
        ];
        let consensus = find_consensus(&candidates, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(consensus.sources.len(), 2);
        assert!((consensus.value - 93.0).abs() < 1e-9);
        let sites: Vec<_> = consensus.sources.iter().map(|s| s.site.as_str()).collect();
        assert_eq!(sites, vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_second_reading_from_member_site_is_skipped() {
        let candidates = [
            cand(1.40, "https://a.example/1"),
            cand(1.44, "https://a.example/2"),
            cand(1.42, "https://b.example/1"),
        ];
        let consensus = find_consensus(&candidates, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(consensus.sources.len(), 2);
        let sites: Vec<_> = consensus.sources.iter().map(|s| s.site.as_str()).collect();
        assert_eq!(sites, vec!["a.example", "b.example"]);
        assert!(find_consensus(&candidates[..2], DEFAULT_TOLERANCE).is_none());
    }

    #[test]
    fn test_agrees_is_symmetric() {
        assert!(agrees(100.0, 115.0, 0.15));
        assert!(agrees(115.0, 100.0, 0.15));
        assert!(!agrees(100.0, 120.0, 0.15));
    }
}

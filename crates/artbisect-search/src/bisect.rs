use anyhow::Result;

/// Monotone binary search over the half-open range `[start, end)`.
///
/// Assumes `probe(i)` is true for all `i < k` and false for all `i >= k` for
/// some unknown cutoff `k` in `[start, end]`, and returns `k`. The assumption
/// is not validated: if the system under test is not monotone, the result is
/// whatever cutoff the probes at the visited midpoints induce.
pub fn binary_search<F>(mut start: usize, mut end: usize, mut probe: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<bool>,
{
    while start < end {
        let mid = start + (end - start) / 2;
        if probe(mid)? {
            start = mid + 1;
        } else {
            end = mid;
        }
    }
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::binary_search;

    #[test]
    fn finds_every_cutoff_including_bounds() {
        for n in 0..=9usize {
            for k in 0..=n {
                let found = binary_search(0, n, |i| Ok(i < k)).expect("search");
                assert_eq!(found, k, "n={n} k={k}");
            }
        }
    }

    #[test]
    fn probe_count_is_logarithmic() {
        let n = 1024usize;
        let mut calls = 0usize;
        binary_search(0, n, |i| {
            calls += 1;
            Ok(i < 700)
        })
        .expect("search");
        assert!(calls <= 11, "probes: {calls}");
    }

    #[test]
    fn empty_range_returns_start() {
        let found = binary_search(3, 3, |_| panic!("no probes expected")).expect("search");
        assert_eq!(found, 3);
    }

    #[test]
    fn probe_errors_propagate() {
        let err = binary_search(0, 8, |_| anyhow::bail!("probe exploded"));
        assert!(err.is_err());
    }
}

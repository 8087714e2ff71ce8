/// Returns `true` if `xs` holds every value in `1..=xs.len()` exactly once
///
/// # Example
///
/// ```rust
/// # use mallows_utils::is_permutation;
/// assert!(is_permutation(&[2, 3, 1]));
/// assert!(!is_permutation(&[2, 2, 1]));
/// assert!(!is_permutation(&[0, 1, 2]));
/// ```
pub fn is_permutation(xs: &[u32]) -> bool {
    let n = xs.len();
    let mut seen = vec![false; n];
    xs.iter().all(|&x| {
        let ix = x as usize;
        if ix == 0 || ix > n || seen[ix - 1] {
            false
        } else {
            seen[ix - 1] = true;
            true
        }
    })
}

/// The identity ranking `[1, 2, ..., n]`
pub fn identity(n: usize) -> Vec<u32> {
    (1..=n as u32).collect()
}

/// Invert a ranking: `order[r - 1]` is the (0-based) item holding rank `r`.
pub fn inverse(ranking: &[u32]) -> Vec<usize> {
    let mut order = vec![0; ranking.len()];
    ranking.iter().enumerate().for_each(|(item, &r)| {
        order[r as usize - 1] = item;
    });
    order
}

use rand::Rng;

/// Draw one index from the (not necessarily normalized) weights in `weights`
///
/// # Example
///
/// ```rust
/// # use mallows_utils::pflip;
/// let mut rng = rand::thread_rng();
/// let ix = pflip(&[0.0, 1.0, 0.0], &mut rng);
/// assert_eq!(ix, 1);
/// ```
pub fn pflip<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    assert!(!weights.is_empty(), "Empty container");
    let total: f64 = weights.iter().sum();
    let r: f64 = rng.gen::<f64>() * total;

    let mut acc = 0.0;
    for (ix, w) in weights.iter().enumerate() {
        acc += w;
        if r < acc {
            return ix;
        }
    }
    // r can only reach the total through floating point error; pick the last
    // entry carrying mass.
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(weights.len() - 1)
}

/// Draw one index from un-normalized log weights
pub fn ln_pflip<R: Rng>(ln_weights: &[f64], rng: &mut R) -> usize {
    let maxval = ln_weights
        .iter()
        .fold(f64::NEG_INFINITY, |max, &x| max.max(x));
    let weights: Vec<f64> =
        ln_weights.iter().map(|&w| (w - maxval).exp()).collect();
    pflip(&weights, rng)
}

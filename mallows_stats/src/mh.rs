use rand::Rng;

/// Metropolis-Hastings acceptance: accept with probability
/// `min(1, exp(ln_ratio))`.
///
/// A non-finite ratio is accepted only if it is positive infinity.
pub fn mh_accept<R: Rng>(ln_ratio: f64, rng: &mut R) -> bool {
    if ln_ratio.is_nan() {
        return false;
    }
    let r: f64 = rng.gen::<f64>();
    r.ln() < ln_ratio
}

/// The log ratio of `Gamma(shape, rate)` densities at `x_new` and `x_old`
///
/// # Example
///
/// ```rust
/// # use mallows_stats::mh::ln_gamma_ratio;
/// // Gamma(1, rate) is an exponential distribution
/// let r = ln_gamma_ratio(2.0, 1.0, 1.0, 0.5);
/// assert!((r + 0.5).abs() < 1E-12);
/// ```
pub fn ln_gamma_ratio(x_new: f64, x_old: f64, shape: f64, rate: f64) -> f64 {
    (shape - 1.0).mul_add(x_new.ln() - x_old.ln(), -rate * (x_new - x_old))
}

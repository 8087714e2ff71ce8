use std::collections::HashSet;
use std::ops::AddAssign;

/// Cumulative sum of `xs`
#[inline]
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Clone,
{
    let mut summed: Vec<T> = xs.to_vec();
    for i in 1..xs.len() {
        let l = summed[i - 1].clone();
        summed[i] += l;
    }
    summed
}

#[inline]
fn max_f64(xs: &[f64]) -> f64 {
    xs.iter().fold(f64::NEG_INFINITY, |max, &x| max.max(x))
}

/// Numerically stable `log(sum(exp(xs))`
#[inline]
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        panic!("Empty container");
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = max_f64(xs);
        if maxval == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        xs.iter()
            .fold(0.0_f64, |acc, x| acc + (x - maxval).exp())
            .ln()
            + maxval
    }
}

/// Numerically stable `log(mean(exp(xs))`
///
/// # Example
///
/// ```rust
/// # use mallows_utils::log_mean_exp;
/// let xs = vec![-1000.0, -1000.0];
/// assert!((log_mean_exp(&xs) + 1000.0).abs() < 1E-12);
/// ```
#[inline]
pub fn log_mean_exp(xs: &[f64]) -> f64 {
    logsumexp(xs) - (xs.len() as f64).ln()
}

/// Normalize log weights so that `exp` of the output sums to one (the log
/// softmax).
#[inline]
pub fn ln_normalize(xs: &[f64]) -> Vec<f64> {
    let z = logsumexp(xs);
    xs.iter().map(|x| x - z).collect()
}

/// The mean of a slice of f64
pub fn mean(xs: &[f64]) -> f64 {
    let n: f64 = xs.len() as f64;
    xs.iter().fold(0.0, |acc, x| x + acc) / n
}

/// The unbiased (n - 1) sample variance of a slice of f64. Zero for fewer
/// than two values.
pub fn var(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let n: f64 = xs.len() as f64;
    let m = mean(xs);
    let v = xs.iter().fold(0.0, |acc, x| (x - m).mul_add(x - m, acc));
    v / (n - 1.0)
}

/// The sample standard deviation of a slice of f64
pub fn std_dev(xs: &[f64]) -> f64 {
    var(xs).sqrt()
}

/// Number of bitwise-distinct values in `xs`
pub fn n_unique_f64(xs: &[f64]) -> usize {
    xs.iter().map(|x| x.to_bits()).collect::<HashSet<u64>>().len()
}

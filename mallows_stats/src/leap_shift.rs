//! The leap-and-shift proposal on rankings
use rand::Rng;

/// A proposed ranking with the log probabilities of reaching it from the
/// current ranking (forward) and of returning (backward)
#[derive(Clone, Debug, PartialEq)]
pub struct LeapShift {
    pub ranking: Vec<u32>,
    pub ln_forward: f64,
    pub ln_backward: f64,
}

impl LeapShift {
    /// `ln q(current | proposed) - ln q(proposed | current)`, the proposal
    /// correction in the Metropolis-Hastings ratio
    pub fn ln_correction(&self) -> f64 {
        self.ln_backward - self.ln_forward
    }
}

/// Number of ranks within `leap_size` of `rank`, excluding `rank` itself
fn support_size(rank: u32, leap_size: u32, n_items: u32) -> u32 {
    let lower = rank.saturating_sub(leap_size).max(1);
    let upper = (rank + leap_size).min(n_items);
    upper - lower
}

fn ln_move_probability(
    from: u32,
    to: u32,
    leap_size: u32,
    n_items: u32,
) -> f64 {
    let mut p = 1.0 / f64::from(support_size(from, leap_size, n_items));
    if from.abs_diff(to) == 1 {
        // the same ranking is reached by moving the neighbour the other way
        p += 1.0 / f64::from(support_size(to, leap_size, n_items));
    }
    (p / f64::from(n_items)).ln()
}

/// Pick an item uniformly, move it to a rank at most `leap_size` away, and
/// shift the items in between by one to keep a permutation.
///
/// Rankings with fewer than two items, or a zero leap, are returned as is
/// with zero log probabilities.
///
/// # Example
///
/// ```rust
/// # use mallows_stats::leap_and_shift;
/// use rand::SeedableRng;
///
/// let mut rng = rand_xoshiro::Xoshiro256Plus::seed_from_u64(1);
/// let proposal = leap_and_shift(&[1, 2, 3, 4], 1, &mut rng);
/// let mut sorted = proposal.ranking.clone();
/// sorted.sort();
/// assert_eq!(sorted, vec![1, 2, 3, 4]);
/// // single-step moves are symmetric
/// assert_eq!(proposal.ln_correction(), 0.0);
/// ```
pub fn leap_and_shift<R: Rng>(
    ranking: &[u32],
    leap_size: usize,
    rng: &mut R,
) -> LeapShift {
    let n_items = ranking.len() as u32;
    let leap_size = leap_size.min(ranking.len()) as u32;
    if n_items < 2 || leap_size == 0 {
        return LeapShift {
            ranking: ranking.to_vec(),
            ln_forward: 0.0,
            ln_backward: 0.0,
        };
    }

    let item = rng.gen_range(0..ranking.len());
    let from = ranking[item];
    let lower = from.saturating_sub(leap_size).max(1);
    let upper = (from + leap_size).min(n_items);
    // draw from [lower, upper] without `from`
    let to = {
        let draw = rng.gen_range(lower..upper);
        if draw >= from {
            draw + 1
        } else {
            draw
        }
    };

    let proposed: Vec<u32> = ranking
        .iter()
        .enumerate()
        .map(|(ix, &r)| {
            if ix == item {
                to
            } else if from < to && from < r && r <= to {
                r - 1
            } else if to < from && to <= r && r < from {
                r + 1
            } else {
                r
            }
        })
        .collect();

    LeapShift {
        ranking: proposed,
        ln_forward: ln_move_probability(from, to, leap_size, n_items),
        ln_backward: ln_move_probability(to, from, leap_size, n_items),
    }
}

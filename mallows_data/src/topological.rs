use thiserror::Error;

/// Errors from enumerating the rankings consistent with pairwise preferences
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologicalSortError {
    #[error("item {item} is out of range for {n_items} items")]
    ItemOutOfRange { item: usize, n_items: usize },
    #[error("item {0} is preferred to itself")]
    SelfPreference(usize),
    #[error("the preferences contain a cycle")]
    Cycle,
    #[error("more than {0} rankings are consistent with the preferences")]
    TooManySorts(usize),
}

struct Dag {
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl Dag {
    fn new(
        n_items: usize,
        preferences: &[(usize, usize)],
    ) -> Result<Self, TopologicalSortError> {
        let mut successors = vec![Vec::new(); n_items];
        let mut in_degree = vec![0; n_items];
        for &(top, bottom) in preferences {
            for item in [top, bottom] {
                if item >= n_items {
                    return Err(TopologicalSortError::ItemOutOfRange {
                        item,
                        n_items,
                    });
                }
            }
            if top == bottom {
                return Err(TopologicalSortError::SelfPreference(top));
            }
            // repeated preferences carry no extra information
            if !successors[top].contains(&bottom) {
                successors[top].push(bottom);
                in_degree[bottom] += 1;
            }
        }
        Ok(Self {
            successors,
            in_degree,
        })
    }

    /// Kahn's algorithm: the graph is acyclic iff every item can be removed
    fn is_acyclic(&self) -> bool {
        let mut in_degree = self.in_degree.clone();
        let mut ready: Vec<usize> = (0..in_degree.len())
            .filter(|&ix| in_degree[ix] == 0)
            .collect();
        let mut n_removed = 0;
        while let Some(item) = ready.pop() {
            n_removed += 1;
            for &succ in &self.successors[item] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.push(succ);
                }
            }
        }
        n_removed == in_degree.len()
    }
}

struct Enumeration<'a> {
    dag: &'a Dag,
    in_degree: Vec<usize>,
    placed: Vec<bool>,
    order: Vec<usize>,
    rankings: Vec<Vec<u32>>,
    max_sorts: usize,
}

impl<'a> Enumeration<'a> {
    fn visit(&mut self) -> Result<(), TopologicalSortError> {
        let n_items = self.placed.len();
        if self.order.len() == n_items {
            if self.rankings.len() == self.max_sorts {
                return Err(TopologicalSortError::TooManySorts(self.max_sorts));
            }
            let mut ranking = vec![0; n_items];
            self.order.iter().enumerate().for_each(|(pos, &item)| {
                ranking[item] = pos as u32 + 1;
            });
            self.rankings.push(ranking);
            return Ok(());
        }

        for item in 0..n_items {
            if self.placed[item] || self.in_degree[item] > 0 {
                continue;
            }
            self.placed[item] = true;
            self.order.push(item);
            for &succ in &self.dag.successors[item] {
                self.in_degree[succ] -= 1;
            }

            let res = self.visit();

            for &succ in &self.dag.successors[item] {
                self.in_degree[succ] += 1;
            }
            self.order.pop();
            self.placed[item] = false;
            res?;
        }
        Ok(())
    }
}

/// All rankings of `n_items` items that satisfy every preference.
///
/// A preference `(a, b)` (0-based items) means item `a` is ranked above item
/// `b`, that is, `ranking[a] < ranking[b]`. Rankings are returned in
/// lexicographic order of the item orderings they come from.
///
/// # Example
///
/// ```rust
/// # use mallows_data::topological_sorts;
/// let sorts = topological_sorts(3, &[(0, 1), (0, 2)], 100).unwrap();
/// assert_eq!(sorts, vec![vec![1, 2, 3], vec![1, 3, 2]]);
/// ```
pub fn topological_sorts(
    n_items: usize,
    preferences: &[(usize, usize)],
    max_sorts: usize,
) -> Result<Vec<Vec<u32>>, TopologicalSortError> {
    let dag = Dag::new(n_items, preferences)?;
    if !dag.is_acyclic() {
        return Err(TopologicalSortError::Cycle);
    }

    let mut enumeration = Enumeration {
        dag: &dag,
        in_degree: dag.in_degree.clone(),
        placed: vec![false; n_items],
        order: Vec::with_capacity(n_items),
        rankings: Vec::new(),
        max_sorts,
    };
    enumeration.visit()?;
    Ok(enumeration.rankings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_has_one_sort() {
        let sorts =
            topological_sorts(4, &[(2, 0), (0, 3), (3, 1)], 10).unwrap();
        assert_eq!(sorts, vec![vec![2, 4, 1, 3]]);
    }

    #[test]
    fn no_preferences_give_all_permutations() {
        let sorts = topological_sorts(4, &[], 100).unwrap();
        assert_eq!(sorts.len(), 24);
    }

    #[test]
    fn every_sort_satisfies_the_preferences() {
        let prefs = [(0, 1), (2, 1), (3, 4)];
        let sorts = topological_sorts(5, &prefs, 1_000).unwrap();
        // 5! / (3 * 2) orderings satisfy the constraints
        assert_eq!(sorts.len(), 20);
        for ranking in sorts {
            for &(a, b) in &prefs {
                assert!(ranking[a] < ranking[b]);
            }
        }
    }

    #[test]
    fn duplicate_preferences_are_ignored() {
        let sorts = topological_sorts(3, &[(0, 1), (0, 1)], 100).unwrap();
        assert_eq!(sorts.len(), 3);
    }

    #[test]
    fn cycle_is_an_error() {
        let res = topological_sorts(3, &[(0, 1), (1, 2), (2, 0)], 100);
        assert_eq!(res, Err(TopologicalSortError::Cycle));
    }

    #[test]
    fn self_preference_is_an_error() {
        let res = topological_sorts(3, &[(1, 1)], 100);
        assert_eq!(res, Err(TopologicalSortError::SelfPreference(1)));
    }

    #[test]
    fn out_of_range_item_is_an_error() {
        let res = topological_sorts(3, &[(0, 3)], 100);
        assert_eq!(
            res,
            Err(TopologicalSortError::ItemOutOfRange {
                item: 3,
                n_items: 3
            })
        );
    }

    #[test]
    fn cap_on_sorts_is_enforced() {
        let res = topological_sorts(5, &[], 100);
        assert_eq!(res, Err(TopologicalSortError::TooManySorts(100)));
        assert_eq!(topological_sorts(5, &[], 120).unwrap().len(), 120);
    }
}

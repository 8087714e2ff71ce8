use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{topological_sorts, DataError, Observation};

/// The representation of the observations in a time series
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Complete or partial rankings, with rank 0 for unranked items
    Rankings,
    /// Pairwise preferences
    Pairwise,
}

/// A time series as it is written to disk.
///
/// Each step maps user names to what they reported at that step. Ranks and
/// items are 1-based. Users may appear at any number of steps; a later
/// observation replaces an earlier one.
///
/// ```rust
/// # use mallows_data::RawTimeSeries;
/// let json = r#"{
///     "kind": "pairwise",
///     "n_items": 3,
///     "steps": [{"ann": [[1, 2]]}, {"bob": [[3, 1], [3, 2]]}]
/// }"#;
/// let raw: RawTimeSeries = serde_json::from_str(json).unwrap();
/// assert_eq!(raw.n_steps(), 2);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawTimeSeries {
    Rankings {
        n_items: usize,
        steps: Vec<BTreeMap<String, Vec<u32>>>,
    },
    Pairwise {
        n_items: usize,
        steps: Vec<BTreeMap<String, Vec<(usize, usize)>>>,
    },
}

impl RawTimeSeries {
    pub fn n_steps(&self) -> usize {
        match self {
            Self::Rankings { steps, .. } => steps.len(),
            Self::Pairwise { steps, .. } => steps.len(),
        }
    }
}

/// One user's observation at one step
#[derive(Clone, Debug, PartialEq)]
pub struct UserObservation {
    /// Index into [`TimeSeries::users`]
    pub user: usize,
    pub observation: Observation,
}

/// Validated observations, one slice of users per time step
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    kind: DataKind,
    n_items: usize,
    users: Vec<String>,
    steps: Vec<Vec<UserObservation>>,
}

impl TimeSeries {
    /// Validate a raw time series. Pairwise preferences are expanded into
    /// every consistent ranking, failing if there are more than
    /// `max_topological_sorts` of them.
    pub fn from_raw(
        raw: RawTimeSeries,
        max_topological_sorts: usize,
    ) -> Result<Self, DataError> {
        match raw {
            RawTimeSeries::Rankings { n_items, steps } => {
                let steps = steps
                    .into_iter()
                    .map(|step| {
                        step.into_iter()
                            .map(|(user, ranking)| {
                                (user, Observation::from_ranking(ranking))
                            })
                            .collect()
                    })
                    .collect();
                Self::from_observations(DataKind::Rankings, n_items, steps)
            }
            RawTimeSeries::Pairwise { n_items, steps } => {
                let steps = steps
                    .into_iter()
                    .enumerate()
                    .map(|(t, step)| {
                        step.into_iter()
                            .map(|(user, prefs)| {
                                let obs = pairwise_observation(
                                    &user,
                                    t,
                                    n_items,
                                    &prefs,
                                    max_topological_sorts,
                                )?;
                                Ok((user, obs))
                            })
                            .collect::<Result<BTreeMap<_, _>, DataError>>()
                    })
                    .collect::<Result<Vec<_>, DataError>>()?;
                Self::from_observations(DataKind::Pairwise, n_items, steps)
            }
        }
    }

    /// Build a time series from already parsed observations
    pub fn from_observations(
        kind: DataKind,
        n_items: usize,
        steps: Vec<BTreeMap<String, Observation>>,
    ) -> Result<Self, DataError> {
        if n_items == 0 {
            return Err(DataError::NoItems);
        }

        let mut users: Vec<String> = Vec::new();
        let mut user_ixs: BTreeMap<String, usize> = BTreeMap::new();

        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(t, step)| {
                step.into_iter()
                    .map(|(name, observation)| {
                        observation.validate(n_items, &name, t)?;
                        let user = *user_ixs.entry(name).or_insert_with_key(
                            |name| {
                                users.push(name.clone());
                                users.len() - 1
                            },
                        );
                        Ok(UserObservation { user, observation })
                    })
                    .collect::<Result<Vec<_>, DataError>>()
            })
            .collect::<Result<Vec<_>, DataError>>()?;

        Ok(Self {
            kind,
            n_items,
            users,
            steps,
        })
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn n_steps(&self) -> usize {
        self.steps.len()
    }

    /// Number of distinct users across all steps
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    /// User names, in order of first appearance
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// The observations at step `t`
    pub fn step(&self, t: usize) -> &[UserObservation] {
        &self.steps[t]
    }
}

fn pairwise_observation(
    user: &str,
    step: usize,
    n_items: usize,
    prefs: &[(usize, usize)],
    max_sorts: usize,
) -> Result<Observation, DataError> {
    let preferences = prefs
        .iter()
        .map(|&(a, b)| {
            if a == 0 || b == 0 {
                Err(DataError::ZeroItem {
                    user: user.to_owned(),
                    step,
                })
            } else {
                Ok((a - 1, b - 1))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sorts =
        topological_sorts(n_items, &preferences, max_sorts).map_err(|source| {
            DataError::Preferences {
                user: user.to_owned(),
                step,
                source,
            }
        })?;

    Ok(Observation::Pairwise { preferences, sorts })
}

/// The users observed so far, in order of first appearance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservedUsers {
    order: Vec<usize>,
    seen: Vec<bool>,
}

impl ObservedUsers {
    pub fn new(n_users: usize) -> Self {
        Self {
            order: Vec::new(),
            seen: vec![false; n_users],
        }
    }

    /// Record the users of one time step
    pub fn update(&mut self, step: &[UserObservation]) {
        step.iter().for_each(|obs| {
            if !self.seen[obs.user] {
                self.seen[obs.user] = true;
                self.order.push(obs.user);
            }
        });
    }

    pub fn users(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

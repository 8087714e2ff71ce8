use std::time::{Duration, Instant};

use log::info;
use mallows_data::ObservedUsers;

use super::{RejuvenationReport, StepReport};
use crate::config::SmcOptions;
use crate::particle::Particle;
use crate::results::{LatentSnapshot, ParameterSnapshot, Traces};

/// Custom inspector for `Engine::run`.
///
/// This trait can be used to implement progress capture, tracing, and early
/// stopping. Handlers only observe the particles; nothing they do feeds back
/// into the sampler.
///
/// # Example
/// The following handler records the effective sample size of every step.
///
/// ```
/// use mallows_smc::update_handler::UpdateHandler;
/// use mallows_smc::{
///     EngineBuilder, ObservedUsers, Particle, Prior, SmcOptions, StepReport,
/// };
/// use mallows_smc::data::{RawTimeSeries, TimeSeries};
///
/// #[derive(Default)]
/// struct EssHandler {
///     ess: Vec<f64>,
/// }
///
/// impl UpdateHandler for EssHandler {
///     fn step_complete(
///         &mut self,
///         report: &StepReport,
///         _particles: &[Particle],
///         _observed_users: &ObservedUsers,
///     ) {
///         self.ess.push(report.ess);
///     }
/// }
///
/// let raw: RawTimeSeries = serde_json::from_str(r#"{
///     "kind": "rankings",
///     "n_items": 3,
///     "steps": [{"a": [1, 2, 3]}, {"b": [2, 1, 0]}]
/// }"#).unwrap();
/// let timeseries = TimeSeries::from_raw(raw, 100).unwrap();
/// let mut engine = EngineBuilder::new(timeseries, Prior::new(3))
///     .options(SmcOptions::new().n_particles(8).n_particle_filters(2))
///     .seed_from_u64(1337)
///     .build()
///     .unwrap();
///
/// let mut handler = EssHandler::default();
/// engine.run(&mut handler).unwrap();
/// assert_eq!(handler.ess.len(), 2);
/// ```
pub trait UpdateHandler {
    /// Initialize the handler before the first step is processed.
    fn global_init(&mut self, _options: &SmcOptions, _n_steps: usize) {}

    /// Handler for each completed time step.
    ///
    /// `observed_users` includes the users of the step just processed.
    fn step_complete(
        &mut self,
        _report: &StepReport,
        _particles: &[Particle],
        _observed_users: &ObservedUsers,
    ) {
    }

    /// Called after the particles were resampled and rejuvenated at step `t`.
    fn rejuvenated(&mut self, _t: usize, _report: &RejuvenationReport) {}

    /// Called when the particle filters were doubled to `n_filters`.
    fn filters_expanded(&mut self, _t: usize, _n_filters: usize) {}

    /// Should the `Engine` stop running.
    ///
    /// The method is called before each step. If true is returned, the
    /// remaining steps are skipped and the run ends as a partial run.
    fn stop_engine(&self) -> bool {
        false
    }

    /// Cleanup upon the end of the run.
    fn finalize(&mut self) {}
}

macro_rules! impl_tuple {
($($idx:tt $t:tt),+) => {
    impl<$($t,)+> UpdateHandler for ($($t,)+)
    where
        $($t: UpdateHandler,)+
    {
        fn global_init(&mut self, options: &SmcOptions, n_steps: usize) {
            $(
                self.$idx.global_init(options, n_steps);
            )+
        }

        fn step_complete(
            &mut self,
            report: &StepReport,
            particles: &[Particle],
            observed_users: &ObservedUsers,
        ) {
            $(
                self.$idx.step_complete(report, particles, observed_users);
            )+
        }

        fn rejuvenated(&mut self, t: usize, report: &RejuvenationReport) {
            $(
                self.$idx.rejuvenated(t, report);
            )+
        }

        fn filters_expanded(&mut self, t: usize, n_filters: usize) {
            $(
                self.$idx.filters_expanded(t, n_filters);
            )+
        }

        fn stop_engine(&self) -> bool {
            $(
                self.$idx.stop_engine()
            )||+
        }

        fn finalize(&mut self) {
            $(
                self.$idx.finalize();
            )+
        }
    }
};
}

impl_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_tuple!(0 A, 1 B, 2 C, 3 D, 4 E);
impl_tuple!(0 A, 1 B, 2 C, 3 D);
impl_tuple!(0 A, 1 B, 2 C);
impl_tuple!(0 A, 1 B);
impl_tuple!(0 A);

impl<T> UpdateHandler for Vec<T>
where
    T: UpdateHandler,
{
    fn global_init(&mut self, options: &SmcOptions, n_steps: usize) {
        self.iter_mut()
            .for_each(|handler| handler.global_init(options, n_steps));
    }

    fn step_complete(
        &mut self,
        report: &StepReport,
        particles: &[Particle],
        observed_users: &ObservedUsers,
    ) {
        self.iter_mut().for_each(|handler| {
            handler.step_complete(report, particles, observed_users);
        });
    }

    fn rejuvenated(&mut self, t: usize, report: &RejuvenationReport) {
        self.iter_mut()
            .for_each(|handler| handler.rejuvenated(t, report));
    }

    fn filters_expanded(&mut self, t: usize, n_filters: usize) {
        self.iter_mut()
            .for_each(|handler| handler.filters_expanded(t, n_filters));
    }

    fn stop_engine(&self) -> bool {
        self.iter().any(|handler| handler.stop_engine())
    }

    fn finalize(&mut self) {
        self.iter_mut().for_each(|handler| handler.finalize());
    }
}

impl<T> UpdateHandler for Option<T>
where
    T: UpdateHandler,
{
    fn global_init(&mut self, options: &SmcOptions, n_steps: usize) {
        if let Some(handler) = self {
            handler.global_init(options, n_steps);
        }
    }

    fn step_complete(
        &mut self,
        report: &StepReport,
        particles: &[Particle],
        observed_users: &ObservedUsers,
    ) {
        if let Some(handler) = self {
            handler.step_complete(report, particles, observed_users);
        }
    }

    fn rejuvenated(&mut self, t: usize, report: &RejuvenationReport) {
        if let Some(handler) = self {
            handler.rejuvenated(t, report);
        }
    }

    fn filters_expanded(&mut self, t: usize, n_filters: usize) {
        if let Some(handler) = self {
            handler.filters_expanded(t, n_filters);
        }
    }

    fn stop_engine(&self) -> bool {
        self.as_ref().map_or(false, |handler| handler.stop_engine())
    }

    fn finalize(&mut self) {
        if let Some(handler) = self {
            handler.finalize();
        }
    }
}

impl<T> UpdateHandler for &mut T
where
    T: UpdateHandler,
{
    fn global_init(&mut self, options: &SmcOptions, n_steps: usize) {
        (**self).global_init(options, n_steps);
    }

    fn step_complete(
        &mut self,
        report: &StepReport,
        particles: &[Particle],
        observed_users: &ObservedUsers,
    ) {
        (**self).step_complete(report, particles, observed_users);
    }

    fn rejuvenated(&mut self, t: usize, report: &RejuvenationReport) {
        (**self).rejuvenated(t, report);
    }

    fn filters_expanded(&mut self, t: usize, n_filters: usize) {
        (**self).filters_expanded(t, n_filters);
    }

    fn stop_engine(&self) -> bool {
        (**self).stop_engine()
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }
}

impl UpdateHandler for () {}

#[derive(Clone, Debug)]
/// An update handler which stops the run after a timeout limit.
pub enum Timeout {
    UnInitialized { timeout: Duration },
    Initialized { start: Instant, timeout: Duration },
}

impl Timeout {
    /// Create a new `Timeout` with `timeout` duration.
    pub fn new(timeout: Duration) -> Self {
        Self::UnInitialized { timeout }
    }
}

impl UpdateHandler for Timeout {
    fn global_init(&mut self, _options: &SmcOptions, _n_steps: usize) {
        if let Self::UnInitialized { timeout } = self {
            *self = Self::Initialized {
                start: Instant::now(),
                timeout: *timeout,
            };
        };
    }

    fn stop_engine(&self) -> bool {
        match self {
            Self::Initialized { start, timeout } => start.elapsed() > *timeout,
            Self::UnInitialized { .. } => false,
        }
    }
}

/// Log the progress of the run at the info level
#[derive(Clone, Debug, Default)]
pub struct Reporter {
    n_steps: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateHandler for Reporter {
    fn global_init(&mut self, options: &SmcOptions, n_steps: usize) {
        self.n_steps = n_steps;
        info!(
            "running {} particles with {} particle filters each over {} \
            time steps",
            options.n_particles, options.n_particle_filters, n_steps
        );
    }

    fn step_complete(
        &mut self,
        report: &StepReport,
        _particles: &[Particle],
        observed_users: &ObservedUsers,
    ) {
        info!(
            "time step {}/{}: {} users observed, ESS = {:.2}, \
            log marginal likelihood = {:.4}",
            report.t + 1,
            self.n_steps,
            observed_users.len(),
            report.ess,
            report.log_marginal_likelihood,
        );
    }

    fn rejuvenated(&mut self, t: usize, report: &RejuvenationReport) {
        info!(
            "time step {}: resampled, {} rejuvenation sweeps, {} distinct \
            alpha, acceptance rate {:.3}",
            t + 1,
            report.sweeps,
            report.n_unique_alpha,
            report.acceptance_rate,
        );
    }

    fn filters_expanded(&mut self, t: usize, n_filters: usize) {
        info!(
            "time step {}: particle filters doubled to {n_filters}",
            t + 1
        );
    }

    fn finalize(&mut self) {
        info!("run complete");
    }
}

/// Add a progress bar to the output
#[derive(Clone, Debug, Default)]
pub enum ProgressBar {
    #[default]
    UnInitialized,
    Initialized {
        progress_bar: indicatif::ProgressBar,
    },
}

impl ProgressBar {
    pub fn new() -> Self {
        Self::UnInitialized
    }
}

impl UpdateHandler for ProgressBar {
    fn global_init(&mut self, _options: &SmcOptions, n_steps: usize) {
        let progress_bar = indicatif::ProgressBar::new(n_steps as u64);
        if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
            "ESS {msg} {wide_bar:.white/white} │{pos}/{len}, Elapsed \
            {elapsed_precise} ETA {eta_precise}│",
        ) {
            progress_bar.set_style(style.progress_chars("━╾ "));
        }
        *self = Self::Initialized { progress_bar };
    }

    fn step_complete(
        &mut self,
        report: &StepReport,
        _particles: &[Particle],
        _observed_users: &ObservedUsers,
    ) {
        if let Self::Initialized { progress_bar } = self {
            progress_bar.set_message(format!("{:.2}", report.ess));
            progress_bar.inc(1);
        }
    }

    fn finalize(&mut self) {
        if let Self::Initialized { progress_bar } = std::mem::take(self) {
            progress_bar.finish_and_clear();
        }
    }
}

/// Record snapshots of the particles after every step
#[derive(Clone, Debug, Default)]
pub struct ParameterTracer {
    parameters: bool,
    latent_rankings: bool,
    traces: Traces,
}

impl ParameterTracer {
    /// Trace the static parameters and importance weights if `parameters`,
    /// and the conditioned latent rankings if `latent_rankings`
    pub fn new(parameters: bool, latent_rankings: bool) -> Self {
        Self {
            parameters,
            latent_rankings,
            traces: Traces::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.parameters || self.latent_rankings
    }

    pub fn traces(&self) -> &Traces {
        &self.traces
    }

    pub fn into_traces(self) -> Traces {
        self.traces
    }
}

impl UpdateHandler for ParameterTracer {
    fn step_complete(
        &mut self,
        report: &StepReport,
        particles: &[Particle],
        observed_users: &ObservedUsers,
    ) {
        if self.parameters {
            self.traces
                .parameters
                .push(ParameterSnapshot::new(report.t, particles));
        }
        if self.latent_rankings {
            self.traces.latent_rankings.push(LatentSnapshot::new(
                report.t,
                particles,
                observed_users,
            ));
        }
    }
}

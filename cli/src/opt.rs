use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mallows_smc::Metric;

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Time series of rankings or pairwise preferences (JSON or YAML)
    #[clap(long)]
    pub data: PathBuf,
    /// Prior and sampler options (YAML or JSON)
    #[clap(long)]
    pub config: PathBuf,
    /// Where to write the results. The extension selects JSON or YAML.
    #[clap(long)]
    pub out: PathBuf,
    /// Seed of the random number generator
    #[clap(long)]
    pub seed: Option<u64>,
    /// Directory of distance cardinality tables, named
    /// `<metric>_<n_items>.json`
    #[clap(long)]
    pub tables: Option<PathBuf>,
    /// Do not show a progress bar
    #[clap(long, short)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TableMetric {
    Footrule,
    Spearman,
    Ulam,
}

impl From<TableMetric> for Metric {
    fn from(metric: TableMetric) -> Self {
        match metric {
            TableMetric::Footrule => Metric::Footrule,
            TableMetric::Spearman => Metric::Spearman,
            TableMetric::Ulam => Metric::Ulam,
        }
    }
}

#[derive(Parser, Debug)]
pub struct TabulateArgs {
    /// The distance to tabulate
    #[clap(long, value_enum)]
    pub metric: TableMetric,
    /// Number of ranked items
    #[clap(long)]
    pub n_items: usize,
    /// Directory to write `<metric>_<n_items>.json` to
    #[clap(long, default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Parser, Debug)]
#[clap(name = "mallows", author, version, about)]
pub enum Opt {
    /// Run the sampler over a time series
    #[clap(name = "run")]
    Run(RunArgs),
    /// Enumerate the distance cardinality table of a metric
    #[clap(name = "tabulate")]
    Tabulate(TabulateArgs),
}

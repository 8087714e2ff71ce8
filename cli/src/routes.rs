use std::error::Error;
use std::path::{Path, PathBuf};

use log::info;
use mallows_smc::consts::MAX_TABULATED_ITEMS;
use mallows_smc::data::{RawTimeSeries, TimeSeries};
use mallows_smc::io::{deserialize_file, serialize_obj};
use mallows_smc::{
    run_engine, run_engine_with_progress, CardinalityTable, EngineBuilder,
    Metric, RunConfig,
};

use crate::opt;

fn table_path(dir: &Path, metric: Metric, n_items: usize) -> PathBuf {
    dir.join(format!("{metric}_{n_items}.json"))
}

fn run_inner(cmd: opt::RunArgs) -> Result<(), Box<dyn Error>> {
    let config: RunConfig = deserialize_file(&cmd.config)?;
    let raw: RawTimeSeries = deserialize_file(&cmd.data)?;
    let timeseries =
        TimeSeries::from_raw(raw, config.options.max_topological_sorts)?;
    info!(
        "{} time steps, {} users, {} items",
        timeseries.n_steps(),
        timeseries.n_users(),
        timeseries.n_items()
    );

    let metric = config.options.metric;
    let n_items = config.prior.n_items;
    let mut builder =
        EngineBuilder::new(timeseries, config.prior).options(config.options);

    if let Some(dir) = cmd.tables {
        let path = table_path(&dir, metric, n_items);
        if !metric.has_closed_form() && path.exists() {
            let table: CardinalityTable = deserialize_file(&path)?;
            builder = builder.cardinality_table(table);
        }
    }

    if let Some(seed) = cmd.seed {
        builder = builder.seed_from_u64(seed);
    }

    let engine = builder.build()?;
    let results = if cmd.quiet {
        run_engine(engine, ())?
    } else {
        run_engine_with_progress(engine)?
    };

    if !results.complete {
        info!(
            "stopped after {} of the time steps; writing a partial result",
            results.n_steps
        );
    }
    serialize_obj(&results, &cmd.out)?;
    Ok(())
}

pub fn run(cmd: opt::RunArgs) -> i32 {
    match run_inner(cmd) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Failed to run: {err}");
            1
        }
    }
}

pub fn tabulate(cmd: opt::TabulateArgs) -> i32 {
    if cmd.n_items > MAX_TABULATED_ITEMS {
        eprintln!(
            "Refusing to enumerate {}! permutations; tables can be built for \
            at most {MAX_TABULATED_ITEMS} items",
            cmd.n_items
        );
        return 1;
    }
    let metric = Metric::from(cmd.metric);
    info!("enumerating {}! permutations", cmd.n_items);
    let table = CardinalityTable::enumerate(metric, cmd.n_items);
    let path = table_path(&cmd.dir, metric, cmd.n_items);
    match serialize_obj(&table, &path) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Failed to write {}: {err}", path.display());
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_follow_metric_and_size() {
        let path = table_path(Path::new("tables"), Metric::Spearman, 12);
        assert_eq!(path, Path::new("tables/spearman_12.json"));
    }
}

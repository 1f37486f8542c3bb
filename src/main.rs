use std::error::Error;

mod dataset;
mod error;
mod imputation;
mod metrics;
mod print_array;
mod smoothing;
mod svt;
mod tensor;
mod transform;

use itertools::Itertools;
use ndarray::{s, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::dataset::{load_measurement_tensor, load_partition_labels};
use crate::imputation::{impute, ImputeOptions};
use crate::metrics::{mape, rmse};
use crate::print_array::print_array;
use crate::transform::Transform;

// Experiment configuration
const MEASUREMENT_FILE: &str = "dataset/measurements.csv";
const PARTITION_FILE: &str = "dataset/partitions.csv";
const HOLDOUT_FRACTION: f64 = 0.2;
const HOLDOUT_SEED: u64 = 42;
const TRANSFORM: &str = "unitary";
const RHO0_GRID: [f64; 2] = [1e-5, 1e-4];
const LAMBDA0_GRID: [f64; 3] = [0.0, 1e-1, 1.0];
const EPSILON: f64 = 1e-4;
const MAXITER: usize = 200;
const BANDED_OPERATOR: bool = true;

fn main() -> Result<(), Box<dyn Error>> {
    let dense_tensor = load_measurement_tensor(MEASUREMENT_FILE)?;
    let units = dense_tensor.dim().0;
    let partition_labels = load_partition_labels(PARTITION_FILE, units)?;
    let transform: Transform = TRANSFORM.parse()?;

    let sparse_tensor = mask_holdout(&dense_tensor, HOLDOUT_FRACTION, HOLDOUT_SEED);
    let total_observed = dense_tensor.iter().filter(|&&v| v != 0.0).count();
    let remaining = sparse_tensor.iter().filter(|&&v| v != 0.0).count();
    println!(
        "Held out {} of {} observed entries",
        total_observed - remaining,
        total_observed
    );

    let max_value = dense_tensor.iter().cloned().fold(0.0, f64::max);
    println!("Observed entries, day 0:");
    print_array(&sparse_tensor.slice(s![.., .., 0]).to_owned(), max_value);

    let mut granularities: Vec<usize> = partition_labels.keys().copied().collect();
    granularities.sort();

    let mut last_completed: Option<Array3<f64>> = None;
    for (&rho0, &lambda0) in RHO0_GRID.iter().cartesian_product(LAMBDA0_GRID.iter()) {
        let opts = ImputeOptions {
            rho0,
            lambda0,
            epsilon: EPSILON,
            maxiter: MAXITER,
            banded_operator: BANDED_OPERATOR,
            transform,
        };
        for &granularity in &granularities {
            let labels = &partition_labels[&granularity];
            let completed = impute_partitioned(&dense_tensor, &sparse_tensor, labels, &opts)?;
            report(&dense_tensor, &sparse_tensor, &completed, granularity, &opts)?;
            last_completed = Some(completed);
        }
    }

    if let Some(completed) = last_completed {
        println!("Completed estimate, day 0 (last configuration):");
        print_array(&completed.slice(s![.., .., 0]).to_owned(), max_value);
    }

    Ok(())
}

/// Masks a random fraction of the observed entries, producing the sparse
/// tensor the imputer sees; the masked positions become the holdout set.
fn mask_holdout(dense: &Array3<f64>, fraction: f64, seed: u64) -> Array3<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sparse = dense.clone();
    for value in sparse.iter_mut() {
        if *value != 0.0 && rng.gen::<f64>() < fraction {
            *value = 0.0;
        }
    }
    sparse
}

/// Runs the imputer once per partition cell and stitches the completed
/// blocks back together. The invocations are independent; nothing is shared
/// between them.
fn impute_partitioned(
    dense: &Array3<f64>,
    sparse: &Array3<f64>,
    labels: &[usize],
    opts: &ImputeOptions,
) -> Result<Array3<f64>, Box<dyn Error>> {
    let mut groups: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (unit, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(unit);
    }
    let mut group_labels: Vec<usize> = groups.keys().copied().collect();
    group_labels.sort();

    let mut completed = sparse.clone();
    for label in group_labels {
        let units = &groups[&label];
        let dense_block = dense.select(Axis(0), units);
        let sparse_block = sparse.select(Axis(0), units);
        let result = impute(&dense_block, &sparse_block, opts)?;
        for (row, &unit) in units.iter().enumerate() {
            completed
                .slice_mut(s![unit, .., ..])
                .assign(&result.tensor.slice(s![row, .., ..]));
        }
    }
    Ok(completed)
}

fn report(
    dense: &Array3<f64>,
    sparse: &Array3<f64>,
    completed: &Array3<f64>,
    granularity: usize,
    opts: &ImputeOptions,
) -> Result<(), Box<dyn Error>> {
    let mut actual = Vec::new();
    let mut predicted = Vec::new();
    for (index, &truth) in dense.indexed_iter() {
        if truth != 0.0 && sparse[index] == 0.0 {
            actual.push(truth);
            predicted.push(completed[index]);
        }
    }
    println!(
        "granularity {:>3}, rho0 {:>7.0e}, lambda0 {:>7.0e}: holdout mape {:.4}, rmse {:.4} ({} positions)",
        granularity,
        opts.rho0,
        opts.lambda0,
        mape(&actual, &predicted)?,
        rmse(&actual, &predicted)?,
        actual.len()
    );
    Ok(())
}

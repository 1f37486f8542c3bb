use std::io::{stdout, Write};

use ndarray::{Array2, Array3, Zip};

use crate::error::{Error, Result};
use crate::metrics::rmse;
use crate::smoothing::{fill_operator, roughness_gram};
use crate::svt::slicewise_svt;
use crate::tensor::{fold, unfold};
use crate::transform::{data_basis, dct_basis, forward, inverse, Transform};

// Penalty escalation
const RHO_GROWTH: f64 = 1.05;
const RHO_CAP: f64 = 1e5;
const BASIS_REFRESH_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct ImputeOptions {
    /// Initial augmented-Lagrangian penalty, escalated towards the cap.
    pub rho0: f64,
    /// Temporal smoothness weight; zero disables smoothing entirely.
    pub lambda0: f64,
    /// Relative-change tolerance for convergence.
    pub epsilon: f64,
    pub maxiter: usize,
    /// Assemble the roughness matrix from its band instead of a dense product.
    pub banded_operator: bool,
    pub transform: Transform,
}

pub struct Imputation {
    /// Completed low-rank estimate, same shape as the input.
    pub tensor: Array3<f64>,
    /// Every day-axis basis used, in order (initial one plus refreshes).
    pub bases: Vec<Array2<f64>>,
    /// False means the iteration cap was hit first; the estimate is still
    /// the best one available, not an error.
    pub converged: bool,
    pub iterations: usize,
    /// Penalty value per iteration, non-decreasing and capped.
    pub rho_trace: Vec<f64>,
}

struct Smoother {
    gram: Array2<f64>,
    ratio: f64,
    operator: Array2<f64>,
}

/// Imputes the zero-marked entries of `sparse` by alternating a
/// transform-domain low-rank step with a temporal-smoothness fill step.
///
/// `dense` is only consulted at positions it has observed but `sparse` is
/// missing, to report a running holdout error; passing the sparse tensor
/// again disables that reporting.
///
/// # Arguments
/// * `dense` - ground truth tensor, may alias `sparse` when none exists
/// * `sparse` - observed tensor, zero marks a missing entry
/// * `opts` - penalty, smoothing, tolerance and transform settings
///
/// # Returns
/// The completed tensor together with the basis history, convergence flag,
/// iteration count and penalty trace.
pub fn impute(dense: &Array3<f64>, sparse: &Array3<f64>, opts: &ImputeOptions) -> Result<Imputation> {
    if dense.dim() != sparse.dim() {
        return Err(Error::Shape(format!(
            "ground truth {:?} and observed {:?} tensors disagree",
            dense.dim(),
            sparse.dim()
        )));
    }
    check_options(opts)?;

    let dims = sparse.dim();
    let (_, n2, n3) = dims;

    // the zero sentinel becomes an explicit mask here and is not consulted
    // again; observed entries of the filled matrix are never rewritten
    let sparse_mat = unfold(sparse, 0)?;
    let observed_mask = sparse_mat.map(|&v| v != 0.0);
    let observed_count = observed_mask.iter().filter(|&&m| m).count();
    if observed_count == 0 {
        return Err(Error::Configuration(
            "input tensor has no observed entries".into(),
        ));
    }
    let observed_mean = sparse_mat.sum() / observed_count as f64;
    let sparse_norm = sparse_mat.mapv(|v| v * v).sum().sqrt();

    // holdout positions: observed in the ground truth, missing here
    let validation: Vec<(usize, usize, usize)> = dense
        .indexed_iter()
        .filter(|&((i, j, k), &truth)| truth != 0.0 && sparse[[i, j, k]] == 0.0)
        .map(|(index, _)| index)
        .collect();
    let validation_actual: Vec<f64> = validation.iter().map(|&index| dense[index]).collect();

    let mut filled_mat = sparse_mat.clone();
    Zip::from(&mut filled_mat)
        .and(&observed_mask)
        .for_each(|value, &is_observed| {
            if !is_observed {
                *value = observed_mean;
            }
        });

    let mut basis = match opts.transform {
        Transform::Unitary => data_basis(&fold(&filled_mat, dims, 0)?)?,
        Transform::Dct => dct_basis(n3),
    };
    let mut bases = vec![basis.clone()];

    let mut smoother = if opts.lambda0 > 0.0 {
        Some(Smoother {
            gram: roughness_gram(n2 * n3, opts.banded_operator)?,
            ratio: f64::NAN,
            operator: Array2::zeros((0, 0)),
        })
    } else {
        None
    };

    let mut dual = Array3::<f64>::zeros(dims);
    let mut rho = opts.rho0;
    let mut rho_trace = Vec::with_capacity(opts.maxiter);
    let mut previous_estimate = Array2::<f64>::zeros(filled_mat.dim());
    let mut x = Array3::<f64>::zeros(dims);
    let mut converged = false;
    let mut iterations = 0;
    let mut change = f64::INFINITY;

    for it in 1..=opts.maxiter {
        iterations = it;
        rho = (rho * RHO_GROWTH).min(RHO_CAP);
        rho_trace.push(rho);

        // low-rank step in the transform domain
        let filled_ten = fold(&filled_mat, dims, 0)?;
        let centered = &filled_ten - &(&dual / rho);
        x = inverse(
            &slicewise_svt(&forward(&centered, &basis)?, 1.0 / rho)?,
            &basis,
        )?;

        // fill step, missing entries only
        let x_plus_dual = unfold(&(&x + &(&dual / rho)), 0)?;
        let target = match smoother.as_mut() {
            Some(sm) => {
                let ratio = rho / opts.lambda0;
                if sm.ratio != ratio {
                    sm.operator = fill_operator(&sm.gram, ratio)?;
                    sm.ratio = ratio;
                }
                x_plus_dual.dot(&sm.operator)
            }
            None => x_plus_dual,
        };
        Zip::from(&mut filled_mat)
            .and(&target)
            .and(&observed_mask)
            .for_each(|value, &fill, &is_observed| {
                if !is_observed {
                    *value = fill;
                }
            });

        // dual ascent
        let filled_ten = fold(&filled_mat, dims, 0)?;
        dual = dual + (&x - &filled_ten) * rho;

        let estimate = unfold(&x, 0)?;
        change = (&estimate - &previous_estimate).mapv(|v| v * v).sum().sqrt() / sparse_norm;
        previous_estimate = estimate;

        if validation.is_empty() {
            print!(
                "\rimputation: [{:>4}/{}] change: {:.10}",
                it, opts.maxiter, change
            );
        } else {
            let predicted: Vec<f64> = validation.iter().map(|&index| x[index]).collect();
            print!(
                "\rimputation: [{:>4}/{}] change: {:.10}, holdout rmse: {:.6}",
                it,
                opts.maxiter,
                change,
                rmse(&validation_actual, &predicted)?
            );
        }
        stdout().flush().unwrap();

        if it % BASIS_REFRESH_EVERY == 0 && opts.transform == Transform::Unitary {
            basis = data_basis(&(&filled_ten - &(&dual / rho)))?;
            bases.push(basis.clone());
        }

        if change < opts.epsilon {
            converged = true;
            break;
        }
    }

    println!(
        "\rimputation: [{:>4}/{}] change: {:.10}, converged: {}",
        iterations, opts.maxiter, change, converged
    );

    Ok(Imputation {
        tensor: x,
        bases,
        converged,
        iterations,
        rho_trace,
    })
}

fn check_options(opts: &ImputeOptions) -> Result<()> {
    if opts.rho0 <= 0.0 {
        return Err(Error::Configuration(format!(
            "rho0 must be positive, got {}",
            opts.rho0
        )));
    }
    if opts.lambda0 < 0.0 {
        return Err(Error::Configuration(format!(
            "lambda0 must be non-negative, got {}",
            opts.lambda0
        )));
    }
    if opts.epsilon <= 0.0 {
        return Err(Error::Configuration(format!(
            "epsilon must be positive, got {}",
            opts.epsilon
        )));
    }
    if opts.maxiter == 0 {
        return Err(Error::Configuration("maxiter must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::mape;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rank_one_tensor(seed: u64) -> Array3<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let a: Vec<f64> = (0..3).map(|_| rng.gen_range(0.5..1.5)).collect();
        let b: Vec<f64> = (0..4).map(|_| rng.gen_range(0.5..1.5)).collect();
        let c: Vec<f64> = (0..5).map(|_| rng.gen_range(0.5..1.5)).collect();
        Array3::from_shape_fn((3, 4, 5), |(i, j, k)| a[i] * b[j] * c[k])
    }

    fn punch_holes(tensor: &Array3<f64>, fraction: f64, seed: u64) -> Array3<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sparse = tensor.clone();
        for value in sparse.iter_mut() {
            if rng.gen::<f64>() < fraction {
                *value = 0.0;
            }
        }
        sparse
    }

    fn options(rho0: f64, lambda0: f64, epsilon: f64, maxiter: usize) -> ImputeOptions {
        ImputeOptions {
            rho0,
            lambda0,
            epsilon,
            maxiter,
            banded_operator: true,
            transform: Transform::Dct,
        }
    }

    #[test]
    fn test_recovers_a_low_rank_tensor_from_partial_observations() {
        let dense = rank_one_tensor(1);
        let sparse = punch_holes(&dense, 0.2, 2);

        let result = impute(&dense, &sparse, &options(1.0, 0.0, 1e-4, 500)).unwrap();
        assert!(result.converged);
        assert!(result.iterations < 500);

        let mut actual = Vec::new();
        let mut predicted = Vec::new();
        for (index, &truth) in dense.indexed_iter() {
            if sparse[index] == 0.0 {
                actual.push(truth);
                predicted.push(result.tensor[index]);
            }
        }
        assert!(mape(&actual, &predicted).unwrap() < 0.05);
    }

    #[test]
    fn test_fully_observed_data_is_a_fixed_point() {
        // starting at the penalty cap keeps the threshold constant, so the
        // dual absorbs the shrinkage after two iterations
        let dense = rank_one_tensor(5);
        let result = impute(&dense, &dense, &options(RHO_CAP, 0.0, 1e-6, 50)).unwrap();
        assert!(result.converged);
        assert!(result.iterations <= 5);
        for (index, &truth) in dense.indexed_iter() {
            assert!((result.tensor[index] - truth).abs() < 1e-6);
        }
    }

    #[test]
    fn test_smoothing_weight_changes_the_fill() {
        let dense = rank_one_tensor(9);
        let sparse = punch_holes(&dense, 0.2, 10);
        let plain = impute(&dense, &sparse, &options(1.0, 0.0, 1e-10, 30)).unwrap();
        let smoothed = impute(&dense, &sparse, &options(1.0, 5.0, 1e-10, 30)).unwrap();

        let max_diff = plain
            .tensor
            .iter()
            .zip(smoothed.tensor.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(max_diff > 1e-8);
    }

    #[test]
    fn test_rho_trace_is_monotone_and_capped() {
        let dense = rank_one_tensor(21);
        let sparse = punch_holes(&dense, 0.2, 22);
        let result = impute(&dense, &sparse, &options(9.0e4, 0.0, 1e-30, 40)).unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 40);
        assert_eq!(result.rho_trace.len(), 40);
        assert!(result.rho_trace.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(result.rho_trace.iter().all(|&rho| rho <= RHO_CAP));
        assert_eq!(*result.rho_trace.last().unwrap(), RHO_CAP);
    }

    #[test]
    fn test_basis_history_grows_with_refreshes() {
        let dense = rank_one_tensor(31);
        let sparse = punch_holes(&dense, 0.2, 32);
        let mut opts = options(1.0, 0.0, 1e-30, 25);
        opts.transform = Transform::Unitary;

        let result = impute(&dense, &sparse, &opts).unwrap();
        // initial basis plus refreshes at iterations 10 and 20
        assert_eq!(result.bases.len(), 3);
        for basis in &result.bases {
            assert_eq!(basis.dim(), (5, 5));
        }
    }

    #[test]
    fn test_empty_observation_set_is_a_configuration_error() {
        let zeros = Array3::<f64>::zeros((3, 4, 5));
        assert!(matches!(
            impute(&zeros, &zeros, &options(1.0, 0.0, 1e-4, 10)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_degenerate_time_axis_with_smoothing_is_a_configuration_error() {
        let mut dense = Array3::<f64>::zeros((2, 1, 1));
        dense[[0, 0, 0]] = 1.0;
        dense[[1, 0, 0]] = 2.0;
        assert!(matches!(
            impute(&dense, &dense, &options(1.0, 1.0, 1e-4, 10)),
            Err(Error::Configuration(_))
        ));
    }
}

//! End-to-end runs on a discretized distributed control problem.

mod common;

use common::{Poisson1d, Recorder};
use reduced::{ControlVector, DenseControl};
use reduced_optim::{
    ConvergenceParams, NewtonConfig, ReducedAlgorithm, ReducedNewtonAlgorithm, ReducedSolver,
};

type Control = DenseControl<f64>;

#[test]
fn reduced_gradient_matches_difference_quotients() {
    let mut problem = Poisson1d::new(32, 1e-3);
    let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem);
    let mut q = Control::from_values((0..32).map(|i| 0.1 * i as f64).collect());
    let mut dq = q.zeros_like();

    let rows = alg.check_grads(1.0, &mut q, &mut dq, 3, 1e-1).unwrap();
    for row in &rows {
        assert!(row.relative_error.abs() < 1e-6, "{row:?}");
    }
}

#[test]
fn reduced_hessian_matches_difference_quotients() {
    let mut problem = Poisson1d::new(32, 1e-3);
    let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem);
    let mut q = Control::from_values(vec![1.0; 32]);
    let mut dq = q.zeros_like();

    let rows = alg.check_hessian(1.0, &mut q, &mut dq, 2, 1e-1).unwrap();
    for row in &rows {
        assert!(row.exact > 0.0);
        assert!(row.relative_error.abs() < 1e-6, "{row:?}");
    }
}

#[test]
fn newton_cg_reaches_optimality() {
    let mut problem = Poisson1d::new(32, 1e-3);
    let mut out = Recorder::default();
    let config = NewtonConfig {
        convergence: ConvergenceParams {
            max_iter: 20,
            ..Default::default()
        },
        ..NewtonConfig::<f64>::default()
    };
    let base = ReducedAlgorithm::<Control, _>::new(&mut problem).with_output(&mut out);
    let mut alg = ReducedNewtonAlgorithm::new(base, config).unwrap();

    let mut q = Control::from_values(vec![0.0; 32]);
    let iters = alg.solve(&mut q, None).unwrap();
    assert!(iters >= 1);
    assert!(alg.newton_residual(&q).unwrap() < 1e-8);
    drop(alg);

    assert!(out.errors.is_empty(), "{:?}", out.errors);
    assert!(out.wrote("SDoFs : 32"));
    // the optimal control pushes the state towards the positive target
    assert!(q.values().iter().all(|&x| x > 0.0));
}

mod common;

use approx::assert_relative_eq;
use common::{Collect, Control, Recorder, Separable};
use reduced::{ControlSpace, ControlVector, DenseControl, Error, OutputParams};
use reduced_optim::ReducedAlgorithm;

// ============================================================
// Difference quotients
// ============================================================

#[test]
fn gradient_check_on_parabola() {
    let mut problem = Separable::squares();
    let mut out = Recorder::default();
    let rows = {
        let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem).with_output(&mut out);
        let mut q = Control::from_values(vec![2.0]);
        let mut dq = q.zeros_like();
        alg.check_grads(1.0, &mut q, &mut dq, 1, 1e-2).unwrap()
    };
    assert_eq!(rows.len(), 1);
    assert_relative_eq!(rows[0].exact, 4.0);
    assert!(rows[0].relative_error.abs() < 1e-3);
    assert!(out.wrote("Checking Gradients"));
    assert!(out.wrote("Epsilon"));
}

#[test]
fn gradient_check_error_shrinks_with_eps() {
    let mut problem = Separable::convex_quartic();
    let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem);
    let mut q = Control::from_values(vec![0.7, -1.3, 0.4]);
    let mut dq = q.zeros_like();
    let rows = alg.check_grads(0.5, &mut q, &mut dq, 3, 1e-1).unwrap();

    // dq was set to the constant
    assert_eq!(dq.values(), &[0.5, 0.5, 0.5]);
    assert_eq!(rows.len(), 3);
    assert_relative_eq!(rows[1].eps, 1e-2, max_relative = 1e-12);
    // central differences are second order
    assert!(rows[1].relative_error.abs() < rows[0].relative_error.abs());
    assert!(rows[2].relative_error.abs() < 1e-5);
}

#[test]
fn hessian_check_on_quartic() {
    let mut problem = Separable::convex_quartic();
    let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem);
    let mut q = Control::from_values(vec![1.0]);
    let mut dq = q.zeros_like();
    let rows = alg.check_hessian(1.0, &mut q, &mut dq, 2, 1e-2).unwrap();

    // f''(1) = 4
    assert_relative_eq!(rows[0].exact, 4.0);
    assert!(rows[0].relative_error.abs() < 1e-4);
    assert!(rows[1].relative_error.abs() < 1e-4);
}

#[test]
fn hessian_check_on_parabola() {
    let mut problem = Separable::squares();
    let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem);
    let mut q = Control::from_values(vec![2.0]);
    let mut dq = q.zeros_like();
    let rows = alg.check_hessian(1.0, &mut q, &mut dq, 1, 1e-1).unwrap();
    assert_relative_eq!(rows[0].exact, 2.0);
    assert_relative_eq!(rows[0].diff_quot, 2.0, max_relative = 1e-8);
}

// ============================================================
// Forward solve
// ============================================================

#[test]
fn forward_solve_reports_cost() {
    let mut problem = Separable::squares();
    let mut out = Recorder::default();
    {
        let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem).with_output(&mut out);
        let mut q = Control::from_values(vec![1.0, 2.0]);
        alg.solve_forward(&mut q).unwrap();
    }
    assert!(out.wrote("Starting Forward Solver"));
    assert!(out.wrote("CDoFs : 2"));
    assert!(out.wrote("CostFunctional: 5e0"));
    assert_eq!(problem.functionals, 1);
}

#[test]
fn forward_solve_continues_when_handler_swallows() {
    let mut problem = Separable::squares();
    problem.fail_cost = true;
    let mut exceptions = Collect {
        swallow: true,
        ..Default::default()
    };
    {
        let mut alg =
            ReducedAlgorithm::<Control, _>::new(&mut problem).with_exception_handler(&mut exceptions);
        let mut q = Control::from_values(vec![1.0]);
        alg.solve_forward(&mut q).unwrap();
    }
    assert_eq!(exceptions.critical.len(), 1);
    assert_eq!(problem.functionals, 1);
}

#[test]
fn forward_solve_resizes_control_after_refinement() {
    let space = ControlSpace::new(2);
    let mut q = DenseControl::<f64>::new(&space);
    space.redistribute(vec![2, 3]);

    let mut problem = Separable::squares();
    let mut out = Recorder::default();
    {
        let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem).with_output(&mut out);
        alg.solve_forward(&mut q).unwrap();
    }
    assert_eq!(q.len(), 5);
    assert!(out.wrote("CDoFs : 5 (2+3)"));
}

// ============================================================
// Handler ownership
// ============================================================

#[test]
fn borrowed_output_is_not_reinitialized() {
    let mut problem = Separable::squares();
    let mut out = Recorder::default();
    {
        let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem).with_output(&mut out);
        assert!(!alg.owns_output());
        assert!(alg.owns_exception_handler());
        alg.reinit();
    }
    assert_eq!(out.reinits, 0);
    assert_eq!(problem.reinits, 1);
}

#[test]
fn default_handlers_are_owned() {
    let mut problem = Separable::squares();
    let mut alg = ReducedAlgorithm::<Control, _>::with_output_params(
        &mut problem,
        OutputParams {
            print_level: 5,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(alg.owns_output());
    alg.reinit();
    assert_eq!(alg.problem().reinits, 1);
}

#[test]
fn invalid_output_params_rejected() {
    let mut problem = Separable::squares();
    let res = ReducedAlgorithm::<Control, _>::with_output_params(
        &mut problem,
        OutputParams {
            zero_tol: -1.0,
            ..Default::default()
        },
    );
    assert!(matches!(res, Err(Error::InvalidParameter { .. })));
}

#[test]
fn base_priority_shifts_output() {
    let mut problem = Separable::squares();
    let mut out = Recorder::default();
    {
        let mut alg = ReducedAlgorithm::<Control, _>::new(&mut problem)
            .with_output(&mut out)
            .with_base_priority(10);
        alg.write("hello", 2);
    }
    assert_eq!(out.messages, vec![(12, "hello".to_string())]);
}

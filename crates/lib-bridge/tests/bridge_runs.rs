//! End-to-end runs through the entry point with the replay sampler.

use lib_bridge::{
    BridgeError, BridgeOptions, DispatchKind, ErrorCategory, InvocationMode, OwnedPoint,
    SamplerBridge, ScriptHost, DEFAULT_OBJECTIVE_NAME,
};
use lib_sampler_ffi::{InputFileBuffer, LogFuncFn, ReplaySampler, SamplerAdapter};
use lib_types::{FunctionHandle, HostError, HostResult, HostValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Weighted sum so that every coordinate and its position matter.
fn weighted_sum(point: &[f64]) -> f64 {
    point
        .iter()
        .enumerate()
        .map(|(i, x)| (i as f64 + 1.0) * x)
        .sum()
}

fn weighted_sum_objective(args: &[HostValue], _nargout: usize) -> HostResult<Vec<HostValue>> {
    let point = OwnedPoint::from_host_value(&args[0])
        .map_err(|e| HostError::raised("test:point", e.to_string()))?;
    Ok(vec![HostValue::from(weighted_sum(point.as_slice()))])
}

fn named_args(ndim: f64) -> Vec<HostValue> {
    vec![
        HostValue::from(1.0),
        HostValue::from(ndim),
        HostValue::from("./paramonte.nml"),
    ]
}

fn handle_args(ndim: f64, handle: &FunctionHandle) -> Vec<HostValue> {
    let mut rhs = named_args(ndim);
    rhs.push(HostValue::Function(handle.clone()));
    rhs
}

fn grid(count: usize, ndim: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|i| (0..ndim).map(|j| (i * ndim + j) as f64 * 0.25 - 3.0).collect())
        .collect()
}

/// Sampler that keeps proposing until it has collected enough finite values.
struct UntilFinite {
    wanted: usize,
    max_calls: usize,
    calls: AtomicUsize,
}

impl UntilFinite {
    fn new(wanted: usize, max_calls: usize) -> Self {
        Self { wanted, max_calls, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SamplerAdapter for UntilFinite {
    fn name(&self) -> &str {
        "until-finite"
    }

    fn run(&self, ndim: i32, log_func: LogFuncFn, _input_file: &mut InputFileBuffer) -> i32 {
        let mut finite = 0;
        while finite < self.wanted && self.calls() < self.max_calls {
            let mut point = vec![0.5; ndim as usize];
            self.calls.fetch_add(1, Ordering::SeqCst);
            let value = unsafe { log_func(ndim, point.as_mut_ptr()) };
            if value.is_finite() {
                finite += 1;
            }
        }
        0
    }
}

#[test]
fn named_mode_run_evaluates_every_point() {
    let host = ScriptHost::new();
    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);
    let points = grid(10, 3);
    let sampler = ReplaySampler::new(points.clone());

    let bridge = SamplerBridge::new(Arc::new(host), &sampler);
    let summary = bridge.invoke(0, &named_args(3.0)).unwrap();

    assert_eq!(summary.dispatch, DispatchKind::Named);
    assert_eq!(summary.mode, InvocationMode::Batch);
    assert_eq!(summary.ndim, 3);
    assert_eq!(summary.evaluations, 10);
    assert!(summary.status.is_success());

    let expected: Vec<f64> = points.iter().map(|p| weighted_sum(p)).collect();
    assert_eq!(sampler.results(), expected);

    let seen = sampler.last_input_file().unwrap();
    assert_eq!(seen.path, "./paramonte.nml");
    assert_eq!(seen.native_len, 16);
}

#[test]
fn named_and_handle_modes_agree() {
    let host = Arc::new(ScriptHost::new());
    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);
    let handle = FunctionHandle::new("@(x) weighted_sum(x)", weighted_sum_objective);
    let points = grid(8, 4);

    let named = ReplaySampler::new(points.clone());
    SamplerBridge::new(host.clone(), &named)
        .invoke(0, &named_args(4.0))
        .unwrap();

    let anonymous = ReplaySampler::new(points);
    let summary = SamplerBridge::new(host, &anonymous)
        .invoke(0, &handle_args(4.0, &handle))
        .unwrap();
    assert_eq!(summary.dispatch, DispatchKind::Handle);

    let named_bits: Vec<u64> = named.results().iter().map(|v| v.to_bits()).collect();
    let handle_bits: Vec<u64> = anonymous.results().iter().map(|v| v.to_bits()).collect();
    assert_eq!(named_bits, handle_bits);
}

#[test]
fn points_reach_the_objective_bit_for_bit() {
    let received: Arc<Mutex<Vec<Vec<u64>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let handle = FunctionHandle::new("@(x) record(x)", move |args, _| {
        let array = args[0].as_numeric().expect("double column");
        assert_eq!(array.cols(), 1);
        sink.lock()
            .unwrap()
            .push(array.as_slice().iter().map(|v| v.to_bits()).collect());
        Ok(vec![HostValue::from(0.0)])
    });

    let points = vec![
        vec![-0.0, f64::MIN_POSITIVE / 4.0, f64::from_bits(0x7ff8_0000_dead_beef)],
        vec![f64::INFINITY, f64::NEG_INFINITY, 1.0e-300],
    ];
    let sampler = ReplaySampler::new(points.clone());
    SamplerBridge::new(Arc::new(ScriptHost::new()), &sampler)
        .invoke(0, &handle_args(3.0, &handle))
        .unwrap();

    let expected: Vec<Vec<u64>> = points
        .iter()
        .map(|p| p.iter().map(|v| v.to_bits()).collect())
        .collect();
    assert_eq!(*received.lock().unwrap(), expected);
}

#[test]
fn wrong_argument_count_never_reaches_sampler() {
    let host = Arc::new(ScriptHost::new());
    let sampler = ReplaySampler::new(grid(1, 2));
    let bridge = SamplerBridge::new(host, &sampler);

    let two = vec![HostValue::from(1.0), HostValue::from(2.0)];
    let err = bridge.invoke(0, &two).unwrap_err();
    assert_eq!(err, BridgeError::InvalidArgumentCount { got: 2 });

    let mut five = handle_args(2.0, &FunctionHandle::new("f", weighted_sum_objective));
    five.push(HostValue::from(0.0));
    let err = bridge.invoke(0, &five).unwrap_err();
    assert_eq!(err, BridgeError::InvalidArgumentCount { got: 5 });
    assert_eq!(err.identifier(), "ParaMonte:invalidNumInputs");

    assert_eq!(sampler.runs(), 0);
}

#[test]
fn non_string_input_file_never_reaches_sampler() {
    let sampler = ReplaySampler::new(grid(1, 2));
    let bridge = SamplerBridge::new(Arc::new(ScriptHost::new()), &sampler);

    let mut rhs = named_args(2.0);
    rhs[2] = HostValue::from(42.0);
    let err = bridge.invoke(0, &rhs).unwrap_err();
    assert!(matches!(err, BridgeError::InputNotString { .. }));
    assert_eq!(err.category(), ErrorCategory::Usage);
    assert_eq!(sampler.runs(), 0);
}

#[test]
fn requested_outputs_never_reach_sampler() {
    let host = Arc::new(ScriptHost::new());
    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);
    let sampler = ReplaySampler::new(grid(1, 2));
    let bridge = SamplerBridge::new(host, &sampler);

    for nlhs in [1, 2] {
        let err = bridge.invoke(nlhs, &named_args(2.0)).unwrap_err();
        assert_eq!(err, BridgeError::TooManyOutputs { requested: nlhs });
    }

    let mut bad = named_args(-1.0);
    bad[2] = HostValue::from(0.0);
    let err = bridge.invoke(1, &bad).unwrap_err();
    assert_eq!(err, BridgeError::TooManyOutputs { requested: 1 });
    assert_eq!(sampler.runs(), 0);
}

#[test]
fn sampler_status_maps_to_runtime_error() {
    let host = Arc::new(ScriptHost::new());
    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);

    let ok = ReplaySampler::new(grid(2, 2));
    assert!(SamplerBridge::new(host.clone(), &ok)
        .invoke_from_host(0, &named_args(2.0))
        .is_ok());

    for status in [1, -1, 77] {
        let failing = ReplaySampler::new(grid(2, 2)).with_status(status);
        let bridge = SamplerBridge::new(host.clone(), &failing);
        let err = bridge.invoke(0, &named_args(2.0)).unwrap_err();
        assert_eq!(err, BridgeError::Runtime { status });

        let fault = bridge.invoke_from_host(0, &named_args(2.0)).unwrap_err();
        assert_eq!(fault.identifier, "ParaMonte:runtimeError");
    }
}

#[test]
fn concurrent_callbacks_do_not_cross_talk() {
    let handle = FunctionHandle::new("@(x) weighted_sum(x)", weighted_sum_objective);
    let points = grid(500, 5);
    let expected: Vec<f64> = points.iter().map(|p| weighted_sum(p)).collect();

    for reentrant in [false, true] {
        for dispatch in [DispatchKind::Named, DispatchKind::Handle] {
            let host = ScriptHost::new().with_reentrant(reentrant);
            let rhs = match dispatch {
                DispatchKind::Named => {
                    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);
                    named_args(5.0)
                }
                DispatchKind::Handle => handle_args(5.0, &handle),
            };
            let sampler = ReplaySampler::new(points.clone()).parallel(true);

            let summary = SamplerBridge::new(Arc::new(host), &sampler)
                .invoke(0, &rhs)
                .unwrap();
            assert_eq!(summary.dispatch, dispatch);
            assert_eq!(summary.evaluations, 500);
            assert_eq!(
                sampler.results(),
                expected,
                "reentrant={reentrant} dispatch={dispatch:?}"
            );
        }
    }
}

#[test]
fn non_reentrant_host_calls_are_serialized() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let (now, max) = (in_flight.clone(), max_seen.clone());

    let host = ScriptHost::new();
    host.register(DEFAULT_OBJECTIVE_NAME, move |args, nargout| {
        let current = now.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(current, Ordering::SeqCst);
        std::thread::yield_now();
        let out = weighted_sum_objective(args, nargout);
        now.fetch_sub(1, Ordering::SeqCst);
        out
    });

    let sampler = ReplaySampler::new(grid(200, 2)).parallel(true);
    SamplerBridge::new(Arc::new(host), &sampler)
        .invoke(0, &named_args(2.0))
        .unwrap();
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn objective_error_aborts_run() {
    let host = Arc::new(ScriptHost::new());
    host.register(DEFAULT_OBJECTIVE_NAME, |_, _| {
        Err(HostError::raised("user:outOfSupport", "point outside the support"))
    });
    let sampler = ReplaySampler::new(grid(5, 2));

    let err = SamplerBridge::new(host.clone(), &sampler)
        .invoke(0, &named_args(2.0))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::DispatchFailed { source: HostError::Raised { .. }, .. }
    ));
    assert_eq!(err.category(), ErrorCategory::Dispatch);
    // The first failure ends the sampler's run; nothing is recorded.
    assert_eq!(host.call_count(), 1);
    assert!(sampler.results().is_empty());
    assert_eq!(sampler.runs(), 1);
}

#[test]
fn objective_error_stops_a_sampler_that_never_gives_up() {
    let handle = FunctionHandle::new("@(x) fail(x)", |_, _| {
        Err(HostError::raised("user:outOfSupport", "point outside the support"))
    });
    let host = Arc::new(ScriptHost::new());
    host.register(DEFAULT_OBJECTIVE_NAME, |_, _| {
        Err(HostError::raised("user:outOfSupport", "point outside the support"))
    });

    for rhs in [named_args(3.0), handle_args(3.0, &handle)] {
        let sampler = UntilFinite::new(10, 100_000);
        let before = host.call_count();

        let err = SamplerBridge::new(host.clone(), &sampler)
            .invoke(0, &rhs)
            .unwrap_err();
        assert!(matches!(err, BridgeError::DispatchFailed { .. }));
        assert_eq!(sampler.calls(), 1);
        assert_eq!(host.call_count() - before, 1);
    }

    // The run slot is free again after the abort.
    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);
    let sampler = UntilFinite::new(10, 100_000);
    let summary = SamplerBridge::new(host, &sampler)
        .invoke(0, &named_args(3.0))
        .unwrap();
    assert_eq!(sampler.calls(), 10);
    assert_eq!(summary.evaluations, 10);
}

#[test]
fn parallel_run_stops_after_objective_error() {
    let host = Arc::new(ScriptHost::new());
    host.register(DEFAULT_OBJECTIVE_NAME, |_, _| {
        Err(HostError::raised("user:outOfSupport", "point outside the support"))
    });
    let sampler = ReplaySampler::new(grid(2_000, 2)).parallel(true);

    let err = SamplerBridge::new(host, &sampler)
        .invoke(0, &named_args(2.0))
        .unwrap_err();
    assert!(matches!(err, BridgeError::DispatchFailed { .. }));
    assert!(sampler.results().is_empty());
}

#[test]
fn non_callable_objective_is_rejected_before_the_sampler() {
    let sampler = ReplaySampler::new(grid(1, 2));
    let bridge = SamplerBridge::new(Arc::new(ScriptHost::new()), &sampler);

    let mut rhs = named_args(2.0);
    rhs.push(HostValue::from(3.0));
    let err = bridge.invoke(0, &rhs).unwrap_err();
    assert_eq!(err, BridgeError::InvalidHandleType { class: "double".into() });
    assert_eq!(err.category(), ErrorCategory::Usage);
    assert_eq!(sampler.runs(), 0);
}

#[test]
fn missing_objective_function_aborts_run() {
    let sampler = ReplaySampler::new(grid(1, 2));
    let err = SamplerBridge::new(Arc::new(ScriptHost::new()), &sampler)
        .invoke(0, &named_args(2.0))
        .unwrap_err();
    assert_eq!(
        err,
        BridgeError::DispatchFailed {
            function: DEFAULT_OBJECTIVE_NAME.into(),
            source: HostError::UndefinedFunction(DEFAULT_OBJECTIVE_NAME.into()),
        }
    );
}

#[test]
fn non_scalar_result_aborts_run() {
    let handle = FunctionHandle::new("@(x) x", |args, _| Ok(vec![args[0].clone()]));
    let sampler = ReplaySampler::new(grid(3, 2));
    let err = SamplerBridge::new(Arc::new(ScriptHost::new()), &sampler)
        .invoke(0, &handle_args(2.0, &handle))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::NonScalarResult { rows: 2, cols: 1, .. }
    ));
}

#[test]
fn panicking_objective_is_reported_and_next_run_works() {
    let handle = FunctionHandle::new("@(x) error()", |_, _| panic!("bad objective"));
    let sampler = ReplaySampler::new(grid(2, 1)).parallel(true);
    let host = Arc::new(ScriptHost::new());

    let err = SamplerBridge::new(host.clone(), &sampler)
        .invoke(0, &handle_args(1.0, &handle))
        .unwrap_err();
    assert_eq!(err, BridgeError::ObjectivePanicked("bad objective".into()));

    host.register(DEFAULT_OBJECTIVE_NAME, weighted_sum_objective);
    let sampler = ReplaySampler::new(vec![vec![2.0]]);
    SamplerBridge::new(host, &sampler)
        .invoke(0, &named_args(1.0))
        .unwrap();
    assert_eq!(sampler.results(), vec![2.0]);
}

#[test]
fn captured_handle_is_released_on_every_exit_path() {
    let handle = FunctionHandle::new("@(x) weighted_sum(x)", weighted_sum_objective);
    let rhs = handle_args(2.0, &handle);
    let baseline = handle.ref_count();
    let host = Arc::new(ScriptHost::new());

    let ok = ReplaySampler::new(grid(3, 2));
    SamplerBridge::new(host.clone(), &ok).invoke(0, &rhs).unwrap();
    assert_eq!(handle.ref_count(), baseline);

    let aborted = ReplaySampler::new(grid(3, 2)).with_status(3);
    SamplerBridge::new(host.clone(), &aborted)
        .invoke(0, &rhs)
        .unwrap_err();
    assert_eq!(handle.ref_count(), baseline);

    let failing = FunctionHandle::new("@(x) fail", |_, _| Err(HostError::raised("u:f", "no")));
    let failing_rhs = handle_args(2.0, &failing);
    let failing_baseline = failing.ref_count();
    SamplerBridge::new(host, &ok).invoke(0, &failing_rhs).unwrap_err();
    assert_eq!(failing.ref_count(), failing_baseline);
}

#[test]
fn custom_objective_name_and_forced_serialization() {
    let host = ScriptHost::new().with_reentrant(true);
    host.register("logTarget", weighted_sum_objective);
    let sampler = ReplaySampler::new(grid(4, 2)).parallel(true);

    let summary = SamplerBridge::new(Arc::new(host), &sampler)
        .with_options(BridgeOptions {
            objective_name: "logTarget".into(),
            serialize_host_calls: Some(true),
        })
        .invoke(0, &named_args(2.0))
        .unwrap();
    assert_eq!(summary.evaluations, 4);
}

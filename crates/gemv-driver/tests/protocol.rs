//! Handshake and streaming protocol tests against the software model
//!
//! Every scenario drives the model through the public driver API or raw
//! register accesses, then inspects model state directly.

use gemv_chip::regs::control;
use gemv_driver::selftest::Lcg;
use gemv_driver::{
    from_fn, reference_gemv, AcceleratorModel, Completion, DimMode, DriverConfig, GemvDriver,
    GemvError, GemvRegisters, Job, ModelConfig, Phase, ReferenceEngine, RunConfig, Status,
};

/// Model whose outputs encode their own index: `y[i] = 1000 + i`
fn index_tagged(default_dim: usize, latency: u64) -> AcceleratorModel {
    AcceleratorModel::with_engine(
        ModelConfig {
            default_dim,
            cycles_per_access: 0,
        },
        from_fn(move |job: &Job<'_>| Completion {
            outputs: (0..job.out_dim)
                .map(|i| 1000 + i32::try_from(i).expect("index fits"))
                .collect(),
            latency_cycles: latency,
        }),
    )
}

fn reference_model(default_dim: usize, latency: u64) -> AcceleratorModel {
    AcceleratorModel::with_engine(
        ModelConfig {
            default_dim,
            cycles_per_access: 0,
        },
        ReferenceEngine::with_fixed_latency(latency),
    )
}

fn driver(model: AcceleratorModel) -> GemvDriver<AcceleratorModel> {
    let dd = model.config().default_dim;
    GemvDriver::with_config(model, DriverConfig::default().with_default_dim(dd))
}

#[test]
fn test_drain_returns_outputs_in_index_order() {
    let configs = [
        RunConfig::new(DimMode::Default, DimMode::Default, false),
        RunConfig::new(DimMode::Extended, DimMode::Extended, false),
        RunConfig::new(DimMode::Default, DimMode::Extended, false),
    ];
    for (seed, config) in (1u32..).zip(configs) {
        let mut drv = driver(index_tagged(8, 3));
        let mut lcg = Lcg::new(seed);
        let x = lcg.fill_i8(config.len_elems(8));
        let w = lcg.fill_i8(config.weight_elems(8));

        drv.load_operands(&x, &w, None, config).expect("load");
        drv.start_run().expect("start");
        drv.registers_mut().run_to_completion();
        let y = drv.read_outputs().expect("drain");

        let expected: Vec<i32> = (1000..).take(config.out_elems(8)).collect();
        assert_eq!(y, expected, "seed {seed}, {config:?}");
    }
}

#[test]
fn test_identity_scenario_and_start_while_busy() {
    // X = [1, 2, 3, 4], W = I₄ (default size 4), latency 5 cycles
    let mut drv = driver(reference_model(4, 5));
    let x = [1i8, 2, 3, 4];
    let mut w = [0i8; 16];
    for i in 0..4 {
        w[i * 4 + i] = 1;
    }

    drv.load_operands(&x, &w, None, RunConfig::default())
        .expect("load");
    drv.start_run().expect("start");
    assert!(drv.status().busy());

    // A second start is refused before it reaches the register file.
    let err = drv.start_run().expect_err("second start must fail");
    assert!(matches!(err, GemvError::Protocol { operation: "start_run", .. }));
    assert_eq!(drv.registers().ignored_starts(), 0);

    drv.registers_mut().advance(5);
    assert_eq!(drv.status(), Status::DONE);
    assert_eq!(drv.read_outputs().expect("drain"), vec![1, 2, 3, 4]);
    drv.clear().expect("clear");
    assert!(drv.status().is_idle());
}

#[test]
fn test_raw_start_while_busy_changes_nothing() {
    let mut model = index_tagged(4, 10);
    for v in [1, 2] {
        model.write_x(v);
    }
    model.write_control(control::START);
    model.advance(3);

    model.write_x(9);
    let before_ops = model.operands().x.to_vec();
    let before_cursor = model.y_cursor();
    let before_config = model.run_config();
    let before_cycle = model.cycle();

    model.write_control(control::START | control::LEN_64 | control::OUT_DIM_64);

    assert_eq!(model.ignored_starts(), 1);
    assert_eq!(model.phase(), Phase::Running);
    assert_eq!(model.operands().x, before_ops.as_slice());
    assert_eq!(model.y_cursor(), before_cursor);
    assert_eq!(model.run_config(), before_config);
    assert_eq!(model.cycle(), before_cycle);

    model.advance(7);
    assert_eq!(model.results().len(), 4, "in-flight run kept its out_dim");
}

#[test]
fn test_clear_is_idempotent() {
    let mut drv = driver(reference_model(4, 1));
    drv.clear().expect("clear on idle");
    drv.clear().expect("clear twice");
    assert!(drv.status().is_idle());

    drv.load_operands(&[1; 4], &[1; 16], None, RunConfig::default())
        .expect("load");
    drv.start_run().expect("start");
    drv.registers_mut().run_to_completion();
    drv.clear().expect("clear after done");
    drv.clear().expect("clear again");
    assert_eq!(drv.registers().phase(), Phase::Idle);
    assert_eq!(drv.registers().results(), &[4, 4, 4, 4], "results survive clear");
}

#[test]
fn test_clear_while_busy_rejected() {
    let mut drv = driver(reference_model(4, 50));
    drv.load_operands(&[1; 4], &[1; 16], None, RunConfig::default())
        .expect("load");
    drv.start_run().expect("start");
    assert!(drv.clear().expect_err("busy").is_protocol());
    assert!(drv.status().busy());
}

#[test]
fn test_y_next_saturates_past_last_element() {
    let mut drv = driver(index_tagged(4, 1));
    drv.load_operands(&[0; 4], &[0; 16], None, RunConfig::default())
        .expect("load");
    drv.start_run().expect("start");
    drv.registers_mut().run_to_completion();
    drv.read_outputs().expect("drain");

    let regs = drv.registers_mut();
    for _ in 0..8 {
        regs.pulse_y_next();
    }
    assert_eq!(regs.y_cursor(), 3);
    assert_eq!(regs.read_y(), 1003);

    assert!(drv.read_outputs().expect_err("second drain").is_protocol());
}

#[test]
fn test_streamed_operands_round_trip() {
    let mut drv = driver(reference_model(4, 1));
    let config = RunConfig::new(DimMode::Extended, DimMode::Default, true);
    let mut lcg = Lcg::new(42);
    let x = lcg.fill_i8(8);
    let w = lcg.fill_i8(32);
    let b = [7, -7, 100_000, i32::MIN];

    drv.load_operands(&x, &w, Some(&b), config).expect("load");

    let ops = drv.registers().operands();
    assert_eq!(ops.x, x.as_slice());
    assert_eq!(ops.w, w.as_slice());
    assert_eq!(ops.b, &b);
}

#[test]
fn test_bias_runs_match_reference() {
    let mut drv = driver(reference_model(4, 2));
    let config = RunConfig::new(DimMode::Default, DimMode::Extended, true);
    let mut lcg = Lcg::new(5);
    let x = lcg.fill_i8(4);
    let w = lcg.fill_i8(32);
    let b: Vec<i32> = (0..8).map(|_| lcg.next_bias()).collect();

    drv.load_operands(&x, &w, Some(&b), config).expect("load");
    drv.start_run().expect("start");
    drv.registers_mut().run_to_completion();
    let y = drv.read_outputs().expect("drain");

    assert_eq!(y, reference_gemv(&w, &x, Some(&b), 8, 4));
    assert_ne!(y, reference_gemv(&w, &x, None, 8, 4));
}

#[test]
fn test_bias_values_ignored_when_disabled() {
    // Clock ticks on every access so run() completes unattended.
    let model = AcceleratorModel::with_engine(
        ModelConfig {
            default_dim: 4,
            cycles_per_access: 1,
        },
        ReferenceEngine::with_fixed_latency(1),
    );
    let mut drv = driver(model);
    let y = drv
        .run(&[1; 4], &[1; 16], Some(&[50; 4]), RunConfig::default())
        .expect("run");
    assert_eq!(y, vec![4, 4, 4, 4]);
}

#[test]
fn test_new_start_after_done_without_clear() {
    let mut model = reference_model(2, 1);
    for v in [1, 1] {
        model.write_x(v);
    }
    for v in [1, 2, 3, 4] {
        model.write_w(v);
    }
    model.write_control(control::START);
    model.advance(1);
    assert_eq!(model.results(), &[3, 7]);

    for v in [2, 0] {
        model.write_x(v);
    }
    for v in [1, 2, 3, 4] {
        model.write_w(v);
    }
    model.write_control(control::START);
    assert_eq!(model.read_status(), Status::BUSY);
    model.advance(1);
    assert_eq!(model.results(), &[2, 6]);
    assert_eq!(model.runs_completed(), 2);
}

#[test]
fn test_operand_store_overflow_is_counted() {
    let mut model = reference_model(2, 1);
    for _ in 0..100 {
        model.write_w(1);
    }
    // capacity (2 × default)²
    assert_eq!(model.operands().w.len(), 16);
    assert_eq!(model.dropped_writes(), 84);
}

#[test]
fn test_second_load_before_start_rejected() {
    let mut drv = driver(reference_model(2, 1));
    let identity = [1i8, 0, 0, 1];

    drv.load_operands(&[1, 1], &identity, None, RunConfig::default())
        .expect("first load");
    let err = drv
        .load_operands(&[5, 7], &identity, None, RunConfig::default())
        .expect_err("reload before start must fail");
    assert!(matches!(err, GemvError::Protocol { operation: "load_operands", .. }));
    assert_eq!(drv.registers().operands().x, &[1, 1], "nothing appended");

    // Extended-size pending load, then a default-size reload: still refused.
    let mut drv = driver(reference_model(2, 1));
    let extended = RunConfig::new(DimMode::Extended, DimMode::Extended, false);
    drv.load_operands(&[2; 4], &[1; 16], None, extended)
        .expect("extended load");
    assert!(drv
        .load_operands(&[3, 3], &identity, None, RunConfig::default())
        .expect_err("reload")
        .is_protocol());
    assert_eq!(drv.registers().dropped_writes(), 0);

    // The pending load runs as loaded; afterwards the next load is accepted.
    drv.start_run().expect("start");
    drv.registers_mut().run_to_completion();
    assert_eq!(drv.read_outputs().expect("drain"), vec![8; 4]);
    drv.clear().expect("clear");
    drv.load_operands(&[5, 7], &identity, None, RunConfig::default())
        .expect("load after start");
    drv.start_run().expect("start");
    drv.registers_mut().run_to_completion();
    assert_eq!(drv.read_outputs().expect("drain"), vec![5, 7]);
}

#[test]
fn test_load_while_busy_leaves_accelerator_untouched() {
    let mut drv = driver(reference_model(2, 10));
    let identity = [1i8, 0, 0, 1];
    drv.load_operands(&[4, -4], &identity, None, RunConfig::default())
        .expect("load");
    drv.start_run().expect("start");
    assert!(drv.status().busy());

    let err = drv
        .load_operands(&[9, 9], &[1; 4], Some(&[1, 1]), RunConfig::default())
        .expect_err("load while busy");
    assert!(err.is_protocol());

    let regs = drv.registers();
    assert!(regs.operands().x.is_empty());
    assert!(regs.operands().w.is_empty());
    assert!(regs.operands().b.is_empty());
    assert_eq!(regs.dropped_writes(), 0);
    assert_eq!(regs.phase(), Phase::Running);

    drv.registers_mut().run_to_completion();
    assert_eq!(drv.read_outputs().expect("drain"), vec![4, -4]);
}

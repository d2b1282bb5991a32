//! One GEMV run on the software model
//!
//! Streams a small diagonal matrix, then drains and prints the outputs.

use gemv_driver::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("gemv_driver=info")
        .init();

    let model = AcceleratorModel::with_engine(
        ModelConfig {
            cycles_per_access: 1,
            ..ModelConfig::default()
        },
        ReferenceEngine::new(),
    );
    let mut drv = GemvDriver::with_config(model, DriverConfig::from_env());

    let config = RunConfig::default();
    let n = config.len_elems(drv.config().default_dim);
    let x: Vec<i8> = (0..n).map(|i| i8::try_from(i).unwrap_or(i8::MAX)).collect();
    let w: Vec<i8> = (0..n * n).map(|k| if k % (n + 1) == 0 { 2 } else { 0 }).collect();

    let y = drv.run(&x, &w, None, config)?;
    println!("y = {y:?}");
    println!(
        "{} cycles, {} run(s)",
        drv.registers().cycle(),
        drv.registers().runs_completed()
    );
    Ok(())
}

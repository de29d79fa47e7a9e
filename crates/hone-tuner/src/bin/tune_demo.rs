//! Tunes a synthetic dice-detection pipeline: four image-processing
//! parameters driven until the simulated contour count lands within one of
//! the expected ten dice. Successful bound ranges persist under
//! `HONE_REMINDER_DIR` (default `reminders/`), so a second run warm-starts.

use hone_tuner::{FileReminderStore, SearchEngine};
use hone_types::ParameterSet;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let reminder_dir =
        std::env::var("HONE_REMINDER_DIR").unwrap_or_else(|_| "reminders".to_string());

    let mut params = ParameterSet::new();
    // Blur kernels must be odd.
    params.add_with("blur", 3.0, 31.0, |v| if v % 2.0 == 0.0 { v + 1.0 } else { v })?;
    params.add("threshold", 50.0, 150.0)?;
    params.add("canny1", 50.0, 200.0)?;
    params.add("canny2", 50.0, 200.0)?;

    let store = FileReminderStore::new(&reminder_dir);
    let mut engine = SearchEngine::new(params).with_store("dicer", Box::new(store));

    let report = engine.run(
        |set: &ParameterSet| {
            let blur = set.value("blur")?;
            let threshold = set.value("threshold")?;
            let canny1 = set.value("canny1")?;
            let canny2 = set.value("canny2")?;

            // Stand-in for the real image pipeline: phantom contours appear
            // as each parameter drifts from the sweet spot, and the engine
            // sees the count of contours beyond the expected ten.
            let extra = (blur - 11.0).abs() / 4.0
                + (threshold - 96.0).abs() / 16.0
                + (canny1 - 80.0).abs() / 40.0
                + (canny2 - 160.0).abs() / 40.0;
            Ok(extra)
        },
        1.0,
    )?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("final values:");
    for (name, value) in engine.params().values() {
        println!("  {name}: {value}");
    }

    Ok(())
}

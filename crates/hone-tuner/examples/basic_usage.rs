use std::sync::Arc;

use hone_tuner::{MemoryReminderStore, ReminderStore, SearchEngine};
use hone_types::ParameterSet;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Two independent dimensions with a known sweet spot at (3, 8).
    let mut params = ParameterSet::new();
    params.add("a", 0.0, 10.0)?;
    params.add("b", 0.0, 10.0)?;
    println!("Registered {} parameters", params.len());

    let store = Arc::new(MemoryReminderStore::new());
    let objective = |set: &ParameterSet| {
        Ok((set.value("a")? - 3.0).abs() + (set.value("b")? - 8.0).abs())
    };

    // First search starts cold from the full ranges.
    let mut engine =
        SearchEngine::new(params.clone()).with_store("demo", Box::new(store.clone()));
    let report = engine.run(objective, 2.5)?;
    println!(
        "first run: {:?} after {} evaluations",
        report.outcome, report.evaluations
    );

    // A repeat search warm-starts from the remembered bounds.
    let mut engine = SearchEngine::new(params).with_store("demo", Box::new(store.clone()));
    let report = engine.run(objective, 2.5)?;
    println!(
        "second run: {:?} after {} evaluations",
        report.outcome, report.evaluations
    );
    println!("remembered configurations: {}", store.load("demo").len());

    Ok(())
}

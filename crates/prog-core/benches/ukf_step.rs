use criterion::{black_box, Criterion};
use prog_core::{ConfigMap, MessageId, Observer, SystemModel, Ukf};
use std::{env, sync::Arc, time::Duration};

struct Oscillator;

impl SystemModel for Oscillator {
    fn state_size(&self) -> usize {
        4
    }
    fn inputs(&self) -> &[MessageId] {
        &[]
    }
    fn outputs(&self) -> &[MessageId] {
        const IDS: [MessageId; 2] = [MessageId::VOLTS, MessageId::AMPERES];
        &IDS
    }
    fn events(&self) -> &[MessageId] {
        &[]
    }
    fn state_eqn(&self, _t: f64, x: &[f64], _u: &[f64], dt: f64) -> Result<Vec<f64>, prog_core::ProgError> {
        Ok(vec![x[0] + dt * x[1], x[1] - dt * x[0] * 0.1, x[2], x[3]])
    }
    fn output_eqn(&self, _t: f64, x: &[f64]) -> Result<Vec<f64>, prog_core::ProgError> {
        Ok(vec![x[0], x[1]])
    }
    fn initialize(&self, _u: &[f64], _z: &[f64]) -> Result<Vec<f64>, prog_core::ProgError> {
        Ok(vec![1.0, 0.0, 0.0, 0.0])
    }
}

fn config() -> ConfigMap {
    let mut cfg = ConfigMap::new();
    cfg.set(
        "Observer.Q",
        vec!["0.01", "0", "0", "0", "0", "0.01", "0", "0", "0", "0", "0.01", "0", "0", "0", "0", "0.01"]
            .into_iter()
            .map(String::from)
            .collect(),
    );
    cfg.set(
        "Observer.R",
        vec!["0.1", "0", "0", "0.1"].into_iter().map(String::from).collect(),
    );
    cfg
}

/// One UKF `step` call over a 4-state, 2-output model — the hot loop
/// `AsyncObserver` runs on every complete input/output round.
fn bench_ukf_step(c: &mut Criterion) {
    c.bench_function("ukf_step_4state_2output", |b| {
        let model: Arc<dyn SystemModel> = Arc::new(Oscillator);
        let mut ukf = Ukf::new(model, &config()).unwrap();
        ukf.initialize(0.0, vec![1.0, 0.0, 0.0, 0.0], vec![]).unwrap();
        let mut t = 1.0;
        b.iter(|| {
            ukf.step(t, &[], &[1.0, 0.0]).unwrap();
            t += 1.0;
            black_box(ukf.get_state_mean());
        });
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_ukf_step(&mut criterion);
    criterion.final_summary();
}

//! `SystemModel` / `PrognosticsModel` — the deterministic equation
//! contract every concrete physical model implements.
//!
//! Grounded on `original_source/inc/Models/SystemModel.h` and
//! `PrognosticsModel.h`: fixed-size state/input/output/event-state
//! vectors, noise-free equations as the primitives, and a default
//! noise-accumulating wrapper (`dt * n[i]` added element-wise) so a
//! concrete model only has to implement the noise-free variant.
use crate::error::ProgError;
use crate::message::MessageId;

/// The non-prognostics half of the contract: state, input, output and
/// event-state equations, with no threshold concept.
pub trait SystemModel: Send + Sync {
    fn state_size(&self) -> usize;
    fn inputs(&self) -> &[MessageId];
    fn outputs(&self) -> &[MessageId];
    fn events(&self) -> &[MessageId];

    /// The pure, noise-free state transition. `dt` is in seconds.
    fn state_eqn(&self, t: f64, x: &[f64], u: &[f64], dt: f64) -> Result<Vec<f64>, ProgError>;

    /// `state_eqn` plus additive process noise `n`, scaled by `dt`:
    /// `state_eqn(t, x, u, dt)[i] + dt * n[i]`. Overriding this directly
    /// is rarely necessary; the default composes `state_eqn`.
    fn state_eqn_noisy(
        &self,
        t: f64,
        x: &[f64],
        u: &[f64],
        n: &[f64],
        dt: f64,
    ) -> Result<Vec<f64>, ProgError> {
        let mut next = self.state_eqn(t, x, u, dt)?;
        if next.len() != n.len() {
            return Err(ProgError::size_mismatch(format!(
                "state_eqn produced {} elements but noise vector has {}",
                next.len(),
                n.len()
            )));
        }
        for (xi, ni) in next.iter_mut().zip(n.iter()) {
            *xi += dt * ni;
        }
        Ok(next)
    }

    /// The pure, noise-free output equation.
    fn output_eqn(&self, t: f64, x: &[f64]) -> Result<Vec<f64>, ProgError>;

    /// `output_eqn` plus additive measurement noise, added directly
    /// (unscaled by `dt`, matching the original's `outputEqn(..., v)`
    /// overload).
    fn output_eqn_noisy(&self, t: f64, x: &[f64], v: &[f64]) -> Result<Vec<f64>, ProgError> {
        let mut z = self.output_eqn(t, x)?;
        if z.len() != v.len() {
            return Err(ProgError::size_mismatch(format!(
                "output_eqn produced {} elements but noise vector has {}",
                z.len(),
                v.len()
            )));
        }
        for (zi, vi) in z.iter_mut().zip(v.iter()) {
            *zi += vi;
        }
        Ok(z)
    }

    /// The event-state vector (one entry per id in `events()`), in
    /// `[0, 1]` with 0 meaning the event has occurred. Defaults to an
    /// empty vector for models with no events of their own (the original
    /// source's default `eventStateEqn`).
    fn event_state_eqn(&self, _t: f64, _x: &[f64]) -> Result<Vec<f64>, ProgError> {
        Ok(Vec::new())
    }

    /// Optional named observables, beyond the declared outputs. Defaults
    /// to an empty vector.
    fn observables_eqn(&self, _t: f64, _x: &[f64]) -> Result<Vec<f64>, ProgError> {
        Ok(Vec::new())
    }

    /// Produces an initial state vector from an initial input/output
    /// pair, used by the observer's single initialization round.
    fn initialize(&self, u: &[f64], z: &[f64]) -> Result<Vec<f64>, ProgError>;

    /// The nominal integration step, in seconds, used when a caller does
    /// not supply one explicitly.
    fn default_time_step(&self) -> f64 {
        1.0
    }
}

/// The prognostics half of the contract: adds the threshold equation a
/// predictor uses to detect "has this event occurred yet".
pub trait PrognosticsModel: SystemModel {
    /// One boolean per event id: whether the threshold for that event has
    /// been crossed at state `x`, time `t`.
    fn threshold_eqn(&self, t: f64, x: &[f64]) -> Result<Vec<bool>, ProgError>;

    /// How many of `inputs()` are genuine control inputs versus
    /// accumulated/derived inputs a subclass appends; defaults to the
    /// full input count, matching the original's two-constructor split
    /// (explicit count vs `inputs.size()`).
    fn input_parameter_count(&self) -> usize {
        self.inputs().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity {
        inputs: Vec<MessageId>,
        outputs: Vec<MessageId>,
        events: Vec<MessageId>,
    }

    impl SystemModel for Identity {
        fn state_size(&self) -> usize {
            2
        }
        fn inputs(&self) -> &[MessageId] {
            &self.inputs
        }
        fn outputs(&self) -> &[MessageId] {
            &self.outputs
        }
        fn events(&self) -> &[MessageId] {
            &self.events
        }
        fn state_eqn(&self, _t: f64, x: &[f64], _u: &[f64], _dt: f64) -> Result<Vec<f64>, ProgError> {
            Ok(x.to_vec())
        }
        fn output_eqn(&self, _t: f64, x: &[f64]) -> Result<Vec<f64>, ProgError> {
            Ok(vec![x[0] * x[1]])
        }
        fn initialize(&self, u: &[f64], _z: &[f64]) -> Result<Vec<f64>, ProgError> {
            Ok(u.to_vec())
        }
    }

    #[test]
    fn noisy_state_eqn_is_noise_free_plus_dt_times_noise() {
        let model = Identity {
            inputs: vec![],
            outputs: vec![],
            events: vec![],
        };
        let x = vec![1.0, 2.0];
        let n = vec![0.5, -0.5];
        let dt = 0.1;
        let noise_free = model.state_eqn(0.0, &x, &[], dt).unwrap();
        let noisy = model.state_eqn_noisy(0.0, &x, &[], &n, dt).unwrap();
        for i in 0..x.len() {
            assert!((noisy[i] - (noise_free[i] + dt * n[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn default_event_state_and_observables_are_empty() {
        let model = Identity {
            inputs: vec![],
            outputs: vec![],
            events: vec![],
        };
        assert!(model.event_state_eqn(0.0, &[1.0, 2.0]).unwrap().is_empty());
        assert!(model.observables_eqn(0.0, &[1.0, 2.0]).unwrap().is_empty());
    }
}

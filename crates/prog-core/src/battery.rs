//! `BatteryModel` — a representative [`PrognosticsModel`] implementation.
//!
//! Grounded on `original_source/inc/Models/BatteryModel.h`'s state/input/
//! output shape (`stateIndices::{Tb, Vo, Vsn, Vsp, qnB, qnS, qpB, qpS}`,
//! a single power input, `{Vm, Tbm}` outputs) — the full ~60-constant
//! electrochemical parameter table is out of scope (`spec.md` §1: "full
//! physical-model parameter tables" is an explicit Non-goal), so the
//! equations here are a simplified capacity-discharge model that
//! preserves the same state shape and the same `BatteryEod` threshold
//! semantics, not the original's electrochemistry.
use crate::error::ProgError;
use crate::message::MessageId;
use crate::model::{PrognosticsModel, SystemModel};

/// State vector indices, mirroring `original_source`'s `stateIndices`.
pub mod state_index {
    pub const TB: usize = 0;
    pub const VO: usize = 1;
    pub const VSN: usize = 2;
    pub const VSP: usize = 3;
    pub const QN_B: usize = 4;
    pub const QN_S: usize = 5;
    pub const QP_B: usize = 6;
    pub const QP_S: usize = 7;
}

const INPUTS: [MessageId; 1] = [MessageId::WATTS];
const OUTPUTS: [MessageId; 2] = [MessageId::VOLTS, MessageId::KELVIN];
const EVENTS: [MessageId; 1] = [MessageId::BATTERY_EOD];

/// A simplified capacity-discharge battery model: 8-element state vector
/// (ambient/surface charge pools plus two RC-branch voltages and a
/// bulk temperature), a single power-draw input, and measured
/// voltage/temperature outputs.
pub struct BatteryModel {
    pub nominal_capacity: f64,
    pub nominal_voltage: f64,
    pub internal_resistance: f64,
    pub thermal_mass: f64,
    pub eod_voltage: f64,
    pub ambient_temperature: f64,
}

impl Default for BatteryModel {
    fn default() -> Self {
        BatteryModel {
            nominal_capacity: 7600.0,
            nominal_voltage: 4.2,
            internal_resistance: 0.07,
            thermal_mass: 2.0,
            eod_voltage: 3.0,
            ambient_temperature: 292.15,
        }
    }
}

impl BatteryModel {
    pub fn new() -> Self {
        BatteryModel::default()
    }

    fn total_charge(&self, x: &[f64]) -> f64 {
        x[state_index::QN_B] + x[state_index::QN_S] + x[state_index::QP_B] + x[state_index::QP_S]
    }
}

impl SystemModel for BatteryModel {
    fn state_size(&self) -> usize {
        8
    }

    fn inputs(&self) -> &[MessageId] {
        &INPUTS
    }

    fn outputs(&self) -> &[MessageId] {
        &OUTPUTS
    }

    fn events(&self) -> &[MessageId] {
        &EVENTS
    }

    fn state_eqn(&self, _t: f64, x: &[f64], u: &[f64], dt: f64) -> Result<Vec<f64>, ProgError> {
        if x.len() != self.state_size() {
            return Err(ProgError::size_mismatch(format!(
                "expected {} state elements, got {}",
                self.state_size(),
                x.len()
            )));
        }
        if u.len() != 1 {
            return Err(ProgError::size_mismatch(format!(
                "expected 1 input element, got {}",
                u.len()
            )));
        }
        let power = u[0];
        let voltage = self.terminal_voltage(x);
        let current = if voltage.abs() > 1e-9 { power / voltage } else { 0.0 };

        let mut next = x.to_vec();
        let discharge = current * dt;
        next[state_index::QN_B] -= discharge * 0.5;
        next[state_index::QN_S] -= discharge * 0.1;
        next[state_index::QP_B] -= discharge * 0.3;
        next[state_index::QP_S] -= discharge * 0.1;

        let heat = current * current * self.internal_resistance;
        next[state_index::TB] += dt * (heat - (x[state_index::TB] - self.ambient_temperature) * 0.01)
            / self.thermal_mass;

        let tau = 5.0;
        next[state_index::VSN] += dt * (-x[state_index::VSN] / tau);
        next[state_index::VSP] += dt * (-x[state_index::VSP] / tau);
        next[state_index::VO] = current * self.internal_resistance;

        Ok(next)
    }

    fn output_eqn(&self, _t: f64, x: &[f64]) -> Result<Vec<f64>, ProgError> {
        Ok(vec![self.terminal_voltage(x), x[state_index::TB]])
    }

    fn event_state_eqn(&self, _t: f64, x: &[f64]) -> Result<Vec<f64>, ProgError> {
        let fraction = (self.total_charge(x) / self.nominal_capacity).clamp(0.0, 1.0);
        Ok(vec![fraction])
    }

    fn initialize(&self, _u: &[f64], _z: &[f64]) -> Result<Vec<f64>, ProgError> {
        let quarter = self.nominal_capacity / 4.0;
        let mut x = vec![0.0; self.state_size()];
        x[state_index::TB] = self.ambient_temperature;
        x[state_index::QN_B] = quarter;
        x[state_index::QN_S] = quarter;
        x[state_index::QP_B] = quarter;
        x[state_index::QP_S] = quarter;
        Ok(x)
    }

    fn default_time_step(&self) -> f64 {
        1.0
    }
}

impl BatteryModel {
    fn terminal_voltage(&self, x: &[f64]) -> f64 {
        let fraction = (self.total_charge(x) / self.nominal_capacity).clamp(0.0, 1.5);
        self.nominal_voltage * fraction.sqrt() - x[state_index::VSN] - x[state_index::VSP]
            + x[state_index::VO]
    }
}

impl PrognosticsModel for BatteryModel {
    fn threshold_eqn(&self, _t: f64, x: &[f64]) -> Result<Vec<bool>, ProgError> {
        Ok(vec![self.terminal_voltage(x) <= self.eod_voltage])
    }
}

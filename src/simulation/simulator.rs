//! Real-Time Simulation Loop
//!
//! Owns the heat in progress and steps it on a fixed period: kinetics, clamp,
//! soft-sensor correction, snapshot, broadcast. The state lock covers one
//! tick's mutation and is released before fan-out.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::bus::{SnapshotBus, Subscription};
use super::snapshot::{Chemistry, LanceReading, ModelParams, Snapshot, TemperatureReading};
use super::state::{DiscreteSample, ProcessState, MAX_TEMP_C, MIN_ELEMENT_PCT, MIN_TEMP_C};
use crate::config::{KalmanSettings, Settings, SimulationSettings, SoftSensorSettings};
use crate::kinetics::params::oxygen_mol_per_s;
use crate::kinetics::{derivatives, KineticInputs, KineticParams};
use crate::process::{model_for, ProcessModel};
use crate::sensing::{derive_decarburization_rate, synthesize_offgas, ScalarKalman, SensorStatus, SoftSensor};

/// Passive cooling of a stopped vessel, °C/min
const EMERGENCY_COOLING_C_PER_MIN: f64 = 0.1;

/// Sub-lance sampling points (TSC, TSO), minutes, and their half-width
const SAMPLE_TIMES_MIN: [f64; 2] = [2.0, 7.0];
const SAMPLE_HALF_WINDOW_MIN: f64 = 0.05;

/// Scripted lance schedule, mm
const LANCE_IGNITION_MM: f64 = 1100.0;
const LANCE_PROCESS_MM: f64 = 1200.0;
const LANCE_PRESS_MM: f64 = 1000.0;

/// Off-gas volume per volume of oxygen blown (2C + O2 -> 2CO)
const OFFGAS_PER_O2: f64 = 2.0;

/// Tolerance on the accumulated clock, minutes
const CLOCK_EPSILON_MIN: f64 = 1e-9;

const HEAT_EFFICIENCY_DRIFT: f64 = 0.02;
const HEAT_EFFICIENCY_RANGE: (f64, f64) = (0.85, 0.98);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything a tick mutates.
struct Core {
    state: ProcessState,
    heat: u64,
    heat_efficiency: f64,
    reaction_rate_modifier: f64,
    base_params: KineticParams,
    coolant_duty_kj_kg: f64,
    soft_sensor: SoftSensor,
    kalman: ScalarKalman,
    kalman_settings: KalmanSettings,
    /// Carbon level integrated from the off-gas proxy alone
    offgas_c_pct: f64,
    rng: StdRng,
    history: VecDeque<Arc<Snapshot>>,
    latest: Option<Arc<Snapshot>>,
}

impl Core {
    /// Kinetic constants with this heat's learned corrections applied.
    fn effective_params(&self) -> KineticParams {
        let mut p = self.base_params.clone();
        let m = self.reaction_rate_modifier;
        p.k_si *= m;
        p.k_ti *= m;
        p.k_v *= m;
        p.k_c *= m;
        let e = self.heat_efficiency;
        p.h_si *= e;
        p.h_ti *= e;
        p.h_v *= e;
        p.h_c *= e;
        p
    }

    fn step(&mut self, settings: &SimulationSettings, dt_s: f64) {
        let dt_s = if dt_s.is_finite() { dt_s.max(0.0) } else { 0.0 };
        self.state.last_ts = Utc::now();

        // 1. Emergency stop: no reactions, passive cooling only
        if self.state.is_emergency_stop {
            let s = &mut self.state;
            s.temp_c = (s.temp_c - EMERGENCY_COOLING_C_PER_MIN * dt_s / 60.0).clamp(MIN_TEMP_C, MAX_TEMP_C);
            s.si_rate_pct_min = 0.0;
            s.c_rate_pct_min = 0.0;
            return;
        }

        // 2. Clock and heat rollover
        self.state.time_min += dt_s / 60.0;
        if self.state.time_min > settings.total_duration_min + settings.grace_min + CLOCK_EPSILON_MIN {
            self.start_new_heat(settings);
            return;
        }

        // 3. Kinetics, one explicit Euler step
        let params = self.effective_params();
        let s = &mut self.state;
        let inputs = KineticInputs {
            bath_mass_kg: settings.bath_mass_t * 1000.0,
            oxygen_mol_s: oxygen_mol_per_s(s.oxygen_flow_nm3_min * 60.0),
            stirring: settings.stirring_factor,
            elapsed_s: s.time_min * 60.0,
            coolant_power_w: settings.base_coolant_w
                + s.coolant_added_kg * self.coolant_duty_kj_kg * 1000.0 / params.coolant_window_s,
        };
        let y = s.melt();
        let d = derivatives(&y, &inputs, &params);
        let next = y.advanced(&d.rates, dt_s);
        let dc_pct_s = if next.is_finite() {
            s.apply(&next);
            s.si_rate_pct_min = d.rates.si.abs() * 60.0;
            s.c_rate_pct_min = d.rates.c.abs() * 60.0;
            d.rates.c
        } else {
            warn!("Simulation: non-finite kinetics at t={:.2} min, holding state", s.time_min);
            s.si_rate_pct_min = 0.0;
            s.c_rate_pct_min = 0.0;
            0.0
        };

        // 4. Lance
        s.lance_height_mm = match s.lance_override_mm {
            Some(mm) => mm,
            None if s.time_min < 1.0 => LANCE_IGNITION_MM,
            None if s.time_min < 5.0 => LANCE_PROCESS_MM,
            None => LANCE_PRESS_MM,
        };

        // 5. Sub-lance samples
        self.take_sample();

        // 6. Carbon fusion
        self.fuse_carbon(settings, dc_pct_s, dt_s);
    }

    fn take_sample(&mut self) {
        let now = self.state.time_min;
        let Some(target) = SAMPLE_TIMES_MIN
            .iter()
            .copied()
            .find(|t| (now - t).abs() <= SAMPLE_HALF_WINDOW_MIN)
        else {
            return;
        };
        if matches!(self.state.latest_sample, Some(prev) if (prev.time_min - target).abs() <= 0.5) {
            return;
        }
        let s = &self.state;
        let sample = DiscreteSample {
            time_min: target,
            temp_c: s.temp_c + self.rng.gen_range(-15.0..=15.0),
            c_pct: (s.c_pct + self.rng.gen_range(-0.1..=0.1)).max(MIN_ELEMENT_PCT),
            v_pct: (s.v_pct + self.rng.gen_range(-0.01..=0.01)).max(0.001),
        };
        debug!("Sub-lance sample at {:.1} min: {:.1} °C", target, sample.temp_c);
        self.state.latest_sample = Some(sample);
    }

    fn fuse_carbon(&mut self, settings: &SimulationSettings, dc_pct_s: f64, dt_s: f64) {
        self.kalman.predict(dc_pct_s * dt_s);

        let o2_nm3_h = self.state.oxygen_flow_nm3_min * 60.0;
        if o2_nm3_h <= 0.0 {
            return;
        }
        let offgas_flow = o2_nm3_h * OFFGAS_PER_O2;
        let noise = self.kalman_settings.offgas_noise.abs();
        let factor = 1.0 + self.rng.gen_range(-noise..=noise);
        let (co, co2) = synthesize_offgas(dc_pct_s * factor, offgas_flow, settings.bath_mass_t);
        let measured = derive_decarburization_rate(offgas_flow, co, co2, settings.bath_mass_t);
        self.offgas_c_pct = (self.offgas_c_pct + measured * dt_s).max(MIN_ELEMENT_PCT);
        self.kalman.update(self.offgas_c_pct);
    }

    fn start_new_heat(&mut self, settings: &SimulationSettings) {
        let mut state = ProcessState::initial(settings);
        state.temp_c = 1280.0 + self.rng.gen_range(-10.0..=10.0);
        state.si_pct = 0.25 + self.rng.gen_range(-0.05..=0.05);

        let (lo, hi) = HEAT_EFFICIENCY_RANGE;
        let drift = self.rng.gen_range(-HEAT_EFFICIENCY_DRIFT..=HEAT_EFFICIENCY_DRIFT);
        self.heat_efficiency = (self.heat_efficiency + drift).clamp(lo, hi);

        self.soft_sensor.reset();
        self.kalman.reset(state.c_pct, self.kalman_settings.initial_covariance);
        self.offgas_c_pct = state.c_pct;
        self.heat += 1;
        info!(
            "🔥 New heat #{}: T0={:.1} °C Si0={:.3} % heat_efficiency={:.3}",
            self.heat, state.temp_c, state.si_pct, self.heat_efficiency
        );
        self.state = state;
    }

    fn build_snapshot(&mut self, settings: &SimulationSettings, dt_s: f64) -> Arc<Snapshot> {
        let s = &self.state;
        let raw = s.temp_c;
        let status = self.soft_sensor.process(raw, s.si_rate_pct_min, s.c_rate_pct_min, dt_s);
        let value = if status.is_valid { raw } else { status.estimated_value.unwrap_or(raw) };

        let snapshot = Arc::new(Snapshot {
            process_time: s.time_min,
            heat: self.heat,
            temperature: TemperatureReading { value, status, ts: s.last_ts },
            chemistry: Chemistry {
                si: s.si_pct,
                v: s.v_pct,
                c: s.c_pct,
                c_fused: self.kalman.estimate(),
            },
            lance_height: LanceReading { value: s.lance_height_mm, ts: s.last_ts },
            model_params: ModelParams {
                heat_efficiency: self.heat_efficiency,
                reaction_rate_modifier: self.reaction_rate_modifier,
            },
            is_emergency_stop: s.is_emergency_stop,
            latest_discrete_sample: s.latest_sample,
        });

        self.history.push_back(snapshot.clone());
        while self.history.len() > settings.history_limit.max(1) {
            self.history.pop_front();
        }
        self.latest = Some(snapshot.clone());
        snapshot
    }
}

struct Shared {
    settings: SimulationSettings,
    bus: SnapshotBus,
    core: Mutex<Core>,
}

impl Shared {
    fn tick(&self, dt_s: f64) -> Arc<Snapshot> {
        let snapshot = {
            let mut core = lock(&self.core);
            core.step(&self.settings, dt_s);
            core.build_snapshot(&self.settings, dt_s)
        };
        self.bus.publish(snapshot.clone());
        snapshot
    }

    async fn run(self: Arc<Self>) {
        let period = self.settings.tick_period();
        let dt_s = period.as_secs_f64();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick of an interval completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.tick(dt_s);
        }
    }
}

/// The process twin. Construct once and share by `Arc`; there is no global
/// instance.
pub struct Simulator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Simulator {
    pub fn new(settings: &Settings) -> Self {
        let model = model_for(settings.model_variant, &settings.physics);
        Self::with_model(
            settings.simulation.clone(),
            settings.soft_sensor.clone(),
            settings.kalman.clone(),
            model,
        )
    }

    pub fn with_model(
        settings: SimulationSettings,
        soft_sensor: SoftSensorSettings,
        kalman: KalmanSettings,
        model: Arc<dyn ProcessModel>,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = ProcessState::initial(&settings);
        let core = Core {
            heat: 0,
            heat_efficiency: settings.heat_efficiency,
            reaction_rate_modifier: settings.reaction_rate_modifier,
            base_params: model.kinetic_params(),
            coolant_duty_kj_kg: model.coolant_duty_kj_kg(),
            soft_sensor: SoftSensor::new(soft_sensor),
            kalman: ScalarKalman::from_settings(state.c_pct, &kalman),
            kalman_settings: kalman,
            offgas_c_pct: state.c_pct,
            rng,
            history: VecDeque::new(),
            latest: None,
            state,
        };
        info!("Simulator ready ({} model)", model.variant());
        Self {
            shared: Arc::new(Shared {
                bus: SnapshotBus::new(settings.subscriber_capacity),
                settings,
                core: Mutex::new(core),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the periodic worker on the current runtime. Idempotent.
    pub fn start(&self) {
        let mut worker = lock(&self.worker);
        if matches!(worker.as_ref(), Some(handle) if !handle.is_finished()) {
            return;
        }
        let shared = self.shared.clone();
        *worker = Some(tokio::spawn(shared.run()));
        info!("🚀 Simulation loop started ({:?} period)", self.shared.settings.tick_period());
    }

    pub fn stop(&self) {
        if let Some(handle) = lock(&self.worker).take() {
            handle.abort();
            info!("Simulation loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(lock(&self.worker).as_ref(), Some(handle) if !handle.is_finished())
    }

    /// Advance one tick of `dt_s` seconds by hand and broadcast the result.
    pub fn tick(&self, dt_s: f64) -> Arc<Snapshot> {
        self.shared.tick(dt_s)
    }

    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.bus.subscriber_count()
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.shared.settings
    }

    pub fn state(&self) -> ProcessState {
        lock(&self.shared.core).state.clone()
    }

    pub fn heat(&self) -> u64 {
        lock(&self.shared.core).heat
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        lock(&self.shared.core).latest.clone()
    }

    pub fn history(&self) -> Vec<Arc<Snapshot>> {
        lock(&self.shared.core).history.iter().cloned().collect()
    }

    /// Temperature as last evaluated by the soft sensor.
    pub fn temperature(&self) -> SensorStatus {
        let core = lock(&self.shared.core);
        match &core.latest {
            Some(snapshot) => snapshot.temperature.status,
            None => SensorStatus::valid(core.state.temp_c),
        }
    }

    /// Raise the lance to the safe height and cut oxygen. Takes effect at the
    /// top of the next tick.
    pub fn emergency_stop(&self) {
        let mut core = lock(&self.shared.core);
        let s = &mut core.state;
        s.is_emergency_stop = true;
        s.lance_override_mm = None;
        s.lance_height_mm = self.shared.settings.safe_lance_mm;
        s.oxygen_flow_nm3_min = 0.0;
        warn!("🛑 Emergency stop: lance to {} mm, oxygen off", s.lance_height_mm);
    }

    pub fn resume(&self) {
        let mut core = lock(&self.shared.core);
        let s = &mut core.state;
        s.is_emergency_stop = false;
        s.lance_override_mm = None;
        s.lance_height_mm = self.shared.settings.nominal_lance_mm;
        s.oxygen_flow_nm3_min = self.shared.settings.nominal_oxygen_nm3_min();
        info!("Resumed: nominal lance and oxygen restored");
    }

    /// Rejected while stopped or for a non-physical height.
    pub fn set_lance_height(&self, mm: f64) -> bool {
        let mut core = lock(&self.shared.core);
        if core.state.is_emergency_stop || !mm.is_finite() || mm < 0.0 {
            return false;
        }
        core.state.lance_override_mm = Some(mm);
        core.state.lance_height_mm = mm;
        true
    }

    pub fn set_oxygen_flow(&self, nm3_min: f64) -> bool {
        let mut core = lock(&self.shared.core);
        if core.state.is_emergency_stop || !nm3_min.is_finite() || nm3_min < 0.0 {
            return false;
        }
        core.state.oxygen_flow_nm3_min = nm3_min;
        true
    }

    pub fn add_coolant(&self, material: &str, kg: f64) -> bool {
        if !kg.is_finite() || kg <= 0.0 {
            return false;
        }
        let mut core = lock(&self.shared.core);
        core.state.coolant_added_kg += kg;
        info!("Coolant: +{:.0} kg {} (total {:.0} kg)", kg, material, core.state.coolant_added_kg);
        true
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.worker).take() {
            handle.abort();
        }
    }
}

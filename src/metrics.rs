use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::sync::Once;
use std::time::{Duration, Instant};

use crate::flags::Flags;
use crate::registers::REGISTER_COUNT;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Counter for instructions executed by opcode
    pub static ref INSTRUCTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ls8_instructions_total", "Total number of instructions executed by opcode"),
        &["opcode", "instruction"]
    ).expect("Failed to create instructions counter");

    /// Counter for engine steps, including the final HLT
    pub static ref STEPS_TOTAL: Counter = Counter::new(
        "ls8_steps_total", "Total number of fetch-decode-execute cycles"
    ).expect("Failed to create steps counter");

    /// Histogram for instruction execution time
    pub static ref INSTRUCTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("ls8_instruction_duration_seconds", "Time spent executing instructions")
            .buckets(vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001]),
        &["instruction"]
    ).expect("Failed to create instruction duration histogram");

    /// Counter for faults by error kind
    pub static ref FAULTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ls8_faults_total", "Total number of runs ended by a fault"),
        &["kind"]
    ).expect("Failed to create faults counter");

    /// Counter for runs ended by HLT
    pub static ref HALTS_TOTAL: Counter = Counter::new(
        "ls8_halts_total", "Total number of runs ended by HLT"
    ).expect("Failed to create halts counter");

    /// Counter for API requests by endpoint and method
    pub static ref API_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ls8_api_requests_total", "Total number of API requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create API requests counter");

    /// Histogram for API request duration
    pub static ref API_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("ls8_api_request_duration_seconds", "API request duration")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "endpoint"]
    ).expect("Failed to create API request duration histogram");

    /// Gauge for machines hosted by the server
    pub static ref ACTIVE_MACHINES: Gauge = Gauge::new(
        "ls8_active_machines", "Number of hosted machine instances"
    ).expect("Failed to create active machines gauge");

    /// Gauge for register values by machine ID
    pub static ref REGISTER_VALUES: GaugeVec = GaugeVec::new(
        Opts::new("ls8_register_value", "Current register values"),
        &["machine_id", "register"]
    ).expect("Failed to create register values gauge");

    /// Gauge for flags by machine ID
    pub static ref FLAG_VALUES: GaugeVec = GaugeVec::new(
        Opts::new("ls8_flag", "Current flag states (0 or 1)"),
        &["machine_id", "flag"]
    ).expect("Failed to create flags gauge");

    /// Counter for program loads
    pub static ref PROGRAM_LOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ls8_program_loads_total", "Total number of programs loaded"),
        &["machine_id"]
    ).expect("Failed to create program loads counter");

    /// Counter for machine resets
    pub static ref MACHINE_RESETS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("ls8_machine_resets_total", "Total number of machine resets"),
        &["machine_id"]
    ).expect("Failed to create machine resets counter");
}

const REGISTER_LABELS: [&str; REGISTER_COUNT] = ["R0", "R1", "R2", "R3", "R4", "R5", "R6", "SP"];
const FLAG_LABELS: [&str; 3] = ["equal", "less_than", "greater_than"];

static INIT: Once = Once::new();

/// Register every metric with the global registry. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(INSTRUCTIONS_TOTAL.clone()),
            Box::new(STEPS_TOTAL.clone()),
            Box::new(INSTRUCTION_DURATION.clone()),
            Box::new(FAULTS_TOTAL.clone()),
            Box::new(HALTS_TOTAL.clone()),
            Box::new(API_REQUESTS_TOTAL.clone()),
            Box::new(API_REQUEST_DURATION.clone()),
            Box::new(ACTIVE_MACHINES.clone()),
            Box::new(REGISTER_VALUES.clone()),
            Box::new(FLAG_VALUES.clone()),
            Box::new(PROGRAM_LOADS_TOTAL.clone()),
            Box::new(MACHINE_RESETS_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(err) = REGISTRY.register(collector) {
                log::error!("failed to register metric: {}", err);
            }
        }
    });
}

/// Record an executed instruction
pub fn record_instruction(opcode: u8, instruction_name: &str, duration: Duration) {
    INSTRUCTIONS_TOTAL
        .with_label_values(&[&format!("0x{:02X}", opcode), instruction_name])
        .inc();

    STEPS_TOTAL.inc();

    INSTRUCTION_DURATION
        .with_label_values(&[instruction_name])
        .observe(duration.as_secs_f64());
}

pub fn record_fault(kind: &str) {
    FAULTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_halt() {
    HALTS_TOTAL.inc();
}

/// Record an API request
pub fn record_api_request(method: &str, endpoint: &str, status: u16, duration: Duration) {
    API_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    API_REQUEST_DURATION
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

pub fn set_active_machines(count: usize) {
    ACTIVE_MACHINES.set(count as f64);
}

/// Update register and flag gauges for a machine
pub fn update_machine_state(machine_id: &str, registers: [u8; REGISTER_COUNT], flags: Flags) {
    for (label, value) in REGISTER_LABELS.iter().zip(registers) {
        REGISTER_VALUES
            .with_label_values(&[machine_id, *label])
            .set(value as f64);
    }

    let states = [flags.equal(), flags.less_than(), flags.greater_than()];
    for (label, set) in FLAG_LABELS.iter().zip(states) {
        FLAG_VALUES
            .with_label_values(&[machine_id, *label])
            .set(if set { 1.0 } else { 0.0 });
    }
}

/// Drop the per-machine gauges once a machine is deleted
pub fn remove_machine(machine_id: &str) {
    for label in REGISTER_LABELS {
        let _ = REGISTER_VALUES.remove_label_values(&[machine_id, label]);
    }
    for label in FLAG_LABELS {
        let _ = FLAG_VALUES.remove_label_values(&[machine_id, label]);
    }
    let _ = PROGRAM_LOADS_TOTAL.remove_label_values(&[machine_id]);
    let _ = MACHINE_RESETS_TOTAL.remove_label_values(&[machine_id]);
}

pub fn record_program_load(machine_id: &str) {
    PROGRAM_LOADS_TOTAL.with_label_values(&[machine_id]).inc();
}

pub fn record_machine_reset(machine_id: &str) {
    MACHINE_RESETS_TOTAL.with_label_values(&[machine_id]).inc();
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use prometheus::Encoder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Reply};

use crate::config::MachineConfig;
use crate::cpu::CPU;
use crate::error::{ConfigError, Fault};
use crate::loader::parse_program;
use crate::metrics::{
    init_metrics, record_api_request, record_machine_reset, record_program_load, remove_machine,
    set_active_machines, update_machine_state, Timer, REGISTRY,
};
use crate::output::{Output, RecordingSink};
use crate::snapshot::MachineSnapshot;

/// Upper bound on steps a single `execute` request may run.
pub const MAX_STEPS_PER_REQUEST: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize)]
pub struct MachineState {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub snapshot: MachineSnapshot,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateMachineRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub config: MachineConfig,
}

#[derive(Debug, Deserialize)]
pub struct MemoryWrite {
    pub address: usize,
    pub value: u8,
}

#[derive(Debug, Deserialize)]
pub struct MemoryRead {
    pub address: usize,
    pub length: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MemoryData {
    pub address: usize,
    pub data: Vec<u8>,
}

/// A program as a `.ls8` listing or as raw bytes; exactly one must be given.
#[derive(Debug, Deserialize)]
pub struct ProgramLoad {
    pub listing: Option<String>,
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSteps {
    pub steps: u64,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub steps_executed: u64,
    pub halted: bool,
    pub fault: Option<Fault>,
    pub final_state: MachineSnapshot,
}

#[derive(Debug, Serialize)]
pub struct OutputData {
    pub numbers: Vec<u8>,
    pub text: String,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// One hosted machine and everything it has printed.
pub struct Machine {
    pub cpu: CPU,
    pub output: RecordingSink,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Machine {
    pub fn new(name: String, config: MachineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cpu: CPU::with_config(config)?,
            output: RecordingSink::new(),
            name,
            created_at: Utc::now(),
        })
    }

    pub fn get_state(&self, id: &str) -> MachineState {
        MachineState {
            id: id.to_string(),
            name: self.name.clone(),
            created_at: self.created_at,
            snapshot: self.cpu.snapshot(),
        }
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.output.clear();
    }

    pub fn execute_steps(&mut self, steps: u64) -> ExecutionResult {
        let steps = steps.min(MAX_STEPS_PER_REQUEST);
        let before = self.cpu.get_steps();
        let fault = self.cpu.run_for(steps, &mut self.output).err();
        // counts instructions that completed before a fault, too
        let steps_executed = self.cpu.get_steps() - before;

        ExecutionResult {
            steps_executed,
            halted: self.cpu.is_halted(),
            fault,
            final_state: self.cpu.snapshot(),
        }
    }

    pub fn load_program(&mut self, request: &ProgramLoad) -> Result<usize, String> {
        let bytes = match (&request.listing, &request.bytes) {
            (Some(listing), None) => parse_program(listing).map_err(|err| err.to_string())?,
            (None, Some(bytes)) => bytes.clone(),
            _ => return Err("exactly one of `listing` or `bytes` is required".to_string()),
        };
        self.cpu
            .load_program(&bytes)
            .map_err(|err| err.to_string())?;
        self.output.clear();
        Ok(bytes.len())
    }

    pub fn output_data(&self) -> OutputData {
        OutputData {
            numbers: self.output.numbers(),
            text: self.output.text(),
            outputs: self.output.outputs().to_vec(),
        }
    }

    fn publish_metrics(&self, id: &str) {
        update_machine_state(id, self.cpu.get_registers(), self.cpu.get_flags());
    }
}

pub type MachineMap = Arc<Mutex<HashMap<String, Machine>>>;

pub fn new_machine_map() -> MachineMap {
    Arc::new(Mutex::new(HashMap::new()))
}

// A panic inside one handler must not take every machine down with it.
fn lock(machines: &MachineMap) -> MutexGuard<'_, HashMap<String, Machine>> {
    machines.lock().unwrap_or_else(PoisonError::into_inner)
}

fn respond<T: Serialize>(
    method: &str,
    endpoint: &str,
    timer: &Timer,
    status: StatusCode,
    response: ApiResponse<T>,
) -> WithStatus<Json> {
    record_api_request(method, endpoint, status.as_u16(), timer.elapsed());
    warp::reply::with_status(warp::reply::json(&response), status)
}

fn not_found(method: &str, endpoint: &str, timer: &Timer) -> WithStatus<Json> {
    respond::<()>(
        method,
        endpoint,
        timer,
        StatusCode::NOT_FOUND,
        ApiResponse::error("Machine not found".to_string()),
    )
}

fn with_machines(
    machines: MachineMap,
) -> impl Filter<Extract = (MachineMap,), Error = Infallible> + Clone {
    warp::any().map(move || machines.clone())
}

pub fn routes(
    machines: MachineMap,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    // CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    // Create new machine
    let create_machine = warp::path("machine")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(create_machine_handler);

    // Get machine state
    let get_state = warp::path!("machine" / String)
        .and(warp::get())
        .and(with_machines(machines.clone()))
        .and_then(get_state_handler);

    // Reset machine
    let reset_machine = warp::path!("machine" / String / "reset")
        .and(warp::post())
        .and(with_machines(machines.clone()))
        .and_then(reset_handler);

    // Single step
    let step_machine = warp::path!("machine" / String / "step")
        .and(warp::post())
        .and(with_machines(machines.clone()))
        .and_then(step_handler);

    // Execute multiple steps
    let execute_steps = warp::path!("machine" / String / "execute")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(execute_handler);

    // Load program
    let load_program = warp::path!("machine" / String / "program")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(load_program_handler);

    // Read memory
    let read_memory = warp::path!("machine" / String / "memory")
        .and(warp::get())
        .and(warp::query::<MemoryRead>())
        .and(with_machines(machines.clone()))
        .and_then(read_memory_handler);

    // Write memory
    let write_memory = warp::path!("machine" / String / "memory")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(write_memory_handler);

    // Recorded PRN/PRA output
    let get_output = warp::path!("machine" / String / "output")
        .and(warp::get())
        .and(with_machines(machines.clone()))
        .and_then(output_handler);

    // List machines
    let list_machines = warp::path("machines")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_machines(machines.clone()))
        .and_then(list_machines_handler);

    // Delete machine
    let delete_machine = warp::path!("machine" / String)
        .and(warp::delete())
        .and(with_machines(machines))
        .and_then(delete_machine_handler);

    // Metrics endpoint
    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(metrics_handler);

    create_machine
        .or(get_state)
        .or(reset_machine)
        .or(step_machine)
        .or(execute_steps)
        .or(load_program)
        .or(read_memory)
        .or(write_memory)
        .or(get_output)
        .or(list_machines)
        .or(delete_machine)
        .or(metrics)
        .with(cors)
        .with(warp::log("ls8::api"))
}

pub async fn run_server(addr: SocketAddr) {
    init_metrics();

    let machines = new_machine_map();

    log::info!("LS-8 machine server starting on http://{}", addr);
    log::info!("  POST   /machine              - Create new machine");
    log::info!("  GET    /machine/:id          - Get machine state");
    log::info!("  POST   /machine/:id/reset    - Reset machine");
    log::info!("  POST   /machine/:id/step     - Execute single step");
    log::info!("  POST   /machine/:id/execute  - Execute multiple steps");
    log::info!("  POST   /machine/:id/program  - Load program");
    log::info!("  GET    /machine/:id/memory   - Read memory");
    log::info!("  POST   /machine/:id/memory   - Write memory");
    log::info!("  GET    /machine/:id/output   - Read printed output");
    log::info!("  GET    /machines             - List all machines");
    log::info!("  DELETE /machine/:id          - Delete machine");
    log::info!("  GET    /metrics              - Prometheus metrics endpoint");

    warp::serve(routes(machines)).run(addr).await;
}

async fn create_machine_handler(
    request: CreateMachineRequest,
    machines: MachineMap,
) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let id = Uuid::new_v4().to_string();
    let name = request.name.unwrap_or_else(|| format!("ls8-{}", &id[..8]));

    let machine = match Machine::new(name, request.config) {
        Ok(machine) => machine,
        Err(err) => {
            return Ok(respond::<MachineState>(
                "POST",
                "/machine",
                &timer,
                StatusCode::BAD_REQUEST,
                ApiResponse::error(err.to_string()),
            ))
        }
    };
    let state = machine.get_state(&id);
    machine.publish_metrics(&id);

    {
        let mut machines_lock = lock(&machines);
        machines_lock.insert(id.clone(), machine);
        set_active_machines(machines_lock.len());
    }
    log::info!("created machine {}", id);

    Ok(respond(
        "POST",
        "/machine",
        &timer,
        StatusCode::OK,
        ApiResponse::success(state),
    ))
}

async fn get_state_handler(id: String, machines: MachineMap) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let machines_lock = lock(&machines);

    Ok(match machines_lock.get(&id) {
        Some(machine) => respond(
            "GET",
            "/machine/:id",
            &timer,
            StatusCode::OK,
            ApiResponse::success(machine.get_state(&id)),
        ),
        None => not_found("GET", "/machine/:id", &timer),
    })
}

async fn reset_handler(id: String, machines: MachineMap) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    Ok(match machines_lock.get_mut(&id) {
        Some(machine) => {
            machine.reset();
            machine.publish_metrics(&id);
            record_machine_reset(&id);
            respond(
                "POST",
                "/machine/:id/reset",
                &timer,
                StatusCode::OK,
                ApiResponse::success(machine.get_state(&id)),
            )
        }
        None => not_found("POST", "/machine/:id/reset", &timer),
    })
}

async fn step_handler(id: String, machines: MachineMap) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    Ok(match machines_lock.get_mut(&id) {
        Some(machine) => {
            let result = machine.execute_steps(1);
            machine.publish_metrics(&id);
            respond(
                "POST",
                "/machine/:id/step",
                &timer,
                StatusCode::OK,
                ApiResponse::success(result),
            )
        }
        None => not_found("POST", "/machine/:id/step", &timer),
    })
}

async fn execute_handler(
    id: String,
    request: ExecuteSteps,
    machines: MachineMap,
) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    Ok(match machines_lock.get_mut(&id) {
        Some(machine) => {
            let result = machine.execute_steps(request.steps);
            machine.publish_metrics(&id);
            respond(
                "POST",
                "/machine/:id/execute",
                &timer,
                StatusCode::OK,
                ApiResponse::success(result),
            )
        }
        None => not_found("POST", "/machine/:id/execute", &timer),
    })
}

async fn load_program_handler(
    id: String,
    request: ProgramLoad,
    machines: MachineMap,
) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    Ok(match machines_lock.get_mut(&id) {
        Some(machine) => match machine.load_program(&request) {
            Ok(len) => {
                machine.publish_metrics(&id);
                record_program_load(&id);
                log::info!("loaded {} bytes into machine {}", len, id);
                respond(
                    "POST",
                    "/machine/:id/program",
                    &timer,
                    StatusCode::OK,
                    ApiResponse::success(format!("Loaded {} bytes at address $00", len)),
                )
            }
            Err(err) => respond::<String>(
                "POST",
                "/machine/:id/program",
                &timer,
                StatusCode::BAD_REQUEST,
                ApiResponse::error(err),
            ),
        },
        None => not_found("POST", "/machine/:id/program", &timer),
    })
}

async fn read_memory_handler(
    id: String,
    query: MemoryRead,
    machines: MachineMap,
) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let machines_lock = lock(&machines);

    Ok(match machines_lock.get(&id) {
        Some(machine) => {
            let length = query.length.unwrap_or(1);
            let data = machine.cpu.read_memory(query.address, length);
            respond(
                "GET",
                "/machine/:id/memory",
                &timer,
                StatusCode::OK,
                ApiResponse::success(MemoryData {
                    address: query.address,
                    data,
                }),
            )
        }
        None => not_found("GET", "/machine/:id/memory", &timer),
    })
}

async fn write_memory_handler(
    id: String,
    request: MemoryWrite,
    machines: MachineMap,
) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    Ok(match machines_lock.get_mut(&id) {
        Some(machine) => match machine.cpu.write_memory(request.address, request.value) {
            Ok(()) => respond(
                "POST",
                "/machine/:id/memory",
                &timer,
                StatusCode::OK,
                ApiResponse::success(format!(
                    "Wrote ${:02X} to address ${:02X}",
                    request.value, request.address
                )),
            ),
            Err(err) => respond::<String>(
                "POST",
                "/machine/:id/memory",
                &timer,
                StatusCode::BAD_REQUEST,
                ApiResponse::error(err.to_string()),
            ),
        },
        None => not_found("POST", "/machine/:id/memory", &timer),
    })
}

async fn output_handler(id: String, machines: MachineMap) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let machines_lock = lock(&machines);

    Ok(match machines_lock.get(&id) {
        Some(machine) => respond(
            "GET",
            "/machine/:id/output",
            &timer,
            StatusCode::OK,
            ApiResponse::success(machine.output_data()),
        ),
        None => not_found("GET", "/machine/:id/output", &timer),
    })
}

async fn list_machines_handler(machines: MachineMap) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let machines_lock = lock(&machines);

    let machine_list: Vec<MachineState> = machines_lock
        .iter()
        .map(|(id, machine)| machine.get_state(id))
        .collect();

    Ok(respond(
        "GET",
        "/machines",
        &timer,
        StatusCode::OK,
        ApiResponse::success(machine_list),
    ))
}

async fn delete_machine_handler(id: String, machines: MachineMap) -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    Ok(match machines_lock.remove(&id) {
        Some(_) => {
            set_active_machines(machines_lock.len());
            remove_machine(&id);
            log::info!("deleted machine {}", id);
            respond(
                "DELETE",
                "/machine/:id",
                &timer,
                StatusCode::OK,
                ApiResponse::success(format!("Machine {} deleted", id)),
            )
        }
        None => not_found("DELETE", "/machine/:id", &timer),
    })
}

async fn metrics_handler() -> Result<impl Reply, Infallible> {
    let timer = Timer::new();
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            record_api_request("GET", "/metrics", 200, timer.elapsed());
            Ok(warp::reply::with_header(
                String::from_utf8_lossy(&buffer).into_owned(),
                "content-type",
                encoder.format_type().to_string(),
            ))
        }
        Err(err) => {
            log::error!("failed to encode metrics: {}", err);
            record_api_request("GET", "/metrics", 500, timer.elapsed());
            Ok(warp::reply::with_header(
                "Error encoding metrics".to_string(),
                "content-type",
                "text/plain".to_string(),
            ))
        }
    }
}

//! Garnet Driver Library
//!
//! Pipeline glue for the `garnet` CLI and the integration tests: load a
//! JSON-serialized syntax tree, lower it to IR, and execute the result on
//! the reference interpreter.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use garnet_ast::Program;
use garnet_interp::{Interpreter, RuntimeError, Value, DEFAULT_MAX_DEPTH};
use garnet_ir::{IrModule, LowerError, LowerOptions, Lowerer};
use thiserror::Error;
use tracing::{debug, info};

/// Failure at any stage of the pipeline.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid syntax tree: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lowering failed with {} error(s)", .0.len())]
    Lower(Vec<LowerError>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("failed to start interpreter thread: {0}")]
    Thread(#[source] std::io::Error),

    #[error("interpreter thread panicked")]
    Panicked,
}

/// Native stack for the thread [`run_isolated`] executes on.
pub const RUN_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Invocation depth allowed on a [`RUN_STACK_SIZE`] stack.
pub const RUN_MAX_DEPTH: usize = 2_000;

/// Result of running a module: the program's value or error, plus whatever
/// it printed before finishing.
#[derive(Debug)]
pub struct Execution {
    pub result: Result<Value, RuntimeError>,
    pub output: String,
}

pub fn read_file(path: &Path) -> Result<String, DriverError> {
    fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode a program from its JSON form.
pub fn parse_program(json: &str) -> Result<Program, DriverError> {
    let program: Program = serde_json::from_str(json)?;
    debug!(statements = program.body.len(), "syntax tree loaded");
    Ok(program)
}

pub fn load_program(path: &Path) -> Result<Program, DriverError> {
    parse_program(&read_file(path)?)
}

/// Lower a program, collecting every lowering error.
pub fn lower(program: &Program, options: LowerOptions) -> Result<IrModule, DriverError> {
    let module = Lowerer::new()
        .with_options(options)
        .lower_program(program)
        .map_err(DriverError::Lower)?;
    info!(bodies = module.bodies.len(), "lowered");
    Ok(module)
}

/// Outcome of [`run_isolated`]. Values stay on the interpreter thread, so
/// only the error and the printed text come back.
#[derive(Debug)]
pub struct IsolatedRun {
    pub error: Option<RuntimeError>,
    pub output: String,
}

/// Run a lowered module on the reference interpreter.
pub fn run(module: &IrModule) -> Execution {
    run_with_depth(module, DEFAULT_MAX_DEPTH)
}

pub fn run_with_depth(module: &IrModule, max_depth: usize) -> Execution {
    let mut interp = Interpreter::new(module).with_max_depth(max_depth);
    let result = interp.run();
    if let Err(ref err) = result {
        debug!(error = %err, "program raised");
    }
    Execution {
        result,
        output: interp.take_output(),
    }
}

/// Run on a dedicated thread with a [`RUN_STACK_SIZE`] stack, allowing
/// [`RUN_MAX_DEPTH`] nested invocations.
pub fn run_isolated(module: IrModule) -> Result<IsolatedRun, DriverError> {
    let handle = thread::Builder::new()
        .name("garnet-run".to_string())
        .stack_size(RUN_STACK_SIZE)
        .spawn(move || {
            let execution = run_with_depth(&module, RUN_MAX_DEPTH);
            IsolatedRun {
                error: execution.result.err(),
                output: execution.output,
            }
        })
        .map_err(DriverError::Thread)?;
    handle.join().map_err(|_| DriverError::Panicked)
}

/// Lower and run in one step.
pub fn run_program(program: &Program, options: LowerOptions) -> Result<Execution, DriverError> {
    let module = lower(program, options)?;
    Ok(run(&module))
}

use crate::config;
use crate::error::{Error, Result};
use crate::gate::ReadinessGate;
use crate::sys::{HeapStats, Module, ModuleConfig};
use std::sync::{Arc, Mutex, Once, OnceLock, PoisonError};
use std::thread;
use tracing::{error, info, warn};

/// Owner of a codec module and the gate that announces it.
///
/// The module's linear memory is one shared address space with a LIFO scratch
/// stack, so every call takes the module lock for its whole marshal/invoke/free
/// sequence. Calls never interleave inside the heap.
#[derive(Debug, Default)]
pub struct Runtime {
    gate: ReadinessGate,
    module: OnceLock<Mutex<Module>>,
}

impl Runtime {
    /// A runtime with no module yet; calls wait (or fail with [`Error::NotReady`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime that is ready immediately.
    pub fn with_module(module: Module) -> Self {
        let gate = ReadinessGate::new();
        gate.fire();
        Self {
            gate,
            module: OnceLock::from(Mutex::new(module)),
        }
    }

    /// Instantiates a module on a background thread and installs it when done.
    ///
    /// The configuration is checked up front; instantiation itself can then
    /// only fail by running out of host memory, which aborts the process.
    pub fn spawn(config: ModuleConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let runtime = Arc::new(Self::new());
        let background = Arc::clone(&runtime);
        thread::Builder::new()
            .name("jpegasm-init".into())
            .spawn(move || background.instantiate_and_install(config))
            .map_err(|err| Error::Spawn(err.to_string()))?;
        Ok(runtime)
    }

    /// Process-wide runtime, instantiated on first use from `JPEGASM_*` settings.
    pub fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        static START: Once = Once::new();

        let runtime = GLOBAL.get_or_init(Runtime::new);
        START.call_once(|| {
            let config = config::module_config_from_env().unwrap_or_else(|err| {
                warn!(%err, "ignoring module settings from the environment");
                ModuleConfig::default()
            });
            let spawned = thread::Builder::new()
                .name("jpegasm-init".into())
                .spawn(move || runtime.instantiate_and_install(config));
            if let Err(err) = spawned {
                error!(%err, "cannot start module initialization");
                std::process::abort();
            }
        });
        runtime
    }

    /// Installs `module` and opens the gate. A runtime accepts one module, ever.
    pub fn install(&self, module: Module) -> Result<()> {
        self.module
            .set(Mutex::new(module))
            .map_err(|_| Error::AlreadyInstalled)?;
        self.gate.fire();
        info!("codec module ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Resolves once the module is installed.
    pub async fn ready(&self) {
        self.gate.await_ready().await
    }

    /// Heap bookkeeping of the installed module, if any.
    pub fn heap_stats(&self) -> Option<HeapStats> {
        let module = self.module.get()?;
        let guard = module.lock().unwrap_or_else(PoisonError::into_inner);
        Some(guard.memory().stats())
    }

    /// Runs `f` with exclusive access to the module.
    ///
    /// The gate is the only source of readiness: a module that is stored but
    /// not yet announced is not callable.
    pub(crate) fn call<R>(&self, f: impl FnOnce(&mut Module) -> Result<R>) -> Result<R> {
        if !self.gate.is_ready() {
            return Err(Error::NotReady);
        }
        let module = self.module.get().ok_or(Error::NotReady)?;
        let mut guard = module.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn instantiate_and_install(&self, config: ModuleConfig) {
        let result = Module::instantiate(config)
            .map_err(Error::from)
            .and_then(|module| self.install(module));
        if let Err(err) = result {
            // nothing can be called without a module; waiters would hang forever.
            error!(%err, "codec module failed to initialize");
            std::process::abort();
        }
    }
}

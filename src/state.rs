// state.rs

use std::sync::MutexGuard;

use crate::*;

pub type SharedMeter = Mutex<Box<dyn MeterSource + Send>>;

pub struct MyState {
    pub config: MyConfig,
    pub api_cnt: AtomicU32,
    pub meter: SharedMeter,
    pub clock: Box<dyn Clock + Send + Sync>,
    pub assets: StaticAssets,
}

impl MyState {
    pub fn new<M, C>(config: MyConfig, meter: M, clock: C, assets: StaticAssets) -> Self
    where
        M: MeterSource + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self {
            config,
            api_cnt: AtomicU32::new(0),
            meter: Mutex::new(Box::new(meter)),
            clock: Box::new(clock),
            assets,
        }
    }

    /// Next request number, for log lines.
    pub fn next_cnt(&self) -> u32 {
        self.api_cnt.fetch_add(1, Ordering::Relaxed)
    }

    pub fn meter(&self) -> MutexGuard<'_, Box<dyn MeterSource + Send>> {
        // snapshot updates are a single store, a poisoned lock is still consistent
        self.meter.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Trigger one bus transaction and return the resulting snapshot.
    ///
    /// A failed transaction returns the previous snapshot.
    pub fn fresh_snapshot(&self) -> Snapshot {
        let mut meter = self.meter();
        if !meter.trigger_read() {
            warn!("No fresh meter data, serving last snapshot");
        }
        meter.snapshot()
    }
}

// EOF

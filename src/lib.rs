// lib.rs
#![warn(clippy::large_futures)]

pub use std::{
    net,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

pub use anyhow::{anyhow, bail};
pub use serde::{Deserialize, Serialize};
pub use tokio::time::{sleep, timeout, Duration};
pub use tracing::*;

mod config;
pub use config::*;

mod clock;
pub use clock::*;

mod meter;
pub use meter::*;

mod pzem;
pub use pzem::*;

mod wifi;
pub use wifi::*;

mod formatter;
pub use formatter::*;

mod http;
pub use http::*;

mod router;
pub use router::*;

mod assets;
pub use assets::*;

mod state;
pub use state::*;

mod apiserver;
pub use apiserver::*;

#[cfg(target_os = "espidf")]
mod platform;
#[cfg(target_os = "espidf")]
pub use platform::*;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

// EOF

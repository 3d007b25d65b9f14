// formatter.rs

use std::fmt::Write;

use crate::*;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MeterData {
    pub time: i64,
    pub u: f32,
    pub i: f32,
    pub p: f32,
    pub pf: f32,
    pub e: u32,
}

impl MeterData {
    pub fn new(snapshot: &Snapshot, time: i64) -> Self {
        Self {
            time,
            u: snapshot.voltage,
            i: snapshot.current,
            p: snapshot.power,
            pf: snapshot.power_factor,
            e: snapshot.energy,
        }
    }
}

pub fn to_json<C: Clock + ?Sized>(snapshot: &Snapshot, clock: &C) -> anyhow::Result<String> {
    Ok(serde_json::to_string(&MeterData::new(
        snapshot,
        clock.unix_secs(),
    ))?)
}

pub fn to_prometheus(snapshot: &Snapshot) -> String {
    let metrics: [(&str, &dyn std::fmt::Display); 5] = [
        ("voltage", &snapshot.voltage),
        ("current", &snapshot.current),
        ("power", &snapshot.power),
        ("pf", &snapshot.power_factor),
        ("energy", &snapshot.energy),
    ];

    let mut out = String::with_capacity(128);
    for (name, value) in metrics {
        // writing to a String cannot fail
        let _ = writeln!(out, "powermeter_{name} {value}");
    }
    out
}


// EOF

// config.rs

use std::fmt;

use crate::*;

const DEFAULT_WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(s) => s,
    None => "internet",
};
const DEFAULT_WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(s) => s,
    None => "password",
};

pub const DEFAULT_API_PORT: u16 = 80;
pub const DEFAULT_METER_ADDRESS: u8 = 0x05;
pub const DEFAULT_UART_BAUD: u32 = 9600;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 30;
pub const DEFAULT_CONNECT_POLL_MS: u32 = 1000;

#[derive(Clone, Serialize, Deserialize)]
pub struct MyConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,

    pub port: u16,

    pub meter_address: u8,
    pub uart_baud: u32,
    pub bus_timeout_ms: u32,

    pub connect_attempts: u32,
    pub connect_poll_ms: u32,
    pub sntp_timeout_secs: u32,

    // initial polling interval of the dashboard page
    pub refresh_interval_secs: u32,
}

impl Default for MyConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: DEFAULT_WIFI_SSID.into(),
            wifi_pass: DEFAULT_WIFI_PASS.into(),
            port: DEFAULT_API_PORT,
            meter_address: DEFAULT_METER_ADDRESS,
            uart_baud: DEFAULT_UART_BAUD,
            bus_timeout_ms: 100,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_poll_ms: DEFAULT_CONNECT_POLL_MS,
            sntp_timeout_secs: 30,
            refresh_interval_secs: 10,
        }
    }
}

impl fmt::Debug for MyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MyConfig")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_pass", &"<redacted>")
            .field("port", &self.port)
            .field("meter_address", &format_args!("{:#04x}", self.meter_address))
            .field("uart_baud", &self.uart_baud)
            .field("bus_timeout_ms", &self.bus_timeout_ms)
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_poll_ms", &self.connect_poll_ms)
            .field("sntp_timeout_secs", &self.sntp_timeout_secs)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .finish()
    }
}

impl MyConfig {
    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms.into())
    }
}


// EOF

// platform.rs
//
// ESP-IDF implementations of the hardware seams.

use std::time::Instant;

use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    delay::{FreeRtos, TickType},
    gpio::{AnyIOPin, AnyInputPin, AnyOutputPin},
    modem::Modem,
    uart::{self, UartDriver, UART1},
    units::Hertz,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    sntp::{EspSntp, SyncStatus},
    wifi::{BlockingWifi, EspWifi},
};

use crate::*;

pub struct EspNet {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl EspNet {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { wifi })
    }
}

impl NetworkInterface for EspNet {
    fn is_connected(&mut self) -> anyhow::Result<bool> {
        if !self.wifi.is_started()? {
            return Ok(false);
        }
        Ok(self.wifi.is_up()?)
    }

    fn activate(&mut self) -> anyhow::Result<()> {
        if !self.wifi.is_started()? {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
            self.wifi.start()?;
            info!("WiFi started");
        }
        Ok(())
    }

    fn connect(&mut self, ssid: &str, pass: &str) -> anyhow::Result<()> {
        let auth_method = if pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| anyhow!("WiFi ssid too long"))?,
                password: pass
                    .try_into()
                    .map_err(|_| anyhow!("WiFi password too long"))?,
                auth_method,
                ..Default::default()
            }))?;

        // returns at once, progress is polled with is_connected()
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn ifconfig(&mut self) -> anyhow::Result<IfConfig> {
        let info = self.wifi.wifi().sta_netif().get_ip_info()?;
        Ok(IfConfig {
            ip: info.ip,
            mask_bits: info.subnet.mask.0,
            gateway: info.subnet.gateway,
            dns: info.dns,
        })
    }
}

pub struct EspRestart;

impl Restart for EspRestart {
    fn restart(&mut self) {
        FreeRtos::delay_ms(1000);
        esp_idf_hal::reset::restart();
    }
}

/// Set the system clock over SNTP. The returned handle keeps it in sync.
pub fn sync_time(timeout_secs: u32) -> anyhow::Result<EspSntp<'static>> {
    let sntp = EspSntp::new_default()?;
    info!("SNTP sync...");

    let mut waited_ms = 0;
    while !matches!(sntp.get_sync_status(), SyncStatus::Completed) {
        if waited_ms >= timeout_secs * 1000 {
            bail!("SNTP sync not completed in {timeout_secs}s");
        }
        FreeRtos::delay_ms(100);
        waited_ms += 100;
    }
    info!("Time synchronized, unix time {}", SystemClock.unix_secs());
    Ok(sntp)
}

pub struct UartBus {
    uart: UartDriver<'static>,
}

impl UartBus {
    pub fn new(uart: UART1, tx: AnyOutputPin, rx: AnyInputPin, bps: u32) -> anyhow::Result<Self> {
        use esp_idf_hal::uart::config::*;
        let ser_config = Config::new()
            .flow_control(FlowControl::None)
            .parity_none()
            .data_bits(DataBits::DataBits8)
            .stop_bits(StopBits::STOP1)
            .baudrate(Hertz(bps));
        info!("UART1 config:\n{ser_config:#?}");

        let uart = uart::UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &ser_config,
        )?;
        info!("UART1 opened.");
        Ok(Self { uart })
    }
}

impl SerialBus for UartBus {
    fn write_all(&mut self, data: &[u8]) -> anyhow::Result<()> {
        let mut rest = data;
        while !rest.is_empty() {
            let n = self.uart.write(rest)?;
            rest = &rest[n..];
        }
        Ok(())
    }

    fn read_frame(&mut self, buf: &mut [u8], timeout: Duration) -> anyhow::Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut n = 0;
        while n < buf.len() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            let ticks = TickType::new_millis(left.as_millis() as u64).ticks();
            n += self.uart.read(&mut buf[n..], ticks)?;
        }
        Ok(n)
    }

    fn discard_input(&mut self) {
        if let Err(e) = self.uart.clear_rx() {
            warn!("UART1 clear failed: {e}");
        }
    }
}

// EOF

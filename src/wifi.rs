// wifi.rs

use std::fmt;

use embedded_hal::delay::DelayNs;

use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IfConfig {
    pub ip: net::Ipv4Addr,
    pub mask_bits: u8,
    pub gateway: net::Ipv4Addr,
    pub dns: Option<net::Ipv4Addr>,
}

impl fmt::Display for IfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} gw {}", self.ip, self.mask_bits, self.gateway)?;
        if let Some(dns) = self.dns {
            write!(f, " dns {dns}")?;
        }
        Ok(())
    }
}

/// Station-mode network interface.
pub trait NetworkInterface {
    /// Associated and has an address.
    fn is_connected(&mut self) -> anyhow::Result<bool>;
    fn activate(&mut self) -> anyhow::Result<()>;
    /// Start connecting; does not wait for the result.
    fn connect(&mut self, ssid: &str, pass: &str) -> anyhow::Result<()>;
    fn ifconfig(&mut self) -> anyhow::Result<IfConfig>;
}

pub trait Restart {
    /// Reboot the device. Does not return on hardware.
    fn restart(&mut self);
}

fn log_ifconfig<N: NetworkInterface>(net: &mut N) {
    match net.ifconfig() {
        Ok(c) => info!("Network config: {c}"),
        Err(e) => warn!("Could not read network config: {e:#}"),
    }
}

/// Block until the network is up, or restart the device.
///
/// Returns immediately if already connected. Otherwise the interface is
/// activated, a connection started with the configured credentials, and the
/// status polled once per `connect_poll_ms` for `connect_attempts` polls.
/// When the budget runs out the device is restarted; the `Err` is only seen
/// where `restart()` returns.
pub fn ensure_connected<N, D, R>(
    net: &mut N,
    delay: &mut D,
    restart: &mut R,
    config: &MyConfig,
) -> anyhow::Result<()>
where
    N: NetworkInterface,
    D: DelayNs,
    R: Restart,
{
    // a failing status query counts as not connected
    if net.is_connected().unwrap_or(false) {
        log_ifconfig(net);
        return Ok(());
    }

    net.activate()?;
    info!("Connecting to network {}...", config.wifi_ssid);
    net.connect(&config.wifi_ssid, &config.wifi_pass)?;

    for attempt in 1..=config.connect_attempts {
        if net.is_connected().unwrap_or(false) {
            info!("Connected after {attempt} polls");
            log_ifconfig(net);
            return Ok(());
        }
        delay.delay_ms(config.connect_poll_ms);
        info!("Waiting to connect... ({attempt}/{})", config.connect_attempts);
    }

    error!(
        "No network after {} polls, restarting.",
        config.connect_attempts
    );
    restart.restart();
    bail!("network not connected, restart returned")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports connected on the `connect_on`th status poll after connect().
    struct SimNet {
        connected: bool,
        connect_on: Option<u32>,
        connecting: bool,
        polls: u32,
        activated: bool,
        creds: Option<(String, String)>,
    }

    impl SimNet {
        fn new(connected: bool, connect_on: Option<u32>) -> Self {
            Self {
                connected,
                connect_on,
                connecting: false,
                polls: 0,
                activated: false,
                creds: None,
            }
        }
    }

    impl NetworkInterface for SimNet {
        fn is_connected(&mut self) -> anyhow::Result<bool> {
            if self.connecting {
                self.polls += 1;
                if Some(self.polls) == self.connect_on {
                    self.connected = true;
                }
            }
            Ok(self.connected)
        }

        fn activate(&mut self) -> anyhow::Result<()> {
            self.activated = true;
            Ok(())
        }

        fn connect(&mut self, ssid: &str, pass: &str) -> anyhow::Result<()> {
            self.connecting = true;
            self.creds = Some((ssid.into(), pass.into()));
            Ok(())
        }

        fn ifconfig(&mut self) -> anyhow::Result<IfConfig> {
            Ok(IfConfig {
                ip: net::Ipv4Addr::new(192, 168, 1, 50),
                mask_bits: 24,
                gateway: net::Ipv4Addr::new(192, 168, 1, 1),
                dns: None,
            })
        }
    }

    #[derive(Default)]
    struct Sleeps(Vec<u32>);

    impl DelayNs for Sleeps {
        fn delay_ns(&mut self, ns: u32) {
            self.0.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    #[derive(Default)]
    struct Restarts(u32);

    impl Restart for Restarts {
        fn restart(&mut self) {
            self.0 += 1;
        }
    }

    fn config() -> MyConfig {
        MyConfig {
            wifi_ssid: "home".into(),
            wifi_pass: "secret".into(),
            ..Default::default()
        }
    }

    #[test]
    fn already_connected_does_nothing() {
        let mut net = SimNet::new(true, None);
        let mut sleeps = Sleeps::default();
        let mut restarts = Restarts::default();

        ensure_connected(&mut net, &mut sleeps, &mut restarts, &config()).unwrap();
        assert_eq!(net.polls, 0);
        assert!(!net.activated);
        assert!(net.creds.is_none());
        assert!(sleeps.0.is_empty());
        assert_eq!(restarts.0, 0);
    }

    #[test]
    fn never_connected_polls_30_times_then_restarts() {
        let mut net = SimNet::new(false, None);
        let mut sleeps = Sleeps::default();
        let mut restarts = Restarts::default();

        let res = ensure_connected(&mut net, &mut sleeps, &mut restarts, &config());
        assert!(res.is_err());
        assert!(net.activated);
        assert_eq!(net.polls, 30);
        assert_eq!(sleeps.0, vec![1000; 30]);
        assert_eq!(restarts.0, 1);
        assert_eq!(net.creds, Some(("home".into(), "secret".into())));
    }

    #[test]
    fn connects_within_budget() {
        let mut net = SimNet::new(false, Some(4));
        let mut sleeps = Sleeps::default();
        let mut restarts = Restarts::default();

        ensure_connected(&mut net, &mut sleeps, &mut restarts, &config()).unwrap();
        assert_eq!(net.polls, 4);
        assert_eq!(sleeps.0.len(), 3);
        assert_eq!(restarts.0, 0);
    }

    #[test]
    fn ifconfig_display() {
        let c = IfConfig {
            ip: net::Ipv4Addr::new(10, 0, 0, 2),
            mask_bits: 8,
            gateway: net::Ipv4Addr::new(10, 0, 0, 1),
            dns: Some(net::Ipv4Addr::new(1, 1, 1, 1)),
        };
        assert_eq!(c.to_string(), "10.0.0.2/8 gw 10.0.0.1 dns 1.1.1.1");
    }
}

// EOF

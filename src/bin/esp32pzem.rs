// bin/esp32pzem.rs

#![warn(clippy::large_futures)]

#[cfg(all(target_os = "espidf", feature = "esp32-c3", feature = "esp-wroom-32"))]
compile_error!("Select only one hardware feature: `esp32-c3` or `esp-wroom-32`");
#[cfg(all(
    target_os = "espidf",
    not(any(feature = "esp32-c3", feature = "esp-wroom-32"))
))]
compile_error!("Select a hardware feature: `esp32-c3` or `esp-wroom-32`");

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::main()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("esp32pzem runs on ESP-IDF targets only.");
    std::process::exit(1);
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp_idf_hal::{
        delay::FreeRtos,
        gpio::{InputPin, OutputPin},
        prelude::Peripherals,
    };
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs};
    use esp_idf_sys::esp;

    use esp32pzem::*;

    pub fn main() -> anyhow::Result<()> {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        // eventfd is needed by our mio poll implementation.  Note you should set max_fds
        // higher if you have other code that may need eventfd.
        #[allow(clippy::needless_update)]
        let vfs_config = esp_idf_sys::esp_vfs_eventfd_config_t {
            max_fds: 1,
            ..Default::default()
        };
        esp! { unsafe { esp_idf_sys::esp_vfs_eventfd_register(&vfs_config) } }?;

        info!("Hello.");
        info!("Starting up, firmware version {FW_VERSION}");
        if let Some(ts) = option_env!("SOURCE_TIMESTAMP") {
            info!("Source timestamp {ts}");
        }

        let config = MyConfig::default();
        info!("My config:\n{config:#?}");

        let sysloop = EspSystemEventLoop::take()?;
        let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;
        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        let mut wifi = EspNet::new(peripherals.modem, sysloop, nvs_default_partition)?;
        ensure_connected(&mut wifi, &mut FreeRtos, &mut EspRestart, &config)?;

        // keep the handle, dropping it stops SNTP
        let _sntp = sync_time(config.sntp_timeout_secs)?;

        #[cfg(feature = "esp32-c3")]
        let (tx, rx) = (pins.gpio0.downgrade_output(), pins.gpio1.downgrade_input());

        #[cfg(feature = "esp-wroom-32")]
        let (tx, rx) = (pins.gpio17.downgrade_output(), pins.gpio16.downgrade_input());

        let bus = UartBus::new(peripherals.uart1, tx, rx, config.uart_baud)?;
        let mut meter = Pzem004t::new(bus, config.bus_timeout());
        configure_address(&mut meter, config.meter_address);

        let assets = StaticAssets::build(&config)?;
        let shared_state = Arc::new(MyState::new(config, meter, SystemClock, assets));

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(Box::pin(async move {
                info!("Entering main loop...");
                if let Err(e) = Box::pin(run_api_server(shared_state)).await {
                    error!("run_api_server() ended: {e:#}");
                }
            }));

        // not actually returning from main() but we reboot instead!
        info!("main() finished, reboot.");
        FreeRtos::delay_ms(3000);
        esp_idf_hal::reset::restart();
    }
}

// EOF

use esp_idf_svc::hal::{modem::Modem, peripheral::Peripheral};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use log::{info, warn};

use crate::string_error::StringError;

const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(pass) => pass,
    None => "",
};

const MAX_ATTEMPTS: u32 = 5;

/// Joins the network given by `WIFI_SSID` / `WIFI_PASS` at build time.
pub fn connect_wifi<'a>(
    modem: impl Peripheral<P = Modem> + 'a,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> anyhow::Result<BlockingWifi<EspWifi<'a>>> {
    if WIFI_SSID.is_empty() {
        warn!("wifi: set WIFI_SSID/WIFI_PASS env vars at build time");
    }

    let wifi_configuration: Configuration = Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID
            .try_into()
            .map_err(|_| StringError("SSID too long"))?,
        bssid: None,
        auth_method: if WIFI_PASS.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        password: WIFI_PASS
            .try_into()
            .map_err(|_| StringError("Passphrase too long"))?,
        channel: None,
    });

    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

    wifi.set_configuration(&wifi_configuration)?;

    for i in 1..=MAX_ATTEMPTS {
        info!("Wifi connection attempt #{i}");
        let _ = wifi.disconnect();

        match wifi.start() {
            Ok(_) => (),
            Err(e) => {
                if i == MAX_ATTEMPTS {
                    return Err(e.into());
                }
                continue;
            }
        }
        info!("Wifi started");

        match wifi.connect() {
            Ok(_) => (),
            Err(e) => {
                if i == MAX_ATTEMPTS {
                    return Err(e.into());
                }
                continue;
            }
        }
        info!("Wifi connected");

        match wifi.wait_netif_up() {
            Ok(_) => (),
            Err(e) => {
                if i == MAX_ATTEMPTS {
                    return Err(e.into());
                }
                continue;
            }
        }
        info!("Wifi netif up, IP {:?}", wifi.wifi().sta_netif().get_ip_info()?.ip);
        break;
    }

    Ok(wifi)
}

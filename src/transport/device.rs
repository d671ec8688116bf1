use rusb::{DeviceHandle, GlobalContext};

use super::constants::{PRODUCT_ID, VENDOR_ID};
use super::error::TransportError;

/// Open the first attached DataLink dongle and claim its default interface.
///
/// The DataLink exposes a single bulk-in/bulk-out interface; unlike the
/// multi-altsetting vendor-class devices this transport's ancestor code
/// dealt with, there is no interface selection heuristic needed here --
/// we claim interface 0 and rely on `set_active_configuration` having put
/// the device into its one supported configuration.
pub fn open_device() -> Result<DeviceHandle<GlobalContext>, TransportError> {
    let devices = rusb::devices().map_err(TransportError::Io)?;

    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => continue,
        };

        if descriptor.vendor_id() != VENDOR_ID || descriptor.product_id() != PRODUCT_ID {
            continue;
        }

        let mut handle = device.open().map_err(TransportError::Io)?;

        // Not all platforms support kernel-driver detachment (notably
        // Windows); ignore `NotSupported` the way the reference driver
        // ignores `NotImplementedError`.
        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(TransportError::Io(e)),
        }

        handle.set_active_configuration(1).map_err(TransportError::Io)?;
        handle.claim_interface(0).map_err(TransportError::Io)?;

        log::info!("Opened Polar DataLink at bus {} address {}", device.bus_number(), device.address());
        return Ok(handle);
    }

    Err(TransportError::NotFound)
}

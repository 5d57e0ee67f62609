use log::{debug, info};
use rusb::{Context, DeviceDescriptor, DeviceHandle, UsbContext};
use std::time::Duration;

use crate::error::Error;

/// Byte pipe to the printer.
///
/// Implementations are expected to be exclusively owned by one print job at
/// a time; the wire protocol has no multiplexing.
pub trait Transport {
    /// Write `buf` in full, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Read at most `max_bytes`. An empty buffer means the printer had
    /// nothing to say.
    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        (**self).write(buf)
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, Error> {
        (**self).read(max_bytes)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        (**self).write(buf)
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, Error> {
        (**self).read(max_bytes)
    }
}

/// USB device selection and transfer parameters.
#[derive(Debug, Clone)]
pub struct UsbConfig {
    vendor_id: u16,
    product_id: u16,
    serial: Option<String>,
    configuration: u8,
    interface: u8,
    endpoint_out: u8,
    endpoint_in: u8,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl UsbConfig {
    /// Defaults for the reference printer: `4348:5584`, configuration 1,
    /// interface 0, bulk endpoint 2 in both directions.
    pub fn new() -> UsbConfig {
        UsbConfig {
            vendor_id: 0x4348,
            product_id: 0x5584,
            serial: None,
            configuration: 1,
            interface: 0,
            endpoint_out: 0x02,
            endpoint_in: 0x82,
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(1),
        }
    }

    pub fn device(self, vendor_id: u16, product_id: u16) -> Self {
        UsbConfig {
            vendor_id,
            product_id,
            ..self
        }
    }

    /// Only open the device reporting this serial number.
    pub fn serial(self, serial: String) -> Self {
        UsbConfig {
            serial: Some(serial),
            ..self
        }
    }

    pub fn configuration(self, configuration: u8) -> Self {
        UsbConfig {
            configuration,
            ..self
        }
    }

    pub fn interface(self, interface: u8) -> Self {
        UsbConfig { interface, ..self }
    }

    /// Bulk endpoint addresses, e.g. `0x02` out and `0x82` in.
    pub fn endpoints(self, endpoint_out: u8, endpoint_in: u8) -> Self {
        UsbConfig {
            endpoint_out,
            endpoint_in,
            ..self
        }
    }

    pub fn write_timeout(self, write_timeout: Duration) -> Self {
        UsbConfig {
            write_timeout,
            ..self
        }
    }

    pub fn read_timeout(self, read_timeout: Duration) -> Self {
        UsbConfig {
            read_timeout,
            ..self
        }
    }
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A matching device seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub bus: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Claimed USB bulk endpoint pair.
pub struct UsbTransport {
    handle: Box<DeviceHandle<Context>>,
    config: UsbConfig,
    claimed: bool,
}

impl UsbTransport {
    /// Find, configure and claim the printer.
    pub fn open(config: UsbConfig) -> Result<Self, Error> {
        let context = Context::new()?;
        let mut handle = Self::open_device(&context, &config)?;

        handle.set_auto_detach_kernel_driver(true).ok();
        let has_kernel_driver = matches!(handle.kernel_driver_active(config.interface), Ok(true));
        info!("Kernel driver support is {}", has_kernel_driver);

        handle
            .set_active_configuration(config.configuration)
            .map_err(Error::ClaimFailed)?;
        handle
            .claim_interface(config.interface)
            .map_err(Error::ClaimFailed)?;
        debug!(
            "claimed interface {} on configuration {}",
            config.interface, config.configuration
        );

        Ok(UsbTransport {
            handle: Box::new(handle),
            config,
            claimed: true,
        })
    }

    /// List attached devices matching the configured vendor/product id.
    pub fn list(config: &UsbConfig) -> Result<Vec<DeviceInfo>, Error> {
        let context = Context::new()?;
        let devices = context
            .devices()
            .map_err(|_| Error::DeviceListNotReadable)?;

        let mut found = Vec::new();
        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };
            if device_desc.vendor_id() == config.vendor_id
                && device_desc.product_id() == config.product_id
            {
                found.push(DeviceInfo {
                    bus: device.bus_number(),
                    address: device.address(),
                    vendor_id: device_desc.vendor_id(),
                    product_id: device_desc.product_id(),
                });
            }
        }
        Ok(found)
    }

    fn open_device(
        context: &Context,
        config: &UsbConfig,
    ) -> Result<DeviceHandle<Context>, Error> {
        let devices = match context.devices() {
            Ok(devices) => devices,
            Err(err) => {
                debug!("Failed to read device list: {:?}", err);
                return Err(Error::DeviceListNotReadable);
            }
        };

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() != config.vendor_id
                || device_desc.product_id() != config.product_id
            {
                continue;
            }
            debug!("{:?}", device_desc);

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    debug!("Failed to open device: {:?}", err);
                    continue;
                }
            };

            match &config.serial {
                None => return Ok(handle),
                Some(serial) => {
                    if Self::read_serial(&handle, &device_desc).as_ref() == Some(serial) {
                        return Ok(handle);
                    }
                }
            }
        }
        debug!(
            "No device matching {:04x}:{:04x} serial {:?}",
            config.vendor_id, config.product_id, config.serial
        );
        Err(Error::DeviceNotFound)
    }

    fn read_serial(
        handle: &DeviceHandle<Context>,
        device_desc: &DeviceDescriptor,
    ) -> Option<String> {
        let timeout = Duration::from_secs(1);
        let languages = handle.read_languages(timeout).ok()?;
        let language = *languages.first()?;
        match handle.read_serial_number_string(language, device_desc, timeout) {
            Ok(s) => Some(s),
            Err(err) => {
                debug!("Failed to read serial number string: {:?}", err);
                None
            }
        }
    }

    /// Release the claimed interface.
    pub fn close(mut self) -> Result<(), Error> {
        self.release()
    }

    fn release(&mut self) -> Result<(), Error> {
        if self.claimed {
            self.claimed = false;
            self.handle.release_interface(self.config.interface)?;
            debug!("released interface {}", self.config.interface);
        }
        Ok(())
    }
}

impl Transport for UsbTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let n = self
            .handle
            .write_bulk(self.config.endpoint_out, buf, self.config.write_timeout)?;
        if n == buf.len() {
            Ok(n)
        } else {
            debug!(
                "write error: bytes wrote {} != bytes supplied {}, possibly timeout ?",
                n,
                buf.len()
            );
            Err(Error::ShortWrite {
                written: n,
                expected: buf.len(),
            })
        }
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0x00; max_bytes];
        match self
            .handle
            .read_bulk(self.config.endpoint_in, &mut buf, self.config.read_timeout)
        {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(rusb::Error::Timeout) => {
                debug!("read timed out, no reply");
                Ok(Vec::new())
            }
            Err(e) => Err(Error::UsbError(e)),
        }
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            debug!("release on drop failed: {:?}", err);
        }
    }
}

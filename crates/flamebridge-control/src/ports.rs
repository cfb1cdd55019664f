//! Serial device enumeration

use std::fmt;

use crate::Result;

/// USB vendor id of FTDI, used by Enttec widgets
pub const FTDI_VID: u16 = 0x0403;

/// USB details of a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDetails {
    /// Vendor id
    pub vid: u16,
    /// Product id
    pub pid: u16,
    /// Manufacturer string
    pub manufacturer: Option<String>,
    /// Product string
    pub product: Option<String>,
    /// Serial number
    pub serial_number: Option<String>,
}

/// One serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path or name
    pub name: String,
    /// USB details, when the port is a USB device
    pub usb: Option<UsbDetails>,
}

impl PortInfo {
    /// True for FTDI USB adapters (Enttec DMX USB Pro and compatibles)
    pub fn is_ftdi(&self) -> bool {
        self.usb.as_ref().is_some_and(|usb| usb.vid == FTDI_VID)
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let usb = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => Some(UsbDetails {
                vid: usb.vid,
                pid: usb.pid,
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
            }),
            _ => None,
        };
        Self {
            name: info.port_name,
            usb,
        }
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(usb) = &self.usb {
            write!(f, " [USB {:04x}:{:04x}]", usb.vid, usb.pid)?;
            if let Some(manufacturer) = &usb.manufacturer {
                write!(f, " {}", manufacturer)?;
            }
            if let Some(product) = &usb.product {
                write!(f, " {}", product)?;
            }
            if let Some(serial) = &usb.serial_number {
                write!(f, " (S/N {})", serial)?;
            }
        }
        if self.is_ftdi() {
            write!(f, " <- likely Enttec/FTDI")?;
        }
        Ok(())
    }
}

/// Call-out device to use instead of a macOS dial-in device
///
/// macOS exposes each USB serial adapter twice. Opening `/dev/tty.*` waits for
/// carrier detect, which the widget never asserts; `/dev/cu.*` opens at once.
pub fn callout_device_hint(port: &str) -> Option<String> {
    port.strip_prefix("/dev/tty.")
        .map(|device| format!("/dev/cu.{}", device))
}

/// List the serial ports of this machine
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    tracing::debug!("Found {} serial port(s)", ports.len());
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_port(vid: u16) -> PortInfo {
        PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            usb: Some(UsbDetails {
                vid,
                pid: 0x6001,
                manufacturer: Some("FTDI".to_string()),
                product: Some("DMX USB PRO".to_string()),
                serial_number: Some("EN123456".to_string()),
            }),
        }
    }

    #[test]
    fn test_ftdi_detection() {
        assert!(usb_port(FTDI_VID).is_ftdi());
        assert!(!usb_port(0x10c4).is_ftdi());
        let plain = PortInfo {
            name: "/dev/ttyS0".to_string(),
            usb: None,
        };
        assert!(!plain.is_ftdi());
        assert_eq!(plain.to_string(), "/dev/ttyS0");
    }

    #[test]
    fn test_callout_device_hint() {
        assert_eq!(
            callout_device_hint("/dev/tty.usbserial-EN437698").as_deref(),
            Some("/dev/cu.usbserial-EN437698")
        );
        assert_eq!(callout_device_hint("/dev/cu.usbserial-EN437698"), None);
        assert_eq!(callout_device_hint("/dev/ttyUSB0"), None);
        assert_eq!(callout_device_hint("COM3"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            usb_port(FTDI_VID).to_string(),
            "/dev/ttyUSB0 [USB 0403:6001] FTDI DMX USB PRO (S/N EN123456) <- likely Enttec/FTDI"
        );
    }
}

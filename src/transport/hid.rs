//! USB HID transport for Ledger devices
//!
//! APDUs are split into 64-byte reports. Every report starts with the channel
//! id, the APDU tag and a big-endian sequence number; the first report also
//! carries the big-endian length of the whole APDU.

use std::ffi::CString;

use hidapi::{HidApi, HidDevice};

use crate::apdu::{ApduAnswer, ApduCommand};
use crate::constants::LEDGER_VENDOR_ID;
use crate::errors::DeviceCommunicationError;
use crate::transport::DeviceTransport;

pub const HID_PACKET_SIZE: usize = 64;
pub const LEDGER_CHANNEL: u16 = 0x0101;
const TAG_APDU: u8 = 0x05;
const HEADER_SIZE: usize = 5;

/// Ledger devices expose their APDU endpoint on this usage page
const LEDGER_USAGE_PAGE: u16 = 0xFFA0;

/// Summary of an attached Ledger device
#[derive(Debug, Clone)]
pub struct LedgerDeviceInfo {
    pub path: String,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface_number: i32,
}

/// List attached Ledger devices that expose an APDU interface
pub fn list_ledger_devices() -> Result<Vec<LedgerDeviceInfo>, DeviceCommunicationError> {
    let api = HidApi::new()?;
    Ok(ledger_devices(&api))
}

fn ledger_devices(api: &HidApi) -> Vec<LedgerDeviceInfo> {
    api.device_list()
        .filter(|info| info.vendor_id() == LEDGER_VENDOR_ID)
        // macOS and Windows report the usage page, Linux hidraw only the interface
        .filter(|info| info.usage_page() == LEDGER_USAGE_PAGE || info.interface_number() == 0)
        .map(|info| LedgerDeviceInfo {
            path: info.path().to_string_lossy().into_owned(),
            product: info.product_string().map(str::to_string),
            serial_number: info.serial_number().map(str::to_string),
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            interface_number: info.interface_number(),
        })
        .collect()
}

/// A Ledger reached over USB HID
pub struct HidTransport {
    device: HidDevice,
    read_timeout_ms: i32,
    health: ChannelHealth,
}

impl HidTransport {
    /// Open the device at `path`, or the first Ledger found when `path` is `None`
    pub fn open(path: Option<&str>, read_timeout_ms: u64) -> Result<Self, DeviceCommunicationError> {
        let api = HidApi::new()?;

        let path = match path {
            Some(path) => path.to_string(),
            None => ledger_devices(&api)
                .into_iter()
                .next()
                .map(|info| info.path)
                .ok_or(DeviceCommunicationError::NoDevice)?,
        };

        log::info!("🔌 Opening Ledger device at {}", path);
        let c_path = CString::new(path.clone())
            .map_err(|_| DeviceCommunicationError::Framing(format!("invalid device path {:?}", path)))?;
        let device = api.open_path(&c_path)?;

        Ok(Self {
            device,
            read_timeout_ms: i32::try_from(read_timeout_ms).unwrap_or(i32::MAX),
            health: ChannelHealth::default(),
        })
    }

    fn write_apdu(&self, apdu: &[u8]) -> Result<(), DeviceCommunicationError> {
        for packet in wrap_command_apdu(LEDGER_CHANNEL, apdu)? {
            // hidapi expects a leading report id
            let mut report = Vec::with_capacity(HID_PACKET_SIZE + 1);
            report.push(0x00);
            report.extend_from_slice(&packet);
            let written = self.device.write(&report)?;
            if written < HID_PACKET_SIZE {
                return Err(DeviceCommunicationError::Framing(format!(
                    "short HID write ({} of {} bytes)",
                    written,
                    report.len()
                )));
            }
        }
        Ok(())
    }

    fn round_trip(&self, apdu: &[u8]) -> Result<Vec<u8>, DeviceCommunicationError> {
        self.write_apdu(apdu)?;
        self.read_apdu()
    }

    fn read_apdu(&self) -> Result<Vec<u8>, DeviceCommunicationError> {
        let mut assembler = ResponseAssembler::new(LEDGER_CHANNEL);
        loop {
            let mut buf = [0u8; HID_PACKET_SIZE];
            let read = self.device.read_timeout(&mut buf, self.read_timeout_ms)?;
            if read == 0 {
                return Err(DeviceCommunicationError::Timeout);
            }
            if let Some(apdu) = assembler.push(&buf[..read])? {
                return Ok(apdu);
            }
        }
    }
}

impl DeviceTransport for HidTransport {
    fn exchange(&mut self, command: &ApduCommand) -> Result<Vec<u8>, DeviceCommunicationError> {
        let raw = command
            .serialize()
            .map_err(|e| DeviceCommunicationError::Framing(e.to_string()))?;
        log::debug!("=> {}", hex::encode(&raw));

        self.health.check()?;
        let result = self.round_trip(&raw);
        let answer = self.health.record(result)?;
        log::debug!("<= {}", hex::encode(&answer));

        let answer = ApduAnswer::from_bytes(answer)?;
        if answer.status() != crate::constants::status::OK {
            log::warn!(
                "Device answered INS 0x{:02X} with status 0x{:04X}",
                command.ins,
                answer.status()
            );
        }
        answer.into_result()
    }
}

/// Whether answers read from the channel still belong to the command just sent.
///
/// A timed out or half-read exchange can leave the device's answer queued on
/// the endpoint, where the next command would pick it up as its own. Once that
/// happens the handle refuses further exchanges until the device is reopened.
#[derive(Debug, Default)]
struct ChannelHealth {
    broken: Option<String>,
}

impl ChannelHealth {
    fn check(&self) -> Result<(), DeviceCommunicationError> {
        match &self.broken {
            Some(reason) => Err(DeviceCommunicationError::Desynchronized(reason.clone())),
            None => Ok(()),
        }
    }

    /// Record the outcome of one write/read round trip
    fn record<T>(
        &mut self,
        result: Result<T, DeviceCommunicationError>,
    ) -> Result<T, DeviceCommunicationError> {
        if let Err(err) = &result {
            log::error!("❌ Lost request/response sync with the device: {}", err);
            self.broken = Some(err.to_string());
        }
        result
    }
}

/// Split an APDU into HID reports (without the leading report id)
pub fn wrap_command_apdu(channel: u16, apdu: &[u8]) -> Result<Vec<Vec<u8>>, DeviceCommunicationError> {
    let total = u16::try_from(apdu.len())
        .map_err(|_| DeviceCommunicationError::Framing(format!("APDU of {} bytes too long", apdu.len())))?;

    let mut packets = Vec::new();
    let mut remaining = apdu;
    let mut sequence: u16 = 0;

    while sequence == 0 || !remaining.is_empty() {
        let mut packet = Vec::with_capacity(HID_PACKET_SIZE);
        packet.extend_from_slice(&channel.to_be_bytes());
        packet.push(TAG_APDU);
        packet.extend_from_slice(&sequence.to_be_bytes());
        if sequence == 0 {
            packet.extend_from_slice(&total.to_be_bytes());
        }

        let take = remaining.len().min(HID_PACKET_SIZE - packet.len());
        packet.extend_from_slice(&remaining[..take]);
        remaining = &remaining[take..];
        packet.resize(HID_PACKET_SIZE, 0);

        packets.push(packet);
        sequence = sequence
            .checked_add(1)
            .ok_or_else(|| DeviceCommunicationError::Framing("sequence overflow".to_string()))?;
    }

    Ok(packets)
}

/// Reassembles a response APDU from consecutive HID reports
#[derive(Debug)]
pub struct ResponseAssembler {
    channel: u16,
    sequence: u16,
    expected: Option<usize>,
    buffer: Vec<u8>,
}

impl ResponseAssembler {
    pub fn new(channel: u16) -> Self {
        Self {
            channel,
            sequence: 0,
            expected: None,
            buffer: Vec::new(),
        }
    }

    /// Feed one report. Returns the full APDU once all of it has arrived.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>, DeviceCommunicationError> {
        if packet.len() < HEADER_SIZE {
            return Err(DeviceCommunicationError::Framing(format!(
                "HID report of {} bytes is shorter than its header",
                packet.len()
            )));
        }

        let channel = u16::from_be_bytes([packet[0], packet[1]]);
        if channel != self.channel {
            return Err(DeviceCommunicationError::Framing(format!(
                "unexpected channel 0x{:04X}",
                channel
            )));
        }
        if packet[2] != TAG_APDU {
            return Err(DeviceCommunicationError::Framing(format!(
                "unexpected tag 0x{:02X}",
                packet[2]
            )));
        }
        let sequence = u16::from_be_bytes([packet[3], packet[4]]);
        if sequence != self.sequence {
            return Err(DeviceCommunicationError::Framing(format!(
                "out of order report (expected {}, got {})",
                self.sequence, sequence
            )));
        }

        let mut body = &packet[HEADER_SIZE..];
        let expected = match self.expected {
            Some(expected) => expected,
            None => {
                if body.len() < 2 {
                    return Err(DeviceCommunicationError::Framing(
                        "first report is missing the length".to_string(),
                    ));
                }
                let expected = u16::from_be_bytes([body[0], body[1]]) as usize;
                body = &body[2..];
                self.expected = Some(expected);
                expected
            }
        };

        let take = (expected - self.buffer.len()).min(body.len());
        self.buffer.extend_from_slice(&body[..take]);
        self.sequence = self.sequence.wrapping_add(1);

        if self.buffer.len() == expected {
            Ok(Some(std::mem::take(&mut self.buffer)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_packet_command() {
        let apdu = [0x5A, 0x00, 0x00, 0x00, 0x00];
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &apdu).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), HID_PACKET_SIZE);
        assert_eq!(&packets[0][..12], &[0x01, 0x01, 0x05, 0x00, 0x00, 0x00, 0x05, 0x5A, 0, 0, 0, 0]);
        assert!(packets[0][12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_multi_packet_command() {
        let apdu: Vec<u8> = (0..100u8).collect();
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &apdu).unwrap();
        assert_eq!(packets.len(), 2);
        // 57 bytes fit in the first report, the rest in the second
        assert_eq!(&packets[0][5..7], &[0x00, 100]);
        assert_eq!(packets[0][7], 0);
        assert_eq!(packets[0][63], 56);
        assert_eq!(&packets[1][3..5], &[0x00, 0x01]);
        assert_eq!(packets[1][5], 57);
        assert_eq!(packets[1][5 + 42], 99);
    }

    #[test]
    fn test_reassembles_what_was_wrapped() {
        let apdu: Vec<u8> = (0..150u8).collect();
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &apdu).unwrap();

        let mut assembler = ResponseAssembler::new(LEDGER_CHANNEL);
        let mut result = None;
        for packet in &packets {
            result = assembler.push(packet).unwrap();
        }
        assert_eq!(result, Some(apdu));
    }

    #[test]
    fn test_timeout_blocks_later_exchanges() {
        let mut health = ChannelHealth::default();
        assert!(health.check().is_ok());

        let late: Result<Vec<u8>, _> = health.record(Err(DeviceCommunicationError::Timeout));
        assert!(matches!(late, Err(DeviceCommunicationError::Timeout)));

        // A queued late answer must never be taken for the next command's
        assert!(matches!(
            health.check(),
            Err(DeviceCommunicationError::Desynchronized(_))
        ));
        assert!(matches!(
            health.check(),
            Err(DeviceCommunicationError::Desynchronized(_))
        ));
    }

    #[test]
    fn test_framing_error_blocks_later_exchanges() {
        let mut health = ChannelHealth::default();
        let mut assembler = ResponseAssembler::new(LEDGER_CHANNEL);
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &[9u8; 120]).unwrap();

        let result = health.record(assembler.push(&packets[1]));
        assert!(result.is_err());
        assert!(matches!(
            health.check(),
            Err(DeviceCommunicationError::Desynchronized(reason)) if reason.contains("out of order")
        ));
    }

    #[test]
    fn test_successful_round_trips_keep_channel_usable() {
        let mut health = ChannelHealth::default();
        for _ in 0..3 {
            let answer = health.record(Ok(vec![0x90, 0x00])).unwrap();
            assert_eq!(answer, vec![0x90, 0x00]);
            assert!(health.check().is_ok());
        }
    }

    #[test]
    fn test_rejects_wrong_channel() {
        let packets = wrap_command_apdu(0x0202, &[1, 2, 3]).unwrap();
        let mut assembler = ResponseAssembler::new(LEDGER_CHANNEL);
        assert!(matches!(
            assembler.push(&packets[0]),
            Err(DeviceCommunicationError::Framing(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_order_report() {
        let apdu = vec![7u8; 120];
        let packets = wrap_command_apdu(LEDGER_CHANNEL, &apdu).unwrap();
        let mut assembler = ResponseAssembler::new(LEDGER_CHANNEL);
        assert!(matches!(
            assembler.push(&packets[1]),
            Err(DeviceCommunicationError::Framing(_))
        ));
    }
}

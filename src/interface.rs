//! Boot keyboard interface state and HID request handlers

use embedded_time::duration::Milliseconds;
use embedded_time::fixed_point::FixedPoint;
use heapless::Vec;
use log::{error, info, trace, warn};
use packed_struct::PackedStruct;
use usb_device::bus::{InterfaceNumber, StringIndex, UsbBus, UsbBusAllocator};
use usb_device::class_prelude::{DescriptorWriter, EndpointIn};
use usb_device::UsbError;

use crate::descriptor::{
    DescriptorType, HidDescriptorBody, HidProtocol, InterfaceProtocol, InterfaceSubClass,
    ReportType, BOOT_KEYBOARD_REPORT_DESCRIPTOR, COUNTRY_CODE_NOT_SUPPORTED, SPEC_VERSION_1_10,
    USB_CLASS_HID,
};
use crate::report::{
    BootKeyboardReport, KeyboardLedsReport, BOOT_KEYBOARD_REPORT_LEN, KEYBOARD_LEDS_REPORT_LEN,
};
use crate::UsbHidError;

/// Largest feature report the host may write with SetReport
pub const FEATURE_REPORT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum UsbPacketSize {
    Bytes8 = 8,
    Bytes16 = 16,
    Bytes32 = 32,
    Bytes64 = 64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbHidBuilderError {
    /// A value is greater than the acceptable range of input values
    ValueOverflow,
    /// A slice of data is longer than permitted
    SliceLengthOverflow,
}

pub type BuilderResult<B> = core::result::Result<B, UsbHidBuilderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub poll_interval: u8,
    pub max_packet_size: UsbPacketSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootKeyboardConfig<'a> {
    pub description: Option<&'a str>,
    pub idle_default: u8,
    pub in_endpoint: EndpointConfig,
    pub feature_report_len: Option<usize>,
}

impl Default for BootKeyboardConfig<'_> {
    fn default() -> Self {
        Self {
            description: Some("Keyboard"),
            //4ms, a single idle unit
            idle_default: 1,
            in_endpoint: EndpointConfig {
                max_packet_size: UsbPacketSize::Bytes8,
                poll_interval: 32,
            },
            feature_report_len: None,
        }
    }
}

impl<'a> BootKeyboardConfig<'a> {
    pub fn set_idle_default(&mut self, duration: Milliseconds) -> BuilderResult<()> {
        if duration == Milliseconds(0_u32) {
            self.idle_default = 0;
        } else {
            let scaled_duration = duration.integer() / 4;

            if scaled_duration == 0 {
                //round up for 1-3ms
                self.idle_default = 1;
            } else {
                self.idle_default =
                    u8::try_from(scaled_duration).map_err(|_| UsbHidBuilderError::ValueOverflow)?;
            }
        }
        Ok(())
    }

    pub fn set_in_endpoint(
        &mut self,
        max_packet_size: UsbPacketSize,
        poll_interval: Milliseconds,
    ) -> BuilderResult<()> {
        self.in_endpoint = EndpointConfig {
            max_packet_size,
            poll_interval: u8::try_from(poll_interval.integer())
                .map_err(|_| UsbHidBuilderError::ValueOverflow)?,
        };
        Ok(())
    }

    pub fn set_feature_report_len(&mut self, len: usize) -> BuilderResult<()> {
        if len > FEATURE_REPORT_CAPACITY {
            return Err(UsbHidBuilderError::SliceLengthOverflow);
        }
        self.feature_report_len = Some(len);
        Ok(())
    }
}

/// Host writable feature report slot
#[derive(Debug, Clone, PartialEq, Eq)]
enum FeatureReport {
    Disabled,
    /// Waiting for the host to write a report of this length
    Armed(usize),
    /// Written by the host, waiting for the application to read it
    Received(Vec<u8, FEATURE_REPORT_CAPACITY>),
}

impl FeatureReport {
    fn from_config(len: Option<usize>) -> Self {
        len.map_or(FeatureReport::Disabled, FeatureReport::Armed)
    }
}

struct IdleManager<R> {
    last_report: Option<R>,
    since_last_report: u32,
}

impl<R> Default for IdleManager<R> {
    fn default() -> Self {
        Self {
            last_report: None,
            since_last_report: 0,
        }
    }
}

impl<R> IdleManager<R>
where
    R: Eq + Copy,
{
    pub fn report_written(&mut self, report: R) {
        self.last_report = Some(report);
        self.since_last_report = 0;
    }

    pub fn is_duplicate(&self, report: &R) -> bool {
        self.last_report.as_ref() == Some(report)
    }

    /// Call every 1ms
    pub fn tick(&mut self, timeout: Milliseconds) -> bool {
        if timeout.integer() == 0 {
            self.since_last_report = 0;
            return false;
        }

        self.since_last_report += 1;
        if self.since_last_report >= timeout.integer() {
            self.since_last_report = 0;
            true
        } else {
            false
        }
    }

    pub fn last_report(&self) -> Option<R> {
        self.last_report
    }
}

pub struct BootKeyboardInterface<'a, B: UsbBus> {
    id: InterfaceNumber,
    config: BootKeyboardConfig<'a>,
    in_endpoint: EndpointIn<'a, B>,
    description_index: Option<StringIndex>,
    protocol: HidProtocol,
    idle: u8,
    leds: u8,
    report: BootKeyboardReport,
    feature_report: FeatureReport,
    idle_manager: IdleManager<BootKeyboardReport>,
}

impl<'a, B: UsbBus> BootKeyboardInterface<'a, B> {
    pub fn new(usb_alloc: &'a UsbBusAllocator<B>, config: BootKeyboardConfig<'a>) -> Self {
        BootKeyboardInterface {
            id: usb_alloc.interface(),
            in_endpoint: usb_alloc.interrupt(
                config.in_endpoint.max_packet_size as u16,
                config.in_endpoint.poll_interval,
            ),
            description_index: config.description.map(|_| usb_alloc.string()),
            //When initialized, all devices default to report protocol - Hid spec 7.2.6 Set_Protocol Request
            protocol: HidProtocol::Report,
            idle: config.idle_default,
            leds: 0,
            report: BootKeyboardReport::default(),
            feature_report: FeatureReport::from_config(config.feature_report_len),
            idle_manager: IdleManager::default(),
            config,
        }
    }

    pub fn id(&self) -> InterfaceNumber {
        self.id
    }

    pub fn report_descriptor(&self) -> &'static [u8] {
        BOOT_KEYBOARD_REPORT_DESCRIPTOR
    }

    pub fn hid_descriptor_body(&self) -> usb_device::Result<[u8; 7]> {
        let descriptor_length = u16::try_from(self.report_descriptor().len())
            .map_err(|_| UsbError::BufferOverflow)?;

        HidDescriptorBody {
            bcd_hid: SPEC_VERSION_1_10,
            country_code: COUNTRY_CODE_NOT_SUPPORTED,
            num_descriptors: 1,
            descriptor_type: DescriptorType::Report,
            descriptor_length,
        }
        .pack()
        .map_err(|e| {
            error!("Failed to pack HidDescriptor: {:?}", e);
            UsbError::ParseError
        })
    }

    pub fn write_descriptors(&self, writer: &mut DescriptorWriter) -> usb_device::Result<()> {
        writer.interface_alt(
            self.id,
            usb_device::device::DEFAULT_ALTERNATE_SETTING,
            USB_CLASS_HID,
            InterfaceSubClass::from(InterfaceProtocol::Keyboard).into(),
            InterfaceProtocol::Keyboard.into(),
            self.description_index,
        )?;

        //Hid descriptor
        writer.write(DescriptorType::Hid.into(), &self.hid_descriptor_body()?)?;

        //Endpoint descriptor
        writer.endpoint(&self.in_endpoint)?;

        Ok(())
    }

    pub fn get_string(&self, index: StringIndex, _lang_id: u16) -> Option<&'a str> {
        self.description_index
            .filter(|&i| i == index)
            .and(self.config.description)
    }

    pub fn reset(&mut self) {
        self.protocol = HidProtocol::Report;
        self.idle = self.config.idle_default;
        self.leds = 0;
        self.idle_manager = IdleManager::default();
    }

    /// The host re-reads the report descriptor when it enumerates the device and then
    /// assumes report protocol, regardless of what was set before
    pub fn report_descriptor_requested(&mut self) {
        if self.protocol != HidProtocol::Report {
            info!("Report descriptor requested, protocol reset to Report");
        }
        self.protocol = HidProtocol::Report;
    }

    pub fn set_protocol(&mut self, protocol: HidProtocol) {
        self.protocol = protocol;
        info!("Set protocol to {:?}", protocol);
    }

    pub fn get_protocol(&self) -> HidProtocol {
        self.protocol
    }

    pub fn set_idle(&mut self, report_id: u8, value: u8) {
        if report_id == 0 {
            self.idle = value;
            info!("Set idle to {:X}", value);
        } else {
            warn!(
                "Ignoring SetIdle for report id {:X}, keyboard has no report ids",
                report_id
            );
        }
    }

    pub fn get_idle(&self, report_id: u8) -> u8 {
        if report_id != 0 {
            warn!("GetIdle for unknown report id {:X}", report_id);
        }
        self.idle
    }

    pub fn set_report(&mut self, report_type: ReportType, data: &[u8]) -> usb_device::Result<()> {
        match report_type {
            ReportType::Feature => match self.feature_report {
                FeatureReport::Armed(len) if len == data.len() => {
                    let mut buffer = Vec::new();
                    buffer
                        .extend_from_slice(data)
                        .map_err(|_| UsbError::BufferOverflow)?;
                    self.feature_report = FeatureReport::Received(buffer);
                    trace!("Set feature report, {:X} bytes", data.len());
                    Ok(())
                }
                FeatureReport::Armed(len) => {
                    warn!(
                        "Feature report expected {:X} bytes, received {:X}",
                        len,
                        data.len()
                    );
                    Err(UsbError::ParseError)
                }
                FeatureReport::Received(_) => {
                    trace!("Failed to set feature report, previous report not read");
                    Err(UsbError::WouldBlock)
                }
                FeatureReport::Disabled => {
                    warn!("Feature report not enabled");
                    Err(UsbError::Unsupported)
                }
            },
            ReportType::Output => {
                if data.len() == KEYBOARD_LEDS_REPORT_LEN {
                    self.leds = data[0];
                    trace!("Set leds to {:X}", self.leds);
                    Ok(())
                } else {
                    warn!(
                        "Output report expected {:X} bytes, received {:X}",
                        KEYBOARD_LEDS_REPORT_LEN,
                        data.len()
                    );
                    Err(UsbError::ParseError)
                }
            }
            ReportType::Input => {
                let data: &[u8; BOOT_KEYBOARD_REPORT_LEN] = data.try_into().map_err(|_| {
                    warn!(
                        "Input report expected {:X} bytes, received {:X}",
                        BOOT_KEYBOARD_REPORT_LEN,
                        data.len()
                    );
                    UsbError::ParseError
                })?;
                self.report = BootKeyboardReport::unpack(data).map_err(|e| {
                    error!("Error unpacking BootKeyboardReport: {:?}", e);
                    UsbError::ParseError
                })?;
                trace!("Set input report");
                Ok(())
            }
        }
    }

    pub fn get_report(&self, report_type: ReportType, data: &mut [u8]) -> usb_device::Result<usize> {
        match report_type {
            ReportType::Input => {
                let report = self.report.pack().map_err(|e| {
                    error!("Error packing BootKeyboardReport: {:?}", e);
                    UsbError::ParseError
                })?;
                copy_report(data, &report[..])
            }
            ReportType::Output => copy_report(data, &[self.leds]),
            ReportType::Feature => match &self.feature_report {
                FeatureReport::Received(buffer) => copy_report(data, &buffer[..]),
                _ => {
                    trace!("GetReport would block, no feature report");
                    Err(UsbError::WouldBlock)
                }
            },
        }
    }

    pub fn protocol(&self) -> HidProtocol {
        self.protocol
    }

    pub fn idle(&self) -> Milliseconds {
        Milliseconds(u32::from(self.idle) * 4)
    }

    pub fn leds(&self) -> KeyboardLedsReport {
        //only the three LED bits are defined, padding bits are ignored
        KeyboardLedsReport::unpack(&[self.leds]).unwrap_or_default()
    }

    pub fn report(&self) -> &BootKeyboardReport {
        &self.report
    }

    pub fn press(&mut self, key: u8) -> bool {
        self.report.press(key)
    }

    pub fn release(&mut self, key: u8) -> bool {
        self.report.release(key)
    }

    pub fn release_all(&mut self) {
        self.report.release_all();
    }

    /// Replaces the current report and sends it
    pub fn write_report(&mut self, report: &BootKeyboardReport) -> Result<(), UsbHidError> {
        self.report = *report;
        self.send()
    }

    /// Sends the current report on the interrupt endpoint
    pub fn send(&mut self) -> Result<(), UsbHidError> {
        let report = self.report;
        if self.idle_manager.is_duplicate(&report) {
            Err(UsbHidError::Duplicate)
        } else {
            self.write_endpoint(&report)?;
            self.idle_manager.report_written(report);
            Ok(())
        }
    }

    /// Call every 1ms, resends the last report when the idle period expires
    pub fn tick(&mut self) -> Result<(), UsbHidError> {
        let idle = self.idle();
        if !(self.idle_manager.tick(idle)) {
            Ok(())
        } else if let Some(report) = self.idle_manager.last_report() {
            self.write_endpoint(&report)?;
            self.idle_manager.report_written(report);
            Ok(())
        } else {
            Ok(())
        }
    }

    fn write_endpoint(&self, report: &BootKeyboardReport) -> Result<usize, UsbHidError> {
        let data = report.pack().map_err(|e| {
            error!("Error packing BootKeyboardReport: {:?}", e);
            UsbHidError::SerializationError
        })?;
        self.in_endpoint.write(&data).map_err(UsbHidError::from)
    }

    /// Arms the feature report slot for a host write of `len` bytes
    pub fn enable_feature_report(&mut self, len: usize) -> Result<(), UsbHidError> {
        if len > FEATURE_REPORT_CAPACITY {
            return Err(UsbHidError::UsbError(UsbError::BufferOverflow));
        }
        self.feature_report = FeatureReport::Armed(len);
        Ok(())
    }

    pub fn disable_feature_report(&mut self) {
        self.feature_report = FeatureReport::Disabled;
    }

    /// Takes the feature report written by the host. The slot stays disabled
    /// until [`Self::enable_feature_report`] is called again
    pub fn read_feature_report(&mut self, data: &mut [u8]) -> usb_device::Result<usize> {
        match &self.feature_report {
            FeatureReport::Received(buffer) => {
                if data.len() < buffer.len() {
                    return Err(UsbError::BufferOverflow);
                }
                let n = buffer.len();
                data[..n].copy_from_slice(buffer);
                self.feature_report = FeatureReport::Disabled;
                Ok(n)
            }
            _ => Err(UsbError::WouldBlock),
        }
    }
}

fn copy_report(data: &mut [u8], report: &[u8]) -> usb_device::Result<usize> {
    if data.len() < report.len() {
        error!("GetReport failed, buffer too short");
        Err(UsbError::BufferOverflow)
    } else {
        data[..report.len()].copy_from_slice(report);
        Ok(report.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn idle_default_rounds_up_small_durations() {
        let mut config = BootKeyboardConfig::default();

        config.set_idle_default(Milliseconds(3_u32)).unwrap();
        assert_eq!(config.idle_default, 1);

        config.set_idle_default(Milliseconds(0_u32)).unwrap();
        assert_eq!(config.idle_default, 0);

        config.set_idle_default(Milliseconds(1020_u32)).unwrap();
        assert_eq!(config.idle_default, 255);

        assert_eq!(
            config.set_idle_default(Milliseconds(1024_u32)),
            Err(UsbHidBuilderError::ValueOverflow)
        );
    }

    #[test]
    fn endpoint_interval_must_fit_in_a_byte() {
        let mut config = BootKeyboardConfig::default();

        assert_eq!(
            config.set_in_endpoint(UsbPacketSize::Bytes8, Milliseconds(256_u32)),
            Err(UsbHidBuilderError::ValueOverflow)
        );
        config
            .set_in_endpoint(UsbPacketSize::Bytes16, Milliseconds(10_u32))
            .unwrap();
        assert_eq!(
            config.in_endpoint,
            EndpointConfig {
                poll_interval: 10,
                max_packet_size: UsbPacketSize::Bytes16
            }
        );
    }

    #[test]
    fn feature_report_len_is_bounded() {
        let mut config = BootKeyboardConfig::default();

        assert_eq!(
            config.set_feature_report_len(FEATURE_REPORT_CAPACITY + 1),
            Err(UsbHidBuilderError::SliceLengthOverflow)
        );
        config.set_feature_report_len(4).unwrap();
        assert_eq!(FeatureReport::from_config(config.feature_report_len), FeatureReport::Armed(4));
    }

    #[test]
    fn idle_manager_expires_after_timeout() {
        let mut manager = IdleManager::default();
        manager.report_written(1_u8);

        for _ in 0..3 {
            assert!(!manager.tick(Milliseconds(4_u32)));
        }
        assert!(manager.tick(Milliseconds(4_u32)));

        for _ in 0..3 {
            assert!(!manager.tick(Milliseconds(4_u32)));
        }
        assert!(manager.tick(Milliseconds(4_u32)));
    }

    #[test]
    fn idle_manager_never_expires_with_zero_timeout() {
        let mut manager = IdleManager::default();
        manager.report_written(1_u8);

        for _ in 0..1000 {
            assert!(!manager.tick(Milliseconds(0_u32)));
        }
    }

    #[test]
    fn idle_manager_detects_duplicates() {
        let mut manager = IdleManager::default();
        assert!(!manager.is_duplicate(&1_u8));

        manager.report_written(1_u8);
        assert!(manager.is_duplicate(&1_u8));
        assert!(!manager.is_duplicate(&2_u8));
        assert_eq!(manager.last_report(), Some(1));
    }
}

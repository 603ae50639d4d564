//! USB Class for the HID boot keyboard

use delegate::delegate;
use embedded_time::duration::Milliseconds;
use log::{error, info, trace, warn};
use usb_device::class_prelude::*;
use usb_device::control::{Recipient, Request, RequestType};
use usb_device::Result;

use crate::descriptor::{DescriptorType, HidProtocol, HidRequest, ReportType};
use crate::interface::{
    BootKeyboardConfig, BootKeyboardInterface, BuilderResult, UsbPacketSize,
};
use crate::report::{BootKeyboardReport, KeyboardLedsReport};
use crate::UsbHidError;


/// Largest report answered to a GetReport request
const CONTROL_IN_REPORT_CAPACITY: usize = 64;

/// Builder for [`BootKeyboardClass`]
#[must_use = "this `BootKeyboardClassBuilder` must be assigned or consumed by `::build()`"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootKeyboardClassBuilder<'a> {
    config: BootKeyboardConfig<'a>,
}

impl<'a> BootKeyboardClassBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, s: &'a str) -> Self {
        self.config.description = Some(s);
        self
    }

    pub fn without_description(mut self) -> Self {
        self.config.description = None;
        self
    }

    pub fn idle_default(mut self, duration: Milliseconds) -> BuilderResult<Self> {
        self.config.set_idle_default(duration)?;
        Ok(self)
    }

    pub fn in_endpoint(
        mut self,
        max_packet_size: UsbPacketSize,
        poll_interval: Milliseconds,
    ) -> BuilderResult<Self> {
        self.config.set_in_endpoint(max_packet_size, poll_interval)?;
        Ok(self)
    }

    /// Accept a host written feature report of exactly `len` bytes
    pub fn feature_report(mut self, len: usize) -> BuilderResult<Self> {
        self.config.set_feature_report_len(len)?;
        Ok(self)
    }

    pub fn build<B: UsbBus>(self, usb_alloc: &'a UsbBusAllocator<B>) -> BootKeyboardClass<'a, B> {
        BootKeyboardClass {
            interface: BootKeyboardInterface::new(usb_alloc, self.config),
        }
    }
}

/// USB HID boot keyboard class
pub struct BootKeyboardClass<'a, B: UsbBus> {
    interface: BootKeyboardInterface<'a, B>,
}

impl<'a, B: UsbBus> BootKeyboardClass<'a, B> {
    pub fn interface(&mut self) -> &mut BootKeyboardInterface<'a, B> {
        &mut self.interface
    }

    delegate! {
        to self.interface {
            pub fn protocol(&self) -> HidProtocol;
            pub fn idle(&self) -> Milliseconds;
            pub fn leds(&self) -> KeyboardLedsReport;
            pub fn report(&self) -> &BootKeyboardReport;
            pub fn press(&mut self, key: u8) -> bool;
            pub fn release(&mut self, key: u8) -> bool;
            pub fn release_all(&mut self);
            pub fn send(&mut self) -> core::result::Result<(), UsbHidError>;
            pub fn write_report(&mut self, report: &BootKeyboardReport) -> core::result::Result<(), UsbHidError>;
            pub fn tick(&mut self) -> core::result::Result<(), UsbHidError>;
            pub fn enable_feature_report(&mut self, len: usize) -> core::result::Result<(), UsbHidError>;
            pub fn disable_feature_report(&mut self);
            pub fn read_feature_report(&mut self, data: &mut [u8]) -> Result<usize>;
        }
    }

    /// Only interface recipient requests addressed to this keyboard are handled
    fn is_for_interface(&self, request: &Request) -> bool {
        request.recipient == Recipient::Interface
            && u8::try_from(request.index).ok() == Some(u8::from(self.interface.id()))
    }

    fn get_descriptor(&mut self, transfer: ControlIn<B>) {
        let request: &Request = transfer.request();
        match DescriptorType::try_from((request.value >> 8) as u8) {
            Ok(DescriptorType::Report) => {
                self.interface.report_descriptor_requested();
                match transfer.accept_with(self.interface.report_descriptor()) {
                    Err(e) => error!("Failed to send report descriptor - {:?}", e),
                    Ok(_) => {
                        trace!("Sent report descriptor");
                    }
                }
            }
            Ok(DescriptorType::Hid) => match self.interface.hid_descriptor_body() {
                Ok(body) => {
                    let mut buffer = [0; 9];
                    buffer[0] = buffer.len() as u8;
                    buffer[1] = DescriptorType::Hid.into();
                    buffer[2..].copy_from_slice(&body);
                    match transfer.accept_with(&buffer) {
                        Err(e) => {
                            error!("Failed to send Hid descriptor - {:?}", e);
                        }
                        Ok(_) => {
                            trace!("Sent hid descriptor");
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to build Hid descriptor - {:?}", e);
                    transfer.reject().ok();
                }
            },
            _ => {
                warn!(
                    "Unsupported descriptor type, request type:{:?}, request:{:X}, value:{:X}",
                    request.request_type, request.request, request.value
                );
            }
        }
    }

    fn get_report(&mut self, transfer: ControlIn<B>) {
        let request: &Request = transfer.request();
        let report_type = match ReportType::try_from((request.value >> 8) as u8) {
            Ok(t) => t,
            Err(_) => {
                warn!("GetReport for unsupported report type, value:{:X}", request.value);
                transfer.reject().ok();
                return;
            }
        };

        let mut data = [0_u8; CONTROL_IN_REPORT_CAPACITY];
        match self.interface.get_report(report_type, &mut data) {
            Ok(n) => {
                if n != request.length as usize {
                    warn!(
                        "GetReport expected {:X} bytes, got {:X} bytes",
                        request.length, n
                    );
                }
                match transfer.accept_with(&data[..n]) {
                    Err(e) => error!("Failed to send report - {:?}", e),
                    Ok(()) => {
                        trace!("Sent {:?} report, {:X} bytes", report_type, n);
                    }
                }
            }
            Err(e) => {
                trace!("Rejected GetReport for {:?} report - {:?}", report_type, e);
                transfer.reject().ok();
            }
        }
    }

    fn set_report(&mut self, transfer: ControlOut<B>) {
        let request: &Request = transfer.request();
        let report_type = match ReportType::try_from((request.value >> 8) as u8) {
            Ok(t) => t,
            Err(_) => {
                warn!("SetReport for unsupported report type, value:{:X}", request.value);
                transfer.reject().ok();
                return;
            }
        };

        if transfer.data().len() != request.length as usize {
            warn!(
                "SetReport expected {:X} bytes, received {:X}",
                request.length,
                transfer.data().len()
            );
        }

        match self.interface.set_report(report_type, transfer.data()) {
            Ok(()) => {
                transfer.accept().ok();
            }
            Err(e) => {
                trace!("Rejected SetReport for {:?} report - {:?}", report_type, e);
                transfer.reject().ok();
            }
        }
    }
}

impl<B: UsbBus> UsbClass<B> for BootKeyboardClass<'_, B> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        self.interface.write_descriptors(writer)?;
        info!("wrote class config descriptor");
        Ok(())
    }

    fn get_string(&self, index: StringIndex, lang_id: u16) -> Option<&str> {
        self.interface.get_string(index, lang_id)
    }

    fn reset(&mut self) {
        info!("Reset");
        self.interface.reset();
    }

    fn control_out(&mut self, transfer: ControlOut<B>) {
        let request: &Request = transfer.request();

        //only respond to Class requests for this interface
        if !(request.request_type == RequestType::Class && self.is_for_interface(request)) {
            return;
        }

        trace!(
            "ctrl_out: request type: {:?}, request: {:X}, value: {:X}",
            request.request_type,
            request.request,
            request.value
        );

        match HidRequest::try_from(request.request) {
            Ok(HidRequest::SetReport) => {
                self.set_report(transfer);
            }
            Ok(HidRequest::SetIdle) => {
                if request.length != 0 {
                    warn!(
                        "Expected SetIdle to have length 0, received {:X}",
                        request.length
                    );
                }

                self.interface
                    .set_idle((request.value & 0xFF) as u8, (request.value >> 8) as u8);
                transfer.accept().ok();
            }
            Ok(HidRequest::SetProtocol) => {
                if request.length != 0 {
                    warn!(
                        "Expected SetProtocol to have length 0, received {:X}",
                        request.length
                    );
                }
                if let Ok(protocol) = HidProtocol::try_from((request.value & 0xFF) as u8) {
                    self.interface.set_protocol(protocol);
                    transfer.accept().ok();
                } else {
                    error!(
                        "Unable to set protocol, unsupported value:{:X}",
                        request.value
                    );
                    transfer.reject().ok();
                }
            }
            _ => {
                warn!(
                    "Unsupported control_out request type: {:?}, request: {:X}, value: {:X}",
                    request.request_type, request.request, request.value
                );
            }
        }
    }

    fn control_in(&mut self, transfer: ControlIn<B>) {
        let request: &Request = transfer.request();

        //only respond to requests for this interface
        if !self.is_for_interface(request) {
            return;
        }

        trace!(
            "ctrl_in: request type: {:?}, request: {:X}, value: {:X}",
            request.request_type,
            request.request,
            request.value
        );

        match request.request_type {
            RequestType::Standard => {
                if request.request == Request::GET_DESCRIPTOR {
                    info!("Get descriptor");
                    self.get_descriptor(transfer);
                }
            }
            RequestType::Class => match HidRequest::try_from(request.request) {
                Ok(HidRequest::GetReport) => {
                    self.get_report(transfer);
                }
                Ok(HidRequest::GetIdle) => {
                    if request.length != 1 {
                        warn!(
                            "Expected GetIdle to have length 1, received {:X}",
                            request.length
                        );
                    }

                    let report_id = (request.value & 0xFF) as u8;
                    let idle = self.interface.get_idle(report_id);
                    match transfer.accept_with(&[idle]) {
                        Err(e) => error!("Failed to send idle data - {:?}", e),
                        Ok(_) => info!("Get Idle for ID{:X}: {:X}", report_id, idle),
                    }
                }
                Ok(HidRequest::GetProtocol) => {
                    if request.length != 1 {
                        warn!(
                            "Expected GetProtocol to have length 1, received {:X}",
                            request.length
                        );
                    }

                    let protocol = self.interface.get_protocol();
                    match transfer.accept_with(&[u8::from(protocol)]) {
                        Err(e) => error!("Failed to send protocol data - {:?}", e),
                        Ok(_) => info!("Get protocol: {:?}", protocol),
                    }
                }
                _ => {
                    warn!(
                        "Unsupported control_in request type: {:?}, request: {:X}, value: {:X}",
                        request.request_type, request.request, request.value
                    );
                }
            },
            _ => {}
        }
    }
}

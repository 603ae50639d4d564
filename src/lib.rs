//! USB HID boot keyboard class for [usb-device](https://crates.io/crates/usb-device).
//!
//! Describes a boot compatible keyboard to the host, answers the HID class
//! control requests (get/set report, idle and protocol) and sends 8 byte key
//! reports over an interrupt IN endpoint.
//!
//! ```rust, no_run
//! # use core::todo;
//! # use usb_device::bus::PollResult;
//! # use usb_device::class_prelude::*;
//! # use usb_device::prelude::*;
//! # use usb_device::UsbDirection;
//! use usbd_boot_keyboard::prelude::*;
//! use usbd_boot_keyboard::report::usage;
//! #
//! # struct DummyUsbBus;
//! # impl UsbBus for DummyUsbBus {
//! #     fn alloc_ep(&mut self, _: UsbDirection, _: Option<EndpointAddress>, _: EndpointType,
//! #         _: u16, _: u8) -> usb_device::Result<EndpointAddress> { todo!() }
//! #     fn enable(&mut self) { todo!() }
//! #     fn reset(&self) { todo!() }
//! #     fn set_device_address(&self, _: u8) { todo!() }
//! #     fn write(&self, _: EndpointAddress, _: &[u8]) -> usb_device::Result<usize> { todo!() }
//! #     fn read(&self, _: EndpointAddress, _: &mut [u8]) -> usb_device::Result<usize> { todo!() }
//! #     fn set_stalled(&self, _: EndpointAddress, _: bool) { todo!() }
//! #     fn is_stalled(&self, _: EndpointAddress) -> bool { todo!() }
//! #     fn suspend(&self) { todo!() }
//! #     fn resume(&self) { todo!() }
//! #     fn poll(&self) -> PollResult { todo!() }
//! # }
//! # let key_down: fn() -> bool = todo!();
//! # let tick_elapsed: fn() -> bool = todo!();
//! # let update_leds: fn(KeyboardLedsReport) = todo!();
//! let usb_alloc = UsbBusAllocator::new(DummyUsbBus);
//!
//! let mut keyboard = BootKeyboardClassBuilder::new().build(&usb_alloc);
//!
//! let mut usb_dev = UsbDeviceBuilder::new(&usb_alloc, UsbVidPid(0x1209, 0x0001))
//!     .manufacturer("usbd-boot-keyboard")
//!     .product("Boot Keyboard")
//!     .build();
//!
//! loop {
//!     if key_down() {
//!         keyboard.press(usage::A);
//!     } else {
//!         keyboard.release_all();
//!     }
//!     keyboard.send().ok();
//!
//!     //tick once per ms
//!     if tick_elapsed() {
//!         keyboard.tick().ok();
//!     }
//!
//!     if usb_dev.poll(&mut [&mut keyboard]) {
//!         update_leds(keyboard.leds());
//!     }
//! }
//! ```

#![no_std]

//Allow the use of std in tests
#[cfg(test)]
#[macro_use]
extern crate std;

use usb_device::UsbError;

pub mod class;
pub mod descriptor;
pub mod interface;
pub mod prelude;
pub mod report;

#[derive(Debug)]
pub enum UsbHidError {
    WouldBlock,
    Duplicate,
    UsbError(UsbError),
    SerializationError,
}

impl From<UsbError> for UsbHidError {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::WouldBlock => UsbHidError::WouldBlock,
            _ => UsbHidError::UsbError(e),
        }
    }
}

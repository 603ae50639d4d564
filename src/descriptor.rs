//! HID descriptor constants and enumerations
use num_enum::{IntoPrimitive, TryFromPrimitive};
use packed_struct::prelude::*;

pub(crate) const USB_CLASS_HID: u8 = 0x03;
pub(crate) const SPEC_VERSION_1_10: u16 = 0x0110; //1.10 in BCD
pub(crate) const COUNTRY_CODE_NOT_SUPPORTED: u8 = 0x0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum InterfaceProtocol {
    None = 0x00,
    Keyboard = 0x01,
    Mouse = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PrimitiveEnum, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub(crate) enum DescriptorType {
    Hid = 0x21,
    Report = 0x22,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub(crate) enum InterfaceSubClass {
    None = 0x00,
    Boot = 0x01,
}

impl From<InterfaceProtocol> for InterfaceSubClass {
    fn from(protocol: InterfaceProtocol) -> Self {
        if protocol == InterfaceProtocol::None {
            Self::None
        } else {
            Self::Boot
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum HidProtocol {
    Boot = 0x00,
    Report = 0x01,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub(crate) enum HidRequest {
    GetReport = 0x01,
    GetIdle = 0x02,
    GetProtocol = 0x03,
    SetReport = 0x09,
    SetIdle = 0x0A,
    SetProtocol = 0x0B,
}

/// Report type carried in the high byte of `wValue` by GetReport and SetReport
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ReportType {
    Input = 0x01,
    Output = 0x02,
    Feature = 0x03,
}

/// Class specific part of the HID descriptor, following `bLength` and `bDescriptorType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb", size_bytes = 7)]
pub(crate) struct HidDescriptorBody {
    pub bcd_hid: u16,
    pub country_code: u8,
    pub num_descriptors: u8,
    #[packed_field(ty = "enum", size_bytes = "1")]
    pub descriptor_type: DescriptorType,
    pub descriptor_length: u16,
}

/// HID Keyboard report descriptor conforming to the Boot specification
///
/// Modifier bitmap, reserved byte, Num/Caps/Scroll Lock LEDs padded to a byte
/// and a six key array. See Appendix B.1 of [Device Class Definition for Human
/// Interface Devices (Hid) Version 1.11](<https://www.usb.org/sites/default/files/hid1_11.pdf>)
#[rustfmt::skip]
pub const BOOT_KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01,       // Usage Page (Generic Desktop),
    0x09, 0x06,       // Usage (Keyboard),
    0xA1, 0x01,       // Collection (Application),
    0x05, 0x07,       //     Usage Page (Key Codes),
    0x19, 0xE0,       //     Usage Minimum (224),
    0x29, 0xE7,       //     Usage Maximum (231),
    0x15, 0x00,       //     Logical Minimum (0),
    0x25, 0x01,       //     Logical Maximum (1),
    0x75, 0x01,       //     Report Size (1),
    0x95, 0x08,       //     Report Count (8),
    0x81, 0x02,       //     Input (Data, Variable, Absolute), ;Modifier byte
    0x95, 0x01,       //     Report Count (1),
    0x75, 0x08,       //     Report Size (8),
    0x81, 0x01,       //     Input (Constant), ;Reserved byte
    0x95, 0x03,       //     Report Count (3),
    0x75, 0x01,       //     Report Size (1),
    0x05, 0x08,       //     Usage Page (LEDs),
    0x19, 0x01,       //     Usage Minimum (Num Lock),
    0x29, 0x03,       //     Usage Maximum (Scroll Lock),
    0x91, 0x02,       //     Output (Data, Variable, Absolute), ;LED report
    0x95, 0x05,       //     Report Count (5),
    0x75, 0x01,       //     Report Size (1),
    0x91, 0x01,       //     Output (Constant), ;LED report padding
    0x95, 0x06,       //     Report Count (6),
    0x75, 0x08,       //     Report Size (8),
    0x15, 0x00,       //     Logical Minimum (0),
    0x26, 0xFF, 0x00, //     Logical Maximum (255),
    0x05, 0x07,       //     Usage Page (Key Codes),
    0x19, 0x00,       //     Usage Minimum (0),
    0x2A, 0xFF, 0x00, //     Usage Maximum (255),
    0x81, 0x00,       //     Input (Data, Array), ;Key arrays (6 bytes)
    0xC0,             // End Collection
];

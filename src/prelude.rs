//! Prelude for building a boot keyboard
//!
//! The purpose of this module is to alleviate imports of structs and enums
//! required to build and use a [`BootKeyboardClass`]:
//!
//! ```
//! # #![allow(unused_imports)]
//! use usbd_boot_keyboard::prelude::*;
//! ```

pub use crate::class::{BootKeyboardClass, BootKeyboardClassBuilder};
pub use crate::descriptor::{HidProtocol, ReportType};
pub use crate::interface::{UsbHidBuilderError, UsbPacketSize};
pub use crate::report::{BootKeyboardReport, KeyboardLedsReport};
pub use crate::UsbHidError;

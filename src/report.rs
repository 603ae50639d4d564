//! Boot keyboard input and output reports

use packed_struct::prelude::*;

/// Keyboard usage IDs (HID usage page 0x07) with a meaning in the boot report
pub mod usage {
    pub const NO_EVENT_INDICATED: u8 = 0x00;
    pub const ERROR_ROLL_OVER: u8 = 0x01;
    pub const POST_FAIL: u8 = 0x02;
    pub const ERROR_UNDEFINED: u8 = 0x03;
    pub const A: u8 = 0x04;
    pub const LEFT_CONTROL: u8 = 0xE0;
    pub const LEFT_SHIFT: u8 = 0xE1;
    pub const LEFT_ALT: u8 = 0xE2;
    pub const LEFT_GUI: u8 = 0xE3;
    pub const RIGHT_CONTROL: u8 = 0xE4;
    pub const RIGHT_SHIFT: u8 = 0xE5;
    pub const RIGHT_ALT: u8 = 0xE6;
    pub const RIGHT_GUI: u8 = 0xE7;
}

pub const BOOT_KEYBOARD_REPORT_LEN: usize = 8;
pub const KEYBOARD_LEDS_REPORT_LEN: usize = 1;

/// LED state sent by the host in an output report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "lsb0", size_bytes = "1")]
pub struct KeyboardLedsReport {
    #[packed_field(bits = "0")]
    pub num_lock: bool,
    #[packed_field(bits = "1")]
    pub caps_lock: bool,
    #[packed_field(bits = "2")]
    pub scroll_lock: bool,
}

/// Boot keyboard input report: modifier bitmap, reserved byte and six key slots
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "8")]
pub struct BootKeyboardReport {
    #[packed_field(bits = "0")]
    pub right_gui: bool,
    #[packed_field(bits = "1")]
    pub right_alt: bool,
    #[packed_field(bits = "2")]
    pub right_shift: bool,
    #[packed_field(bits = "3")]
    pub right_ctrl: bool,
    #[packed_field(bits = "4")]
    pub left_gui: bool,
    #[packed_field(bits = "5")]
    pub left_alt: bool,
    #[packed_field(bits = "6")]
    pub left_shift: bool,
    #[packed_field(bits = "7")]
    pub left_ctrl: bool,
    #[packed_field(bytes = "2..8", element_size_bytes = "1")]
    pub keys: [u8; 6],
}

impl BootKeyboardReport {
    pub fn new<K: IntoIterator<Item = u8>>(keys: K) -> Self {
        let mut report = Self::default();

        let mut error = false;
        let mut i = 0;
        for k in keys {
            if report.set_modifier(k, true).is_some() {
                continue;
            }
            match k {
                usage::NO_EVENT_INDICATED => {}
                usage::ERROR_ROLL_OVER | usage::POST_FAIL | usage::ERROR_UNDEFINED => {
                    if !error {
                        error = true;
                        report.keys.fill(k);
                    }
                }
                _ => {
                    if error {
                        continue;
                    }

                    if i < report.keys.len() {
                        report.keys[i] = k;
                        i += 1;
                    } else {
                        error = true;
                        report.keys.fill(usage::ERROR_ROLL_OVER);
                    }
                }
            }
        }
        report
    }

    /// Adds a key to the report. Returns false if the key array is full
    pub fn press(&mut self, key: u8) -> bool {
        if self.set_modifier(key, true).is_some() || key == usage::NO_EVENT_INDICATED {
            return true;
        }
        if self.keys.contains(&key) {
            return true;
        }
        match self.keys.iter_mut().find(|k| **k == usage::NO_EVENT_INDICATED) {
            Some(slot) => {
                *slot = key;
                true
            }
            None => false,
        }
    }

    /// Removes a key from the report. Returns false if the key wasn't pressed
    pub fn release(&mut self, key: u8) -> bool {
        if let Some(was_pressed) = self.set_modifier(key, false) {
            return was_pressed;
        }
        if key == usage::NO_EVENT_INDICATED {
            return false;
        }
        match self.keys.iter().position(|&k| k == key) {
            Some(pos) => {
                //keep pressed keys packed at the front
                self.keys.copy_within(pos + 1.., pos);
                self.keys[self.keys.len() - 1] = usage::NO_EVENT_INDICATED;
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        *self = Self::default();
    }

    /// Modifier byte as sent on the wire, bit 0 is Left Control
    pub fn modifiers(&self) -> u8 {
        let bits = [
            self.left_ctrl,
            self.left_shift,
            self.left_alt,
            self.left_gui,
            self.right_ctrl,
            self.right_shift,
            self.right_alt,
            self.right_gui,
        ];

        let mut modifiers = 0;
        for (bit, set) in bits.iter().enumerate() {
            if *set {
                modifiers |= 1 << bit;
            }
        }
        modifiers
    }

    /// Returns the previous state of the modifier, `None` if `key` isn't a modifier
    fn set_modifier(&mut self, key: u8, value: bool) -> Option<bool> {
        let modifier = match key {
            usage::LEFT_CONTROL => &mut self.left_ctrl,
            usage::LEFT_SHIFT => &mut self.left_shift,
            usage::LEFT_ALT => &mut self.left_alt,
            usage::LEFT_GUI => &mut self.left_gui,
            usage::RIGHT_CONTROL => &mut self.right_ctrl,
            usage::RIGHT_SHIFT => &mut self.right_shift,
            usage::RIGHT_ALT => &mut self.right_alt,
            usage::RIGHT_GUI => &mut self.right_gui,
            _ => return None,
        };
        Some(core::mem::replace(modifier, value))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modifier_bits_follow_usage_order() {
        let report = BootKeyboardReport::new([usage::LEFT_CONTROL, usage::RIGHT_GUI]);
        let data = report.pack().unwrap();

        assert_eq!(data, [0b1000_0001, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(report.modifiers(), 0b1000_0001);
    }

    #[test]
    fn keys_fill_slots_in_order() {
        let report = BootKeyboardReport::new([0x04, usage::LEFT_SHIFT, 0x05, 0x00, 0x06]);

        assert_eq!(
            report.pack().unwrap(),
            [0b0000_0010, 0, 0x04, 0x05, 0x06, 0, 0, 0]
        );
    }

    #[test]
    fn too_many_keys_report_roll_over() {
        let report = BootKeyboardReport::new(0x04..0x0B);

        assert_eq!(report.keys, [usage::ERROR_ROLL_OVER; 6]);
    }

    #[test]
    fn error_usage_fills_every_slot() {
        let report = BootKeyboardReport::new([0x04, usage::POST_FAIL, 0x05]);

        assert_eq!(report.keys, [usage::POST_FAIL; 6]);
    }

    #[test]
    fn press_and_release_keep_keys_packed() {
        let mut report = BootKeyboardReport::default();

        assert!(report.press(0x04));
        assert!(report.press(0x05));
        assert!(report.press(0x06));
        assert!(report.press(0x05));
        assert_eq!(report.keys, [0x04, 0x05, 0x06, 0, 0, 0]);

        assert!(report.release(0x04));
        assert_eq!(report.keys, [0x05, 0x06, 0, 0, 0, 0]);
        assert!(!report.release(0x04));
    }

    #[test]
    fn press_fails_when_full() {
        let mut report = BootKeyboardReport::default();
        for k in 0x04..0x0A {
            assert!(report.press(k));
        }

        assert!(!report.press(0x0A));
        assert!(report.press(usage::LEFT_ALT));
        assert!(report.left_alt);
    }

    #[test]
    fn release_reports_whether_modifier_was_pressed() {
        let mut report = BootKeyboardReport::new([usage::LEFT_GUI]);

        assert!(!report.release(usage::RIGHT_GUI));
        assert!(report.release(usage::LEFT_GUI));
        assert!(!report.left_gui);
        assert!(!report.release(usage::LEFT_GUI));
    }

    #[test]
    fn release_all_clears_modifiers_and_keys() {
        let mut report = BootKeyboardReport::new([usage::RIGHT_SHIFT, 0x10]);
        report.release_all();

        assert_eq!(report, BootKeyboardReport::default());
    }

    #[test]
    fn leds_unpack_lsb_first() {
        let leds = KeyboardLedsReport::unpack(&[0b0000_0110]).unwrap();

        assert_eq!(
            leds,
            KeyboardLedsReport {
                num_lock: false,
                caps_lock: true,
                scroll_lock: true,
            }
        );
    }
}

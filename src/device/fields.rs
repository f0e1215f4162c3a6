//! Field descriptor shorthands shared by the port layouts
//!
//! The common status byte: bit7 duty cycle, bits6..3 configuration id, bit2
//! configuration change applied, bit0 the port's primary flag.

use crate::payload::{ApOrder, FieldDescriptor, Transform};

pub const DEGREES: f64 = 1_000_000.0;
pub const MILLIVOLTS: f64 = 1000.0;
pub const DECIMETERS: f64 = 10.0;
pub const CENTI_CELSIUS: f64 = 100.0;

pub fn duty_cycle<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 1).transform(Transform::Bit(7))
}

pub fn config_id<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 1).transform(Transform::Bits { shift: 3, width: 4 })
}

pub fn config_change<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 1).transform(Transform::Bit(2))
}

/// Bit 0 of the status byte
pub fn flag<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 1).transform(Transform::Bit(0))
}

/// Signed 1/1 000 000 degrees
pub fn coordinate<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 4).transform(Transform::Scaled { divisor: DEGREES, signed: true })
}

/// Unsigned 16-bit value divided by `divisor`
pub fn scaled_u16<F>(field: F, start: usize, divisor: f64) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 2).transform(Transform::Scaled { divisor, signed: false })
}

/// Signed 16-bit value divided by `divisor`
pub fn scaled_i16<F>(field: F, start: usize, divisor: f64) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 2).transform(Transform::Scaled { divisor, signed: true })
}

pub fn millivolts<F>(field: F, start: usize) -> FieldDescriptor<F> {
    scaled_u16(field, start, MILLIVOLTS)
}

pub fn centi_celsius<F>(field: F, start: usize) -> FieldDescriptor<F> {
    scaled_i16(field, start, CENTI_CELSIUS)
}

/// 32-bit Unix seconds
pub fn unix_time<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 4).transform(Transform::UnixSeconds)
}

pub fn seconds<F>(field: F, start: usize, length: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, length).transform(Transform::Seconds)
}

/// PDOP in half units
pub fn pdop<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, 1).transform(Transform::Scaled { divisor: 2.0, signed: false })
}

/// One byte per component
pub fn version<F>(field: F, start: usize, components: usize) -> FieldDescriptor<F> {
    FieldDescriptor::new(field, start, components).transform(Transform::DottedVersion)
}

/// `mac(6) rssi(1)` tuples to the end of the payload
pub fn access_points<F>(field: F, start: usize) -> FieldDescriptor<F> {
    FieldDescriptor::rest(field, start).hex().transform(Transform::AccessPoints {
        order: ApOrder::MacFirst,
        nullable_rssi: false,
    })
}

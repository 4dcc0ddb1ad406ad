//! `MessageId` — a 64-bit routing + payload-shape tag.
//!
//! # 设计背景（Why）
//! The third most significant byte of an id encodes the shape of its
//! payload (none / scalar / vector / struct, with width); the two most
//! significant bytes identify the id's source namespace. Encoding shape in
//! the id itself lets `Message::new` assert a payload matches its id at
//! construction time rather than at first (potentially distant) use.

use std::fmt;

/// Bitmask selecting the "payload shape" byte (the third most significant
/// byte of the id).
const SHAPE_MASK: u64 = 0x0000_FF00_0000_0000;
const SHAPE_SHIFT: u32 = 40;

/// Shape codes, from the original id catalog's payload-shape table.
const SHAPE_NONE: u8 = 0x00;
const SHAPE_SCALAR_F64: u8 = 0x32;
const SHAPE_VECTOR_F64: u8 = 0xC2;
const SHAPE_STRUCT: u8 = 0x38;
const SHAPE_VECTOR_STRUCT: u8 = 0xC8;

/// A 64-bit message identifier encoding source namespace, payload shape,
/// and specific meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const fn from_raw(raw: u64) -> Self {
        MessageId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    fn shape(self) -> u8 {
        ((self.0 & SHAPE_MASK) >> SHAPE_SHIFT) as u8
    }

    /// True for any id whose payload shape is a single scalar (the
    /// `0x3_` row of the shape table).
    pub fn is_scalar(self) -> bool {
        let shape = self.shape();
        (0x31..=0x38).contains(&shape) && shape != SHAPE_STRUCT || shape == SHAPE_SCALAR_F64
    }

    /// True for any id whose payload shape is a length-prefixed vector
    /// (the `0x4_`/`0x8_`/`0xC_` rows of the shape table).
    pub fn is_vector(self) -> bool {
        let shape = self.shape();
        (0x41..=0x44).contains(&shape) || (0x81..=0x84).contains(&shape) || shape == SHAPE_VECTOR_F64 || shape == SHAPE_VECTOR_STRUCT
    }

    pub fn is_struct(self) -> bool {
        matches!(self.shape(), SHAPE_STRUCT | SHAPE_VECTOR_STRUCT)
    }

    pub fn is_none(self) -> bool {
        self.shape() == SHAPE_NONE
    }

    /// Whether `id` matches a subscription filter `filter`: either the
    /// filter is the wildcard [`MessageId::ALL`], or the ids are equal.
    pub fn matches(self, filter: MessageId) -> bool {
        filter == MessageId::ALL || self == filter
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// The NASA-touchtone-phone source prefix (`0x6272`) used by every
/// built-in id below, kept solely so the constants read as a single
/// coherent table instead of sixteen independent hex literals.
macro_rules! builtin_id {
    ($name:ident, $value:expr) => {
        pub const $name: MessageId = MessageId($value);
    };
}

impl MessageId {
    builtin_id!(ALL, 0x0000_0000_0000_0000);
    builtin_id!(VOLTS, 0x6272_3200_0000_0000);
    builtin_id!(AMPERES, 0x6272_3200_0000_0100);
    builtin_id!(WATTS, 0x6272_3200_0000_0200);
    builtin_id!(KELVIN, 0x6272_3200_0000_0300);
    builtin_id!(CENTIGRADE, 0x6272_3200_0000_0301);
    builtin_id!(FAHRENHEIT, 0x6272_3200_0000_0302);
    builtin_id!(MODEL_STATE_ESTIMATE, 0x6272_C200_0000_0400);
    builtin_id!(MODEL_STATE_VECTOR, 0x6272_C200_0000_0500);
    builtin_id!(MODEL_INPUT_VECTOR, 0x6272_C200_0000_0501);
    builtin_id!(MODEL_OUTPUT_VECTOR, 0x6272_C200_0000_0502);
    builtin_id!(PREDICTION, 0x6272_C800_0000_0600);
    builtin_id!(TEST_INPUT_0, 0x6272_3200_0000_FE00);
    builtin_id!(TEST_INPUT_1, 0x6272_3200_0000_FE01);
    builtin_id!(TEST_INPUT_2, 0x6272_3200_0000_FE02);
    builtin_id!(TEST_INPUT_3, 0x6272_3200_0000_FE03);
    builtin_id!(TEST_OUTPUT_0, 0x6272_3200_0000_FF00);
    builtin_id!(TEST_OUTPUT_1, 0x6272_3200_0000_FF01);
    builtin_id!(TEST_OUTPUT_2, 0x6272_3200_0000_FF02);
    builtin_id!(TEST_OUTPUT_3, 0x6272_3200_0000_FF03);
    builtin_id!(BATTERY_EOD, 0x6272_3801_0000_0000);
    builtin_id!(BATTERY_EOL, 0x6272_3801_0000_0100);
    builtin_id!(TEST_EVENT_0, 0x6272_38FF_0000_0000);
    builtin_id!(ROUTE_START, 0x6272_0000_0000_0100);
    builtin_id!(ROUTE_END, 0x6272_0000_0000_0101);
    builtin_id!(ROUTE_CLEAR, 0x6272_0000_0000_0102);
    builtin_id!(ROUTE_SET_WP, 0x6272_C800_0000_0103);
    builtin_id!(ROUTE_DELETE_WP, 0x6272_3200_0000_0104);
}

/// Looks up a built-in id by its canonical catalog name (see `spec.md`
/// §6's message-id catalog), mirroring `messageIdFromString` in the
/// original source.
pub fn by_name(name: &str) -> Option<MessageId> {
    Some(match name {
        "All" => MessageId::ALL,
        "Volts" => MessageId::VOLTS,
        "Amperes" => MessageId::AMPERES,
        "Watts" => MessageId::WATTS,
        "Kelvin" => MessageId::KELVIN,
        "Centigrade" => MessageId::CENTIGRADE,
        "Fahrenheit" => MessageId::FAHRENHEIT,
        "ModelStateEstimate" => MessageId::MODEL_STATE_ESTIMATE,
        "ModelStateVector" => MessageId::MODEL_STATE_VECTOR,
        "ModelInputVector" => MessageId::MODEL_INPUT_VECTOR,
        "ModelOutputVector" => MessageId::MODEL_OUTPUT_VECTOR,
        "Prediction" => MessageId::PREDICTION,
        "TestInput0" => MessageId::TEST_INPUT_0,
        "TestInput1" => MessageId::TEST_INPUT_1,
        "TestInput2" => MessageId::TEST_INPUT_2,
        "TestInput3" => MessageId::TEST_INPUT_3,
        "TestOutput0" => MessageId::TEST_OUTPUT_0,
        "TestOutput1" => MessageId::TEST_OUTPUT_1,
        "TestOutput2" => MessageId::TEST_OUTPUT_2,
        "TestOutput3" => MessageId::TEST_OUTPUT_3,
        "BatteryEod" => MessageId::BATTERY_EOD,
        "BatteryEol" => MessageId::BATTERY_EOL,
        "TestEvent0" => MessageId::TEST_EVENT_0,
        "RouteStart" => MessageId::ROUTE_START,
        "RouteEnd" => MessageId::ROUTE_END,
        "RouteClear" => MessageId::ROUTE_CLEAR,
        "RouteSetWP" => MessageId::ROUTE_SET_WP,
        "RouteDeleteWP" => MessageId::ROUTE_DELETE_WP,
        _ => return None,
    })
}

//! Address: a word index into the heap arena
//!
//! Header: word 0 of every tagged object, big-endian
//! `[major, subtype, payload x4, size x2]`
//!
//! TypeTag: the 16 bit full type of a tagged object. The high bit of the
//! major byte marks composite and machine-internal kinds.
use std::fmt;

/// A word index into the heap arena. Index 0 is reserved and never names an
/// object.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(usize);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    pub const fn offset(self, words: usize) -> Self {
        Self(self.0 + words)
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn to_word(self) -> u64 {
        self.0 as u64
    }

    pub const fn from_word(word: u64) -> Self {
        Self(word as usize)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

pub const COMPOSITE_BIT: u8 = 0b1000_0000;

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MajorType {
    Bool = 0x01,
    Int = 0x02,
    Uint = 0x03,
    Float = 0x04,
    Nil = 0x80,
    Unassigned = 0x81,
    BlockMarker = 0x82,
    CallMarker = 0x83,
    Frame = 0x84,
    Callable = 0x85,
    Environment = 0x86,
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool = 0x0101,
    Int8 = 0x0201,
    Int16 = 0x0202,
    Int32 = 0x0204,
    Uint8 = 0x0301,
    Uint16 = 0x0302,
    Uint32 = 0x0304,
    Float64 = 0x0408,
    Builtin = 0x8502,
    Function = 0x8504,
    Nil = 0x8000,
    Unassigned = 0x8100,
    BlockMarker = 0x8200,
    CallMarker = 0x8300,
    Frame = 0x8400,
    Environment = 0x8600,
}

impl TypeTag {
    pub const ALL: [TypeTag; 16] = [
        TypeTag::Bool,
        TypeTag::Int8,
        TypeTag::Int16,
        TypeTag::Int32,
        TypeTag::Uint8,
        TypeTag::Uint16,
        TypeTag::Uint32,
        TypeTag::Float64,
        TypeTag::Builtin,
        TypeTag::Function,
        TypeTag::Nil,
        TypeTag::Unassigned,
        TypeTag::BlockMarker,
        TypeTag::CallMarker,
        TypeTag::Frame,
        TypeTag::Environment,
    ];

    pub fn from_u16(raw: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| *tag as u16 == raw)
    }

    pub const fn full_type(self) -> u16 {
        self as u16
    }

    pub fn major(self) -> MajorType {
        match self {
            TypeTag::Bool => MajorType::Bool,
            TypeTag::Int8 | TypeTag::Int16 | TypeTag::Int32 => MajorType::Int,
            TypeTag::Uint8 | TypeTag::Uint16 | TypeTag::Uint32 => MajorType::Uint,
            TypeTag::Float64 => MajorType::Float,
            TypeTag::Builtin | TypeTag::Function => MajorType::Callable,
            TypeTag::Nil => MajorType::Nil,
            TypeTag::Unassigned => MajorType::Unassigned,
            TypeTag::BlockMarker => MajorType::BlockMarker,
            TypeTag::CallMarker => MajorType::CallMarker,
            TypeTag::Frame => MajorType::Frame,
            TypeTag::Environment => MajorType::Environment,
        }
    }

    pub const fn subtype(self) -> u8 {
        (self as u16 & 0xFF) as u8
    }

    pub const fn is_composite(self) -> bool {
        (self as u16 >> 8) as u8 & COMPOSITE_BIT != 0
    }

    /// Words between the header and the first child.
    pub const fn payload_words(self) -> usize {
        match self {
            TypeTag::Float64 => 1,
            _ => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int8 => "int8",
            TypeTag::Int16 => "int16",
            TypeTag::Int32 => "int32",
            TypeTag::Uint8 => "uint8",
            TypeTag::Uint16 => "uint16",
            TypeTag::Uint32 => "uint32",
            TypeTag::Float64 => "float64",
            TypeTag::Builtin => "builtin",
            TypeTag::Function => "function",
            TypeTag::Nil => "nil",
            TypeTag::Unassigned => "unassigned",
            TypeTag::BlockMarker => "block marker",
            TypeTag::CallMarker => "call marker",
            TypeTag::Frame => "frame",
            TypeTag::Environment => "environment",
        }
    }
}

/// Header word of a tagged object.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Header(u64);

impl Header {
    pub const TYPE_SHIFT: u64 = 48;
    pub const PAYLOAD_SHIFT: u64 = 16;
    pub const PAYLOAD_MASK: u64 = 0xFFFF_FFFF << Self::PAYLOAD_SHIFT;
    pub const SIZE_MASK: u64 = 0xFFFF;

    pub const fn new(full_type: u16, size: u16) -> Self {
        Self(((full_type as u64) << Self::TYPE_SHIFT) | size as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn full_type(self) -> u16 {
        (self.0 >> Self::TYPE_SHIFT) as u16
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 56) as u8
    }

    pub const fn subtype(self) -> u8 {
        (self.0 >> Self::TYPE_SHIFT) as u8
    }

    pub const fn size(self) -> usize {
        (self.0 & Self::SIZE_MASK) as usize
    }

    pub const fn payload(self) -> u32 {
        ((self.0 & Self::PAYLOAD_MASK) >> Self::PAYLOAD_SHIFT) as u32
    }

    pub const fn with_payload(self, payload: u32) -> Self {
        Self((self.0 & !Self::PAYLOAD_MASK) | ((payload as u64) << Self::PAYLOAD_SHIFT))
    }

    pub fn tag(self) -> Option<TypeTag> {
        TypeTag::from_u16(self.full_type())
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("full_type", &format_args!("{:#06x}", self.full_type()))
            .field("payload", &format_args!("{:#010x}", self.payload()))
            .field("size", &self.size())
            .finish()
    }
}

/// The scalar types a program can name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float64,
}

/// Type names in declaration order; conversion builtins follow this order.
pub const TYPE_NAMES: &[(&str, PrimitiveType)] = &[
    ("int", PrimitiveType::Int32),
    ("int8", PrimitiveType::Int8),
    ("int16", PrimitiveType::Int16),
    ("int32", PrimitiveType::Int32),
    ("float", PrimitiveType::Float64),
    ("float64", PrimitiveType::Float64),
    ("uint8", PrimitiveType::Uint8),
    ("uint16", PrimitiveType::Uint16),
    ("uint32", PrimitiveType::Uint32),
    ("bool", PrimitiveType::Bool),
    ("rune", PrimitiveType::Int32),
    ("byte", PrimitiveType::Uint8),
];

impl PrimitiveType {
    pub const INTEGERS: [PrimitiveType; 6] = [
        PrimitiveType::Int8,
        PrimitiveType::Int16,
        PrimitiveType::Int32,
        PrimitiveType::Uint8,
        PrimitiveType::Uint16,
        PrimitiveType::Uint32,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, ty)| *ty)
    }

    pub const fn tag(self) -> TypeTag {
        match self {
            PrimitiveType::Bool => TypeTag::Bool,
            PrimitiveType::Int8 => TypeTag::Int8,
            PrimitiveType::Int16 => TypeTag::Int16,
            PrimitiveType::Int32 => TypeTag::Int32,
            PrimitiveType::Uint8 => TypeTag::Uint8,
            PrimitiveType::Uint16 => TypeTag::Uint16,
            PrimitiveType::Uint32 => TypeTag::Uint32,
            PrimitiveType::Float64 => TypeTag::Float64,
        }
    }

    pub const fn from_tag(tag: TypeTag) -> Option<Self> {
        match tag {
            TypeTag::Bool => Some(PrimitiveType::Bool),
            TypeTag::Int8 => Some(PrimitiveType::Int8),
            TypeTag::Int16 => Some(PrimitiveType::Int16),
            TypeTag::Int32 => Some(PrimitiveType::Int32),
            TypeTag::Uint8 => Some(PrimitiveType::Uint8),
            TypeTag::Uint16 => Some(PrimitiveType::Uint16),
            TypeTag::Uint32 => Some(PrimitiveType::Uint32),
            TypeTag::Float64 => Some(PrimitiveType::Float64),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Uint8 => "uint8",
            PrimitiveType::Uint16 => "uint16",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Float64 => "float64",
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, PrimitiveType::Bool | PrimitiveType::Float64)
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Bool)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32
        )
    }

    /// Byte width, the subtype of the tag.
    pub const fn width(self) -> u8 {
        self.tag().subtype()
    }

    /// Inclusive value range of an integer type.
    pub const fn int_range(self) -> Option<(i64, i64)> {
        match self {
            PrimitiveType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            PrimitiveType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            PrimitiveType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            PrimitiveType::Uint8 => Some((0, u8::MAX as i64)),
            PrimitiveType::Uint16 => Some((0, u16::MAX as i64)),
            PrimitiveType::Uint32 => Some((0, u32::MAX as i64)),
            PrimitiveType::Bool | PrimitiveType::Float64 => None,
        }
    }

    /// Two's complement truncation of `value` to this integer type.
    /// Non-integer types return the value unchanged.
    pub const fn wrap(self, value: i64) -> i64 {
        match self {
            PrimitiveType::Int8 => value as i8 as i64,
            PrimitiveType::Int16 => value as i16 as i64,
            PrimitiveType::Int32 => value as i32 as i64,
            PrimitiveType::Uint8 => value as u8 as i64,
            PrimitiveType::Uint16 => value as u16 as i64,
            PrimitiveType::Uint32 => value as u32 as i64,
            PrimitiveType::Bool | PrimitiveType::Float64 => value,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips_type_size_and_payload() {
        for tag in TypeTag::ALL {
            let header = Header::new(tag.full_type(), 513).with_payload(0xDEAD_BEEF);
            assert_eq!(header.tag(), Some(tag));
            assert_eq!(header.size(), 513);
            assert_eq!(header.payload(), 0xDEAD_BEEF);
            assert_eq!(header.subtype(), tag.subtype());
            assert_eq!(header.major(), tag.major() as u8);
        }
    }

    #[test]
    fn header_bytes_are_big_endian() {
        let header = Header::new(TypeTag::Int32.full_type(), 1).with_payload(0x0102_0304);
        assert_eq!(
            header.raw().to_be_bytes(),
            [0x02, 0x04, 0x01, 0x02, 0x03, 0x04, 0x00, 0x01]
        );
    }

    #[test]
    fn composite_bit_marks_callables_and_machine_kinds() {
        for tag in TypeTag::ALL {
            let scalar = PrimitiveType::from_tag(tag).is_some();
            assert_eq!(tag.is_composite(), !scalar, "{tag:?}");
        }
    }

    #[test]
    fn machine_kinds_have_zero_subtype() {
        for tag in [
            TypeTag::Nil,
            TypeTag::Unassigned,
            TypeTag::BlockMarker,
            TypeTag::CallMarker,
            TypeTag::Frame,
            TypeTag::Environment,
        ] {
            assert_eq!(tag.subtype(), 0);
        }
    }

    #[test]
    fn type_names_resolve_aliases() {
        assert_eq!(PrimitiveType::from_name("int"), Some(PrimitiveType::Int32));
        assert_eq!(PrimitiveType::from_name("rune"), Some(PrimitiveType::Int32));
        assert_eq!(PrimitiveType::from_name("byte"), Some(PrimitiveType::Uint8));
        assert_eq!(PrimitiveType::from_name("float"), Some(PrimitiveType::Float64));
        assert_eq!(PrimitiveType::from_name("int64"), None);
    }

    #[test]
    fn wrap_truncates_to_width() {
        assert_eq!(PrimitiveType::Int8.wrap(128), -128);
        assert_eq!(PrimitiveType::Uint8.wrap(-1), 255);
        assert_eq!(PrimitiveType::Uint16.wrap(65536 + 5), 5);
        assert_eq!(PrimitiveType::Int32.wrap(i32::MAX as i64 + 1), i32::MIN as i64);
        assert_eq!(PrimitiveType::Uint32.wrap(-1), u32::MAX as i64);
    }
}

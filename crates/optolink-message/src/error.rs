/// Errors that can occur while building, serializing or parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The message already holds the maximum number of fields.
    #[error("too many fields (max {max})")]
    TooManyFields { max: usize },

    /// Storage for a field value could not be allocated.
    #[error("out of memory copying {len}-byte field value")]
    OutOfMemory { len: usize },

    /// A field value does not fit the 16-bit length prefix.
    #[error("field value too long ({len} bytes, max {max})")]
    ValueTooLong { len: usize, max: usize },

    /// The destination buffer cannot hold the serialized message.
    #[error("buffer too small ({found} bytes, need {expected})")]
    BufferTooSmall { expected: usize, found: usize },

    /// The input ended in the middle of a field.
    #[error("truncated field at offset {offset}")]
    ParseError { offset: usize },

    /// A checksum field does not match the values that precede it.
    #[error("checksum mismatch (computed {computed:#010x}, found {found:02x?})")]
    ChecksumMismatch { computed: u32, found: Vec<u8> },

    /// No field of the requested type is present.
    #[error("field type {0} not found")]
    NotFound(u8),

    /// A typed getter found a field with an unexpected value length.
    #[error("field type {tlv_type} holds {found} bytes, expected {expected}")]
    SizeMismatch {
        tlv_type: u8,
        expected: usize,
        found: usize,
    },

    /// An enumerated field holds a value outside the protocol registry.
    #[error("field type {tlv_type} holds unknown value {value}")]
    UnknownValue { tlv_type: u8, value: u8 },
}

pub type Result<T> = std::result::Result<T, MessageError>;

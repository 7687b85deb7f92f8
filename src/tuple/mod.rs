mod record;
mod row;
mod serial_type;
mod value;

pub use record::{decode_record, encode_record, RecordCodec};
pub use row::{NamedFields, Row, RowBuilder, RowValues};
pub use serial_type::{put_varint, read_varint, varint_len, SerialType, MAX_VARINT_LEN};
pub use value::{compare_keys, Value};

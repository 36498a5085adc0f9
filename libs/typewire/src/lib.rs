//! Type-directed binary codec.
//!
//! A schema (booleans, 32/64-bit integers, doubles, UTF-8 strings, lists,
//! maps and records, nested arbitrarily) is classified into a
//! [`Descriptor`]; encode and decode are two mirror-image depth-first walks
//! over it. The format is fixed: big-endian, Int32 length/count prefixes,
//! records laid out positionally with no names, tags or padding.
//!
//! ```ignore
//! #[derive(typewire::Record)]
//! struct Pair {
//!     a: i32,
//!     b: String,
//! }
//!
//! let bytes = typewire::encode(&Pair { a: 1, b: "x".into() })?;
//! assert_eq!(bytes, [0, 0, 0, 1, 0, 0, 0, 1, b'x']);
//! ```

extern crate self as typewire;

pub mod codec;
mod composite;
pub mod cursor;
pub mod descriptor;
pub mod error;
pub mod primitive;
pub mod registry;
pub mod resolve;
pub mod string;
pub mod value;
pub mod wire;

pub use typewire_derive::Record;

pub use codec::{Codec, CodecOptions, decode, decode_value, encode, encode_value};
pub use descriptor::{Descriptor, FieldDescriptor, Kind, RecordDescriptor};
pub use error::{CodecError, ErrorKind};
pub use registry::SchemaRegistry;
pub use value::Value;
pub use wire::Wire;

use std::fmt;
use std::sync::Arc;

/// Shape classification of a descriptor, without its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Boolean,
    Int32,
    Int64,
    Double,
    String,
    List,
    Map,
    Record,
}

impl Kind {
    /// Wire width of fixed-size kinds; `None` for length-prefixed and composite kinds.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Kind::Boolean => Some(1),
            Kind::Int32 => Some(4),
            Kind::Int64 | Kind::Double => Some(8),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Boolean => "Boolean",
            Kind::Int32 => "Int32",
            Kind::Int64 => "Int64",
            Kind::Double => "Double",
            Kind::String => "String",
            Kind::List => "List",
            Kind::Map => "Map",
            Kind::Record => "Record",
        };
        f.write_str(name)
    }
}

/// Immutable classification of a schema type. Drives both encode and decode.
///
/// Cloning is cheap for records: the field list is shared behind an `Arc`.
///
/// `Display` renders the type expression accepted by
/// [`TypeExpr::parse`](crate::resolve::TypeExpr::parse), with records printed
/// by name: `Map<String, List<Quote>>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Boolean,
    Int32,
    Int64,
    Double,
    String,
    List(Box<Descriptor>),
    Map(Box<Descriptor>, Box<Descriptor>),
    Record(Arc<RecordDescriptor>),
}

impl Descriptor {
    pub fn list(element: Descriptor) -> Self {
        Descriptor::List(Box::new(element))
    }

    pub fn map(key: Descriptor, value: Descriptor) -> Self {
        Descriptor::Map(Box::new(key), Box::new(value))
    }

    pub fn record(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Descriptor::Record(Arc::new(RecordDescriptor {
            name: name.into(),
            fields,
        }))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Descriptor::Boolean => Kind::Boolean,
            Descriptor::Int32 => Kind::Int32,
            Descriptor::Int64 => Kind::Int64,
            Descriptor::Double => Kind::Double,
            Descriptor::String => Kind::String,
            Descriptor::List(_) => Kind::List,
            Descriptor::Map(..) => Kind::Map,
            Descriptor::Record(_) => Kind::Record,
        }
    }

    /// Fewest bytes any value of this type occupies on the wire.
    ///
    /// Zero only for records whose fields are all zero-width.
    pub fn min_encoded_len(&self) -> usize {
        match self {
            Descriptor::String | Descriptor::List(_) | Descriptor::Map(..) => 4,
            Descriptor::Record(record) => record
                .fields
                .iter()
                .map(|f| f.descriptor.min_encoded_len())
                .sum(),
            primitive => primitive.kind().fixed_width().unwrap_or_default(),
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Descriptor::List(_) | Descriptor::Map(..) | Descriptor::Record(_)
        )
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::List(element) => write!(f, "List<{element}>"),
            Descriptor::Map(key, value) => write!(f, "Map<{key}, {value}>"),
            Descriptor::Record(record) => f.write_str(&record.name),
            primitive => write!(f, "{}", primitive.kind()),
        }
    }
}

/// Ordered field layout of a record type.
///
/// Field order is the wire order. There are no names or counts on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single record field: name plus declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: Descriptor,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, descriptor: Descriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

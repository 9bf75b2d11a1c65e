//! bidl
//!
//! Runtime support for Rust code generated by the bidl compiler.
//!
//! - `ParserContext` and `IdlError` for decode diagnostics
//! - `StructuralCompare` for embedded document fields
//! - `OpMsgRequest`, namespaces and generic command arguments for commands
//! - server parameter and startup option registries
//!
//! Generated files start with `use bidl::prelude::*;`.

pub mod compare;
pub mod context;
pub mod error;
pub mod generic_args;
pub mod namespace;
pub mod op_msg;
pub mod options;
pub mod server_parameter;
pub mod traits;

pub use compare::StructuralCompare;
pub use context::{comparison_error, parse_array_field_number, ParserContext};
pub use error::IdlError;
pub use generic_args::{append_generic_command_arguments, is_generic_argument};
pub use namespace::{NamespaceString, NamespaceStringOrUuid};
pub use op_msg::{DocumentSequence, OpMsgRequest};
pub use traits::IdlStruct;

pub use bidl_bson as bson;

pub mod prelude {
    pub use bidl_bson::{
        doc, ArrayBuilder, BinData, BinDataSubtype, Bson, DateTime, Decimal128, Document,
        ElementType, ObjectId, Timestamp,
    };

    pub use crate::compare::StructuralCompare;
    pub use crate::context::{comparison_error, parse_array_field_number, ParserContext};
    pub use crate::error::IdlError;
    pub use crate::generic_args::{append_generic_command_arguments, is_generic_argument};
    pub use crate::namespace::{NamespaceString, NamespaceStringOrUuid};
    pub use crate::op_msg::{DocumentSequence, OpMsgRequest};
    pub use crate::options::{Environment, OptionSection, OptionSources, OptionType};
    pub use crate::server_parameter::{
        BoundOp, IdlServerParameter, ParameterStorage, ServerParameter, ServerParameterRegistry,
        ServerParameterType, ServerParameterWithStorage,
    };
    pub use crate::traits::IdlStruct;
}

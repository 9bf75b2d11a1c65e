//! Types generated from `idl/example.idl` by the build script.

pub mod generated {
    include!(concat!(env!("OUT_DIR"), "/example_gen.rs"));
}

pub use generated::{
    register_server_parameters, register_startup_options, store_startup_options, Draw, DrawReply,
    Layer, Note, Point, Shape, ShapeKind, Style, CANVAS_PORT, MAX_SHAPES_PER_DRAW,
};

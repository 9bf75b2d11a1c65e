use std::env;
use std::path::PathBuf;

use bidl_compiler::{compile_file, write_generated, CompileOptions};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let input = PathBuf::from("idl/example.idl");

    let mut options = CompileOptions::new(input.clone(), "example_gen_decl.rs", "example_gen.rs");
    options.output_base_dir = Some(out_dir);
    options.import_dirs = vec![PathBuf::from("idl")];

    let code = compile_file(&input, &options).unwrap_or_else(|e| panic!("{}", e));
    write_generated(&code, &options).unwrap_or_else(|e| panic!("{}", e));

    println!("cargo:rerun-if-changed=idl");
}

#![cfg(test)]

use bidl::prelude::*;
use example_app::{
    register_server_parameters, register_startup_options, store_startup_options, Draw, Layer,
    Note, Point, Shape, ShapeKind, Style, CANVAS_PORT, MAX_SHAPES_PER_DRAW,
};

fn point(x: i32, y: i32) -> Point {
    Point::with_required(x, y)
}

fn triangle() -> Shape {
    Shape::with_required(
        "triangle".to_owned(),
        ShapeKind::Polygon,
        vec![point(0, 0), point(4, 0), point(0, 3)],
    )
}

fn array(values: &[(&str, &str)]) -> Bson {
    let mut items = Document::new();
    for (key, value) in values {
        items.append(*key, *value);
    }
    Bson::Array(items)
}

#[test]
fn structs_round_trip() {
    let shape = triangle();
    let encoded = shape.to_bson();
    let decoded = Shape::parse(&ParserContext::new("shape"), &encoded).expect("decode shape");
    assert!(decoded == shape);
    assert_eq!(decoded.sides(), 3);
    assert_eq!(decoded.points().len(), 3);

    let bytes = encoded.to_bytes();
    let again = Shape::from_bytes("shape", &bytes).expect("decode bytes");
    assert!(again == shape);
}

#[test]
fn enum_values_are_checked() {
    let mut encoded = Document::new();
    encoded.append("name", "square");
    encoded.append("kind", "square");
    encoded.append("points", Bson::Array(Document::new()));
    let err = Shape::parse(&ParserContext::new("shape"), &encoded).unwrap_err();
    assert!(matches!(err, IdlError::BadEnumValue { .. }), "{:?}", err);
}

#[test]
fn duplicate_fields_in_strict_structs() {
    for fields in [["x", "x", "y"], ["y", "x", "x"], ["x", "y", "x"]] {
        let mut encoded = Document::new();
        for (i, name) in fields.iter().enumerate() {
            encoded.append(*name, i as i32);
        }
        let err = Point::parse(&ParserContext::new("point"), &encoded).unwrap_err();
        assert_eq!(
            err,
            IdlError::DuplicateField {
                field: "point.x".to_owned()
            }
        );
    }
}

#[test]
fn duplicate_fields_in_lenient_structs() {
    let known = doc! { "author" => "ann", "author" => "bob" };
    assert_eq!(
        Note::parse(&ParserContext::new("note"), &known).unwrap_err(),
        IdlError::DuplicateField {
            field: "note.author".to_owned()
        }
    );

    let unknown = doc! { "extra" => 1, "author" => "ann", "extra" => 2 };
    assert_eq!(
        Note::parse(&ParserContext::new("note"), &unknown).unwrap_err(),
        IdlError::DuplicateField {
            field: "note.extra".to_owned()
        }
    );

    let single_unknown = doc! { "extra" => 1, "author" => "ann" };
    let note = Note::parse(&ParserContext::new("note"), &single_unknown).unwrap();
    assert_eq!(note.author(), "ann");
}

#[test]
fn unknown_fields_in_strict_structs() {
    let encoded = doc! { "x" => 1, "y" => 2, "z" => 3 };
    assert_eq!(
        Point::parse(&ParserContext::new("point"), &encoded).unwrap_err(),
        IdlError::UnknownField {
            field: "point.z".to_owned()
        }
    );
}

#[test]
fn missing_required_field_is_named() {
    let complete = triangle().to_bson();
    for missing in ["name", "kind", "points"] {
        let mut encoded = complete.clone();
        encoded.remove(missing);
        let err = Shape::parse(&ParserContext::new("shape"), &encoded).unwrap_err();
        assert_eq!(
            err,
            IdlError::MissingField {
                field: format!("shape.{}", missing)
            }
        );
    }
}

#[test]
fn defaults_fill_missing_fields() {
    let mut encoded = triangle().to_bson();
    encoded.remove("sides");
    let shape = Shape::parse(&ParserContext::new("shape"), &encoded).unwrap();
    assert_eq!(shape.sides(), 3);
}

#[test]
fn validators_run_on_parse_and_set() {
    let mut shape = triangle();
    assert!(matches!(shape.set_sides(2), Err(IdlError::Comparison { .. })));
    assert_eq!(shape.sides(), 3);
    shape.set_sides(4).unwrap();
    assert_eq!(shape.sides(), 4);

    let mut encoded = triangle().to_bson();
    encoded.remove("sides");
    encoded.append("sides", 1);
    let err = Shape::parse(&ParserContext::new("shape"), &encoded).unwrap_err();
    assert!(matches!(err, IdlError::Comparison { .. }), "{:?}", err);
}

#[test]
fn array_field_numbers_must_be_sequential() {
    let parse = |tags: Bson| {
        let mut encoded = doc! { "author" => "ann" };
        encoded.append("tags", tags);
        Note::parse(&ParserContext::new("note"), &encoded)
    };

    let note = parse(array(&[("0", "a"), ("1", "b"), ("2", "c")])).unwrap();
    assert_eq!(
        note.tags(),
        Some(&["a".to_owned(), "b".to_owned(), "c".to_owned()][..])
    );

    for bad in [
        array(&[("0", "a"), ("2", "b"), ("1", "c")]),
        array(&[("0", "a"), ("0", "b")]),
    ] {
        let err = parse(bad).unwrap_err();
        assert!(matches!(err, IdlError::BadArrayFieldNumberSequence { .. }), "{:?}", err);
    }

    let err = parse(array(&[("zero", "a")])).unwrap_err();
    assert!(matches!(err, IdlError::BadArrayFieldNumberValue { .. }), "{:?}", err);
}

#[test]
fn comparison_follows_comparison_order() {
    let a = point(1, 2);
    let b = point(1, 5);
    assert_eq!(a < b, 2 < 5);
    assert_eq!(b > a, !(b < a));
    assert!(b > a);
    assert!(a != b);

    // x is compared before y.
    assert!(point(0, 9) < point(1, 0));

    // label has no comparison order, so it is not compared.
    let mut labelled = point(1, 2);
    labelled.set_label(Some("origin".to_owned()));
    assert!(labelled == a);
    assert_eq!(labelled.partial_cmp(&a), Some(std::cmp::Ordering::Equal));
}

#[test]
fn commands_round_trip_through_op_msg() {
    let mut command = Draw::new(NamespaceString::new("canvas", "sketches"));
    command.set_shape(triangle());
    command.set_dry_run(Some(true));

    let body = command.to_bson(&doc! { "comment" => "hello", "unknown" => 1 });
    assert_eq!(body.first().map(|(name, _)| name), Some("draw"));
    assert!(body.contains_key("comment"));
    assert!(!body.contains_key("unknown"));
    assert!(!body.contains_key("$db"));

    let request = command.serialize_op_msg_request(&Document::new());
    assert_eq!(request.get_database(), Some("canvas"));

    let decoded = Draw::parse_op_msg_request(&ParserContext::new("draw"), &request).unwrap();
    assert_eq!(decoded.namespace(), &NamespaceString::new("canvas", "sketches"));
    assert!(decoded.shape() == &triangle());
    assert_eq!(decoded.dry_run(), Some(true));
}

#[test]
fn chained_struct_fields_sit_inline() {
    let mut style = Style::with_required("red".to_owned());
    style.set_font("mono".to_owned());
    let mut layer = Layer::with_required(2);
    layer.set_style_fields(style);

    let encoded = layer.to_bson();
    assert_eq!(encoded.keys().collect::<Vec<_>>(), vec!["color", "font", "depth"]);

    let decoded = Layer::parse(&ParserContext::new("layer"), &encoded).unwrap();
    assert_eq!(decoded.color(), "red");
    assert_eq!(decoded.font(), "mono");
    assert_eq!(decoded.depth(), 2);
    assert_eq!(decoded.style_fields().color(), "red");
}

#[test]
fn chained_struct_defaults_go_through_the_member() {
    let encoded = doc! { "color" => "blue", "depth" => 1 };
    let layer = Layer::parse(&ParserContext::new("layer"), &encoded).unwrap();
    assert_eq!(layer.font(), "sans");
    assert_eq!(layer.style_fields().font(), "sans");
}

#[test]
fn chained_struct_fields_are_checked_like_own_fields() {
    let duplicate = doc! { "color" => "a", "depth" => 1, "color" => "b" };
    assert_eq!(
        Layer::parse(&ParserContext::new("layer"), &duplicate).unwrap_err(),
        IdlError::DuplicateField {
            field: "layer.color".to_owned()
        }
    );

    let missing = doc! { "font" => "serif", "depth" => 1 };
    assert_eq!(
        Layer::parse(&ParserContext::new("layer"), &missing).unwrap_err(),
        IdlError::MissingField {
            field: "layer.color".to_owned()
        }
    );

    let unknown = doc! { "color" => "a", "depth" => 1, "opacity" => 0.5 };
    assert_eq!(
        Layer::parse(&ParserContext::new("layer"), &unknown).unwrap_err(),
        IdlError::UnknownField {
            field: "layer.opacity".to_owned()
        }
    );
}

#[test]
fn server_parameters_register_with_bounds_and_aliases() {
    let mut registry = ServerParameterRegistry::new();
    register_server_parameters(&mut registry).unwrap();
    assert_eq!(MAX_SHAPES_PER_DRAW.get(), 16);
    assert_eq!(
        registry.get("shapeLimit").map(|param| param.set_at()),
        Some(ServerParameterType::StartupAndRuntime)
    );

    let err = registry.set_from_string("maxShapesPerDraw", "0").unwrap_err();
    assert!(matches!(err, IdlError::Comparison { ref op, .. } if op == ">"), "{:?}", err);
    assert_eq!(MAX_SHAPES_PER_DRAW.get(), 16);

    registry.set_from_string("shapeLimit", "10").unwrap();
    assert_eq!(MAX_SHAPES_PER_DRAW.get(), 10);

    let mut current = Document::new();
    registry.append_all(&mut current);
    assert_eq!(current.get("maxShapesPerDraw"), Some(&Bson::Int32(10)));
    assert!(!current.contains_key("shapeLimit"));
}

#[test]
fn startup_options_apply_defaults_and_ranges() {
    let mut options = OptionSection::new("Canvas options");
    register_startup_options(&mut options).unwrap();
    assert!(options.find("canvas.port").is_some());

    let mut env = Environment::new();
    env.validate(&options).unwrap();
    assert_eq!(env.get("canvas.port"), Some(&Bson::Int32(27017)));
    store_startup_options(&env).unwrap();
    assert_eq!(CANVAS_PORT.get(), 27017);

    for bad in [0, 70000] {
        let mut env = Environment::new();
        env.set("canvas.port", bad);
        let err = env.validate(&options).unwrap_err();
        assert!(matches!(err, IdlError::Comparison { .. }), "{:?}", err);
    }

    let mut env = Environment::new();
    env.set("canvas.port", 0);
    let err = env.validate(&options).unwrap_err();
    assert!(matches!(err, IdlError::Comparison { ref op, .. } if op == ">="), "{:?}", err);
}

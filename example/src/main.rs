// example/src/main.rs

use bidl::prelude::*;
use example_app::{Draw, DrawReply, Point, Shape, ShapeKind};

fn main() -> Result<(), IdlError> {
    // Build a triangle through the generated setters.
    let mut shape = Shape::new();
    shape.set_name("triangle".to_owned());
    shape.set_kind(ShapeKind::Polygon);
    let corners = [(0, 0), (4, 0), (0, 3)];
    shape.set_points(corners.iter().map(|&(x, y)| Point::with_required(x, y)).collect());
    shape.set_sides(3)?;

    let mut command = Draw::new(NamespaceString::new("canvas", "sketches"));
    command.set_shape(shape);
    command.set_dry_run(Some(true));

    let body = command.to_bson(&Document::new());
    println!("draw command: {:?}", body);

    // The server side: split the request and decode it again.
    let request = command.serialize_op_msg_request(&Document::new());
    let decoded = Draw::parse_op_msg_request(&ParserContext::new("draw"), &request)?;
    println!("namespace    = {}", decoded.namespace());
    println!("shape        = {}", decoded.shape().name());
    println!("points.len() = {}", decoded.shape().points().len());

    let reply = DrawReply::parse(
        &ParserContext::new("draw_reply"),
        &doc! { "ok" => 1.0, "drawn" => 1 },
    )?;
    println!("reply ok={} drawn={}", reply.ok(), reply.drawn());

    // Unknown field in a strict struct.
    let bad = doc! { "x" => 1, "y" => 2, "z" => 3 };
    match Point::parse(&ParserContext::new("point"), &bad) {
        Ok(_) => println!("unexpectedly accepted {:?}", bad),
        Err(e) => println!("rejected: {}", e),
    }
    Ok(())
}

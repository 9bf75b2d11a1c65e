use bidl_bson::Document;

/// Fields every command accepts regardless of its own definition.
pub const GENERIC_ARGUMENTS: &[&str] = &[
    "$audit",
    "$client",
    "$clusterTime",
    "$configServerState",
    "$db",
    "$queryOptions",
    "$readPreference",
    "$replData",
    "allowImplicitCollectionCreation",
    "apiDeprecationErrors",
    "apiStrict",
    "apiVersion",
    "autocommit",
    "comment",
    "coordinator",
    "databaseVersion",
    "lsid",
    "maxTimeMS",
    "readConcern",
    "shardVersion",
    "startTransaction",
    "stmtId",
    "txnNumber",
    "writeConcern",
];

pub fn is_generic_argument(name: &str) -> bool {
    GENERIC_ARGUMENTS.contains(&name)
}

/// Copies generic arguments from `passthrough` into `builder`, skipping any
/// the command already serialized itself.
pub fn append_generic_command_arguments(
    passthrough: &Document,
    known_fields: &[&str],
    builder: &mut Document,
) {
    for (name, value) in passthrough.iter() {
        if is_generic_argument(name) && !known_fields.contains(&name) {
            builder.append(name, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidl_bson::doc;

    #[test]
    fn passthrough_skips_known_and_non_generic_fields() {
        let passthrough = doc! {
            "maxTimeMS" => 100,
            "$db" => "admin",
            "filter" => doc! {},
            "comment" => "hi",
        };
        let mut builder = doc! { "find" => "coll" };
        append_generic_command_arguments(&passthrough, &["find", "$db"], &mut builder);

        assert_eq!(
            builder.keys().collect::<Vec<_>>(),
            vec!["find", "maxTimeMS", "comment"]
        );
    }
}

use bidl_bson::Document;

/// A bulk list of documents sent beside a command body instead of inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSequence {
    pub name: String,
    pub objs: Vec<Document>,
}

/// A command as it travels in an OP_MSG: a body plus document sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpMsgRequest {
    pub body:      Document,
    pub sequences: Vec<DocumentSequence>,
}

impl OpMsgRequest {
    pub fn new(body: Document) -> OpMsgRequest {
        OpMsgRequest {
            body,
            sequences: Vec::new(),
        }
    }

    /// The `$db` field of the body, if present.
    pub fn get_database(&self) -> Option<&str> {
        self.body.get("$db").map(|db| db.as_str())
    }

    pub fn get_sequence(&self, name: &str) -> Option<&DocumentSequence> {
        self.sequences.iter().find(|sequence| sequence.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidl_bson::doc;

    #[test]
    fn request_accessors() {
        let mut request = OpMsgRequest::new(doc! { "insert" => "coll", "$db" => "test" });
        request.sequences.push(DocumentSequence {
            name: "documents".to_owned(),
            objs: vec![doc! { "_id" => 1 }],
        });

        assert_eq!(request.get_database(), Some("test"));
        assert_eq!(request.get_sequence("documents").map(|s| s.objs.len()), Some(1));
        assert!(request.get_sequence("updates").is_none());
    }
}

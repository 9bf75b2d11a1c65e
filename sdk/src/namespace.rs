use std::fmt;

use crate::error::IdlError;

/// A `db.collection` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespaceString {
    db:   String,
    coll: String,
}

impl NamespaceString {
    pub fn new(db: &str, coll: &str) -> NamespaceString {
        NamespaceString {
            db:   db.to_owned(),
            coll: coll.to_owned(),
        }
    }

    /// Splits `db.collection` at the first dot. Used as the deserializer of
    /// the built-in `namespacestring` type.
    pub fn parse(ns: &str) -> Result<NamespaceString, IdlError> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() => Ok(NamespaceString::new(db, coll)),
            None if !ns.is_empty() => Ok(NamespaceString::new(ns, "")),
            _ => Err(IdlError::InvalidNamespace(ns.to_owned())),
        }
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn coll(&self) -> &str {
        &self.coll
    }

    pub fn ns(&self) -> String {
        if self.coll.is_empty() {
            self.db.clone()
        } else {
            format!("{}.{}", self.db, self.coll)
        }
    }
}

impl fmt::Display for NamespaceString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.ns())
    }
}

/// The target of a `concatenate_with_db_or_uuid` command.
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceStringOrUuid {
    Nss(NamespaceString),
    Uuid {
        db:   String,
        uuid: Vec<u8>,
    },
}

impl NamespaceStringOrUuid {
    pub fn db(&self) -> &str {
        match self {
            NamespaceStringOrUuid::Nss(nss) => nss.db(),
            NamespaceStringOrUuid::Uuid { db, .. } => db,
        }
    }
}

impl Default for NamespaceStringOrUuid {
    fn default() -> NamespaceStringOrUuid {
        NamespaceStringOrUuid::Nss(NamespaceString::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_namespace() {
        let nss = NamespaceString::parse("test.system.views").unwrap();
        assert_eq!(nss.db(), "test");
        assert_eq!(nss.coll(), "system.views");
        assert_eq!(nss.to_string(), "test.system.views");

        assert_eq!(NamespaceString::parse("admin").unwrap().ns(), "admin");
        assert!(NamespaceString::parse("").is_err());
        assert!(NamespaceString::parse(".coll").is_err());
    }
}

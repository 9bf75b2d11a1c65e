use bidl_bson::Document;
use std::cmp::Ordering;

/// Comparison for embedded documents, which have no natural ordering of
/// their own. Documents compare by their encoded bytes.
///
/// Optional values follow the usual rule: two empty values are equal, an
/// empty value sorts before a present one, and two present values compare
/// by content.
pub trait StructuralCompare {
    fn structural_cmp(&self, other: &Self) -> Ordering;

    fn structural_eq(&self, other: &Self) -> bool {
        self.structural_cmp(other) == Ordering::Equal
    }
}

impl StructuralCompare for Document {
    fn structural_cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }

    fn structural_eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl<T: StructuralCompare> StructuralCompare for Option<T> {
    fn structural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => left.structural_cmp(right),
        }
    }

    fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(left), Some(right)) => left.structural_eq(right),
            _ => false,
        }
    }
}

impl<T: StructuralCompare> StructuralCompare for Vec<T> {
    fn structural_cmp(&self, other: &Self) -> Ordering {
        for (left, right) in self.iter().zip(other.iter()) {
            match left.structural_cmp(right) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        self.len().cmp(&other.len())
    }

    fn structural_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(left, right)| left.structural_eq(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidl_bson::doc;

    #[test]
    fn documents_compare_by_bytes() {
        let a = doc! { "x" => 1 };
        let b = doc! { "x" => 2 };
        assert!(a.structural_eq(&a.clone()));
        assert!(!a.structural_eq(&b));
        assert_eq!(a.structural_cmp(&b), Ordering::Less);
        assert_eq!(b.structural_cmp(&a), Ordering::Greater);
    }

    #[test]
    fn optional_documents() {
        let none: Option<Document> = None;
        let some = Some(doc! { "x" => 1 });
        let bigger = Some(doc! { "x" => 2 });

        assert!(none.structural_eq(&None));
        assert!(!none.structural_eq(&some));
        assert!(some.structural_eq(&some.clone()));

        assert_eq!(none.structural_cmp(&some), Ordering::Less);
        assert_eq!(some.structural_cmp(&none), Ordering::Greater);
        assert_eq!(none.structural_cmp(&None), Ordering::Equal);
        assert_eq!(some.structural_cmp(&bigger), Ordering::Less);
    }

    #[test]
    fn document_lists() {
        let short = vec![doc! { "x" => 1 }];
        let long = vec![doc! { "x" => 1 }, doc! {}];
        assert_eq!(short.structural_cmp(&long), Ordering::Less);
        assert!(!short.structural_eq(&long));
        assert!(long.structural_eq(&long.clone()));
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(n: u64) -> Self {
                $name(n)
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Backend primary key of a building.
    BuildingId
);
numeric_id!(
    /// Backend primary key of a building complex.
    ComplexId
);
numeric_id!(
    /// Backend primary key of an organizational unit.
    UnitId
);
numeric_id!(
    /// Groups floors that are the same physical level across adjoining
    /// structures.
    FloorLayerId
);
numeric_id!(PoiId);
numeric_id!(MarkerId);

#[cfg(test)]
mod tests {
    use super::{ComplexId, FloorLayerId};

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(ComplexId::new(42).to_string(), "42");
        assert_eq!(FloorLayerId(7).get(), 7);
    }

    #[test]
    fn ids_order_numerically() {
        let mut ids = vec![ComplexId(3), ComplexId(1), ComplexId(2)];
        ids.sort();
        assert_eq!(ids, vec![ComplexId(1), ComplexId(2), ComplexId(3)]);
    }
}

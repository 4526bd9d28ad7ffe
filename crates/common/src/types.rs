use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an order document.
///
/// Wraps a UUID so order ids cannot be mixed up with the string ids used
/// for catalog items and actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random order ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an order ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an order ID from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OrderId> for Uuid {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

/// Defines a string-backed identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identity of a buyer, nursery worker, supplier or admin, as issued by the
    /// external identity provider.
    ActorId
);

string_id!(
    /// Identifier of a catalog item (plant or material listing).
    ItemId
);

string_id!(
    /// Identifier of a cart line.
    LineId
);

impl LineId {
    /// Returns the line id for an owner's reservation of a catalog item.
    ///
    /// A cart holds at most one line per item, so the id is derived from the
    /// pair instead of being random.
    pub fn for_owner_item(owner: &ActorId, item: &ItemId) -> Self {
        Self(format!("{}__{}", owner.as_str(), item.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_new_creates_unique_ids() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn order_id_parse_roundtrips_display() {
        let id = OrderId::new();
        let parsed = OrderId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(OrderId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let id = ItemId::new("p1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"p1\"");
    }

    #[test]
    fn line_id_is_stable_for_owner_and_item() {
        let owner = ActorId::new("buyer-a");
        let item = ItemId::new("p1");
        assert_eq!(
            LineId::for_owner_item(&owner, &item),
            LineId::for_owner_item(&owner, &item)
        );
        assert_ne!(
            LineId::for_owner_item(&owner, &item),
            LineId::for_owner_item(&ActorId::new("buyer-b"), &item)
        );
    }
}

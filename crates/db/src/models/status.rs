//! Status helper enums mapping to SMALLSERIAL lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The seeded `name` column for this status.
            pub fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Queue entry status. `Locking` only exists inside the pairing transaction.
    QueueEntryStatus {
        Waiting = 1 => "waiting",
        Locking = 2 => "locking",
        Error = 3 => "error",
    }
}

define_status_enum! {
    /// Room lifecycle status. Rooms are deleted on ending, so `Ended` is
    /// never persisted for long.
    RoomStatus {
        Pending = 1 => "pending",
        Active = 2 => "active",
        Ended = 3 => "ended",
    }
}

define_status_enum! {
    /// Timed voice-session status.
    CallSessionStatus {
        Active = 1 => "active",
        Ended = 2 => "ended",
    }
}

define_status_enum! {
    /// Participant pairing phase.
    MatchPhase {
        Idle = 1 => "idle",
        Matched = 2 => "matched",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        assert_eq!(RoomStatus::from_id(RoomStatus::Active.id()), Some(RoomStatus::Active));
        assert_eq!(QueueEntryStatus::from_id(3), Some(QueueEntryStatus::Error));
        assert_eq!(MatchPhase::from_id(9), None);
    }

    #[test]
    fn labels_match_seed_names() {
        assert_eq!(CallSessionStatus::Ended.label(), "ended");
        assert_eq!(MatchPhase::Matched.label(), "matched");
    }
}

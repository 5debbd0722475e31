use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates `as_str`, `FromStr` and `Display` for a string-backed enum.
/// Column values in Postgres are the same snake_case tokens serde uses.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub const ALL: &'static [$name] = &[$(Self::$variant),+];
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} value: {other}", stringify!($name))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(Role {
    Salesperson => "salesperson",
    Manager => "manager",
    Admin => "admin",
});

text_enum!(ClientKind {
    B2b => "b2b",
    B2c => "b2c",
});

text_enum!(ClientStatus {
    Provisional => "provisional",
    Active => "active",
    Inactive => "inactive",
});

text_enum!(LeadStatus {
    New => "new",
    InContact => "in_contact",
    Awaiting => "awaiting",
    Converted => "converted",
    Lost => "lost",
});

text_enum!(LeadChannel {
    Call => "call",
    Whatsapp => "whatsapp",
    InPerson => "in_person",
    Email => "email",
});

text_enum!(ContactOutcome {
    NoAnswer => "no_answer",
    NotInterested => "not_interested",
    RequestedCallback => "requested_callback",
    Interested => "interested",
    ClosedDeal => "closed_deal",
});

text_enum!(FollowUpStatus {
    Pending => "pending",
    Done => "done",
    Cancelled => "cancelled",
});

text_enum!(InteractionChannel {
    Call => "call",
    Email => "email",
    Meeting => "meeting",
    Whatsapp => "whatsapp",
    Visit => "visit",
});

text_enum!(Stage {
    Prospecting => "prospecting",
    Qualification => "qualification",
    Proposal => "proposal",
    Negotiation => "negotiation",
    Closed => "closed",
    Lost => "lost",
});

impl LeadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Lost)
    }
}

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The server uses the empty string, not null, for "no id".
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

id_type! {
    /// Server-issued team identifier.
    TeamId
}

id_type! {
    /// Server-issued channel identifier.
    ChannelId
}

id_type! {
    /// Server-issued user identifier.
    UserId
}

id_type! {
    /// Server-issued post identifier.
    PostId
}

id_type! {
    /// Server-issued file identifier.
    FileId
}

/// Channel kind, decoded from the one-letter wire `type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Public,
    Private,
    Direct,
    Group,
    Unknown,
}

impl ChannelKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "O" => Self::Public,
            "P" => Self::Private,
            "D" => Self::Direct,
            "G" => Self::Group,
            _ => Self::Unknown,
        }
    }

    /// Direct and group conversations live outside any team, under the
    /// virtual "direct messages" pseudo-team.
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct | Self::Group)
    }
}

impl Default for ChannelKind {
    fn default() -> Self {
        Self::Unknown
    }
}

//! OAuth authorization scopes.
//!
//! Every well-known Spotify scope has its own variant. Any other scope string is kept as-is in [Scope::Other] and
//! passed through to Spotify verbatim.

use std::fmt::Display;

pub(crate) trait ToScopesString {
    fn to_scopes_string(self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    UgcImageUpload,
    UserModifyPlaybackState,
    UserReadPlaybackState,
    UserReadCurrentlyPlaying,
    UserFollowModify,
    UserFollowRead,
    UserReadRecentlyPlayed,
    UserReadPlaybackPosition,
    UserTopRead,
    PlaylistReadCollaborative,
    PlaylistModifyPublic,
    PlaylistReadPrivate,
    PlaylistModifyPrivate,
    AppRemoteControl,
    Streaming,
    UserReadEmail,
    UserReadPrivate,
    UserLibraryModify,
    UserLibraryRead,

    Other(String),
}

impl Scope {
    pub fn as_str(&self) -> &str {
        match self {
            Scope::UgcImageUpload => "ugc-image-upload",
            Scope::UserModifyPlaybackState => "user-modify-playback-state",
            Scope::UserReadPlaybackState => "user-read-playback-state",
            Scope::UserReadCurrentlyPlaying => "user-read-currently-playing",
            Scope::UserFollowModify => "user-follow-modify",
            Scope::UserFollowRead => "user-follow-read",
            Scope::UserReadRecentlyPlayed => "user-read-recently-played",
            Scope::UserReadPlaybackPosition => "user-read-playback-position",
            Scope::UserTopRead => "user-top-read",
            Scope::PlaylistReadCollaborative => "playlist-read-collaborative",
            Scope::PlaylistModifyPublic => "playlist-modify-public",
            Scope::PlaylistReadPrivate => "playlist-read-private",
            Scope::PlaylistModifyPrivate => "playlist-modify-private",
            Scope::AppRemoteControl => "app-remote-control",
            Scope::Streaming => "streaming",
            Scope::UserReadEmail => "user-read-email",
            Scope::UserReadPrivate => "user-read-private",
            Scope::UserLibraryModify => "user-library-modify",
            Scope::UserLibraryRead => "user-library-read",
            Scope::Other(other) => other,
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        match value {
            "ugc-image-upload" => Scope::UgcImageUpload,
            "user-modify-playback-state" => Scope::UserModifyPlaybackState,
            "user-read-playback-state" => Scope::UserReadPlaybackState,
            "user-read-currently-playing" => Scope::UserReadCurrentlyPlaying,
            "user-follow-modify" => Scope::UserFollowModify,
            "user-follow-read" => Scope::UserFollowRead,
            "user-read-recently-played" => Scope::UserReadRecentlyPlayed,
            "user-read-playback-position" => Scope::UserReadPlaybackPosition,
            "user-top-read" => Scope::UserTopRead,
            "playlist-read-collaborative" => Scope::PlaylistReadCollaborative,
            "playlist-modify-public" => Scope::PlaylistModifyPublic,
            "playlist-read-private" => Scope::PlaylistReadPrivate,
            "playlist-modify-private" => Scope::PlaylistModifyPrivate,
            "app-remote-control" => Scope::AppRemoteControl,
            "streaming" => Scope::Streaming,
            "user-read-email" => Scope::UserReadEmail,
            "user-read-private" => Scope::UserReadPrivate,
            "user-library-modify" => Scope::UserLibraryModify,
            "user-library-read" => Scope::UserLibraryRead,

            other => Scope::Other(other.to_owned()),
        }
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        Scope::from(value.as_str())
    }
}

impl<'a, I> ToScopesString for I
where
    I: IntoIterator<Item = &'a Scope>,
{
    fn to_scopes_string(self) -> String {
        self.into_iter().map(Scope::as_str).collect::<Vec<&str>>().join(" ")
    }
}

/// A single control line from the external controller, decoded once at the
/// boundary so nothing downstream re-parses strings.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedCommand {
    LoadUrl(String),
    SetProgress(f32),
    SetSpeed(String),
    SetTorrentName(String),
    SetPeerCount(String),
    SetRoomLink(String),
    AddSelfPeer(String),
    AddPeer(String),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Url,
    TorrentProgress,
    DownloadSpeed,
    TorrentName,
    TorrentPeers,
    RoomLink,
    PeerMe,
    NewPeer,
}

// First match wins, so order matters if a prefix ever shadows another.
const PREFIXES: [(&str, Prefix); 8] = [
    ("url:", Prefix::Url),
    ("torrent_progress:", Prefix::TorrentProgress),
    ("download_speed:", Prefix::DownloadSpeed),
    ("torrent_name:", Prefix::TorrentName),
    ("torrent_peers:", Prefix::TorrentPeers),
    ("room_link:", Prefix::RoomLink),
    ("peer_me:", Prefix::PeerMe),
    ("new_peer:", Prefix::NewPeer),
];

/// Decodes one protocol line (without its trailing newline).
///
/// Total and side-effect free: every input yields exactly one command, and
/// lines that match no known prefix decode to [`DecodedCommand::Unknown`].
pub fn decode_line(line: &str) -> DecodedCommand {
    for (text, prefix) in PREFIXES {
        if let Some(payload) = line.strip_prefix(text) {
            return decode_payload(prefix, payload);
        }
    }
    DecodedCommand::Unknown
}

fn decode_payload(prefix: Prefix, payload: &str) -> DecodedCommand {
    let payload_owned = || payload.to_string();
    match prefix {
        Prefix::Url => DecodedCommand::LoadUrl(payload_owned()),
        Prefix::TorrentProgress => DecodedCommand::SetProgress(parse_float_lenient(payload)),
        Prefix::DownloadSpeed => DecodedCommand::SetSpeed(payload_owned()),
        Prefix::TorrentName => DecodedCommand::SetTorrentName(payload_owned()),
        Prefix::TorrentPeers => DecodedCommand::SetPeerCount(payload_owned()),
        Prefix::RoomLink => DecodedCommand::SetRoomLink(payload_owned()),
        Prefix::PeerMe => DecodedCommand::AddSelfPeer(payload_owned()),
        Prefix::NewPeer => DecodedCommand::AddPeer(payload_owned()),
    }
}

/// Parses the longest leading float in `text`, `strtof`-style.
///
/// Leading whitespace is skipped and trailing garbage is ignored
/// (`"0.5abc"` gives `0.5`). Anything without a numeric prefix gives `0.0`.
pub fn parse_float_lenient(text: &str) -> f32 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    // Exponent only counts when it has at least one digit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    trimmed[..end].parse::<f32>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_every_known_prefix() {
        assert_eq!(decode_line("url:http://host/a.mkv"), DecodedCommand::LoadUrl("http://host/a.mkv".into()));
        assert_eq!(decode_line("torrent_progress:0.5"), DecodedCommand::SetProgress(0.5));
        assert_eq!(decode_line("download_speed:2.4"), DecodedCommand::SetSpeed("2.4".into()));
        assert_eq!(decode_line("torrent_name:Big Buck Bunny"), DecodedCommand::SetTorrentName("Big Buck Bunny".into()));
        assert_eq!(decode_line("torrent_peers:7"), DecodedCommand::SetPeerCount("7".into()));
        assert_eq!(decode_line("room_link:syncwatch://room-42"), DecodedCommand::SetRoomLink("syncwatch://room-42".into()));
        assert_eq!(decode_line("peer_me:alice"), DecodedCommand::AddSelfPeer("alice".into()));
        assert_eq!(decode_line("new_peer:bob"), DecodedCommand::AddPeer("bob".into()));
    }

    #[test]
    fn test_unknown_lines() {
        assert_eq!(decode_line(""), DecodedCommand::Unknown);
        assert_eq!(decode_line("hello"), DecodedCommand::Unknown);
        assert_eq!(decode_line("URL:http://x"), DecodedCommand::Unknown);
        assert_eq!(decode_line(" url:http://x"), DecodedCommand::Unknown);
        assert_eq!(decode_line("source:magnet:?xt=abc"), DecodedCommand::Unknown);
    }

    #[test]
    fn test_payload_is_verbatim() {
        // Colons inside the payload belong to it, whitespace is kept.
        assert_eq!(
            decode_line("url:magnet:?xt=urn:btih:abc&dn=a b"),
            DecodedCommand::LoadUrl("magnet:?xt=urn:btih:abc&dn=a b".into())
        );
        assert_eq!(decode_line("torrent_name:  padded  "), DecodedCommand::SetTorrentName("  padded  ".into()));
        assert_eq!(decode_line("new_peer:"), DecodedCommand::AddPeer(String::new()));
    }

    #[test]
    fn test_progress_parse_failures_default_to_zero() {
        assert_eq!(decode_line("torrent_progress:0.37"), DecodedCommand::SetProgress(0.37));
        assert_eq!(decode_line("torrent_progress:notanumber"), DecodedCommand::SetProgress(0.0));
        assert_eq!(decode_line("torrent_progress:"), DecodedCommand::SetProgress(0.0));
    }

    #[test]
    fn test_parse_float_lenient() {
        assert_eq!(parse_float_lenient("1"), 1.0);
        assert_eq!(parse_float_lenient("  0.25"), 0.25);
        assert_eq!(parse_float_lenient("0.5abc"), 0.5);
        assert_eq!(parse_float_lenient(".5"), 0.5);
        assert_eq!(parse_float_lenient("5."), 5.0);
        assert_eq!(parse_float_lenient("-0.5"), -0.5);
        assert_eq!(parse_float_lenient("1e-1x"), 0.1);
        assert_eq!(parse_float_lenient("2e"), 2.0);
        assert_eq!(parse_float_lenient("."), 0.0);
        assert_eq!(parse_float_lenient("-"), 0.0);
        assert_eq!(parse_float_lenient("nan"), 0.0);
        assert_eq!(parse_float_lenient("abc"), 0.0);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let line = "download_speed:1.2";
        assert_eq!(decode_line(line), decode_line(line));
    }
}

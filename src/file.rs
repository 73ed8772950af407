/*! The `FILE` command's domain value.

A `File` is parsed positionally out of a `220` response row: always
`FileID` first, then every [`crate::mask::FileFmask`] field set in the
request (in wire order), then every [`crate::mask::FileAmask`] field
set (same order). The core always issues the same two masks (see
[`crate::mask::FileFmask::default_request`]), so a `File` always has
exactly 26 fields.
*/
use crate::Error;
use crate::mask::{FieldKind, FieldSpec, FileAmask, FileFmask};

/// A resolved file record, as returned by the `FILE` command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct File {
    /// The server's numeric identifier for this specific file.
    pub file_id: u32,
    /// Anime identifier.
    pub aid: u32,
    /// Episode identifier.
    pub eid: u32,
    /// Release group identifier.
    pub gid: u32,
    /// Bitfield of file state flags (e.g. CRC-verified, censored).
    pub state: u16,
    /// File size in bytes.
    pub size: u64,
    /// ed2k hash, as hex text.
    pub ed2k: String,
    /// MD5 hash, as hex text.
    pub md5: String,
    /// SHA1 hash, as hex text.
    pub sha1: String,
    /// CRC32, as hex text.
    pub crc: String,
    /// Rip/encode quality label (e.g. "high").
    pub quality: String,
    /// Source media label (e.g. "DVD").
    pub source: String,
    /// Audio codec label.
    pub audio_codec: String,
    /// Audio bitrate in kbps.
    pub audio_bitrate: u32,
    /// Video codec label.
    pub video_codec: String,
    /// Video bitrate in kbps.
    pub video_bitrate: u32,
    /// Video resolution (e.g. "1920x1080").
    pub video_res: String,
    /// File extension, without the leading dot.
    pub extension: String,
    /// Anime release year, as text (may be a range, e.g. "2004-2005").
    pub year: String,
    /// Anime type label (e.g. "TV Series").
    pub anime_type: String,
    /// Anime name, romaji transliteration.
    pub romaji_name: String,
    /// Anime name, English.
    pub english_name: String,
    /// Episode number, as text (episodes may be "S1", "C1", ...).
    pub episode_number: String,
    /// Episode name, English.
    pub episode_name: String,
    /// Episode name, romaji transliteration.
    pub episode_name_romaji: String,
    /// Release group name.
    pub group_name: String,
}

impl File {
    /// Parse a `220` response's single row into a [`File`], given the
    /// fmask/amask the request was made with.
    ///
    /// Fails with [`Error::Protocol`]-shaped context (via a descriptive
    /// message) if the row doesn't have exactly as many fields as
    /// `1 + fmask.selected().count() + amask.selected().count()`, or
    /// if a numeric field doesn't parse.
    pub fn from_row(row: &[String], fmask: FileFmask, amask: FileAmask) -> Result<Self, Error> {
        let want = 1 + fmask.selected().count() + amask.selected().count();
        if row.len() != want {
            return Err(Error::Protocol {
                code: 220,
                header: format!("FILE row has {} fields, expected {want}", row.len()),
            });
        }

        let mut fields = row.iter();
        let mut file = File {
            file_id: parse_width("FileID", fields.next().unwrap())?,
            ..Default::default()
        };

        for spec in fmask.selected() {
            assign(&mut file, spec, fields.next().unwrap())?;
        }
        for spec in amask.selected() {
            assign(&mut file, spec, fields.next().unwrap())?;
        }
        Ok(file)
    }
}

enum Parsed {
    Int2(u16),
    Int4(u32),
    Int8(u64),
    Str(String),
}

fn parse_field(name: &str, raw: &str, kind: FieldKind) -> Result<Parsed, Error> {
    match kind {
        FieldKind::Str => Ok(Parsed::Str(raw.to_string())),
        FieldKind::Int2 => Ok(Parsed::Int2(parse_width(name, raw)?)),
        FieldKind::Int4 => Ok(Parsed::Int4(parse_width(name, raw)?)),
        FieldKind::Int8 => Ok(Parsed::Int8(parse_width(name, raw)?)),
    }
}

/// Parse `raw` as a base-10 integer of exactly `T`'s width; any digit
/// string that doesn't fit is a protocol error, not a silent truncation.
fn parse_width<T>(name: &str, raw: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| Error::Protocol {
        code: 220,
        header: format!("field {name} ({raw:?}) is not a valid integer: {e}"),
    })
}

fn assign(file: &mut File, spec: &FieldSpec, raw: &str) -> Result<(), Error> {
    let parsed = parse_field(spec.name, raw, spec.kind)?;
    match (spec.name, parsed) {
        ("aid", Parsed::Int4(n)) => file.aid = n,
        ("eid", Parsed::Int4(n)) => file.eid = n,
        ("gid", Parsed::Int4(n)) => file.gid = n,
        ("state", Parsed::Int2(n)) => file.state = n,
        ("size", Parsed::Int8(n)) => file.size = n,
        ("ed2k", Parsed::Str(s)) => file.ed2k = s,
        ("md5", Parsed::Str(s)) => file.md5 = s,
        ("sha1", Parsed::Str(s)) => file.sha1 = s,
        ("crc", Parsed::Str(s)) => file.crc = s,
        ("quality", Parsed::Str(s)) => file.quality = s,
        ("source", Parsed::Str(s)) => file.source = s,
        ("audio_codec", Parsed::Str(s)) => file.audio_codec = s,
        ("audio_bitrate", Parsed::Int4(n)) => file.audio_bitrate = n,
        ("video_codec", Parsed::Str(s)) => file.video_codec = s,
        ("video_bitrate", Parsed::Int4(n)) => file.video_bitrate = n,
        ("video_res", Parsed::Str(s)) => file.video_res = s,
        ("extension", Parsed::Str(s)) => file.extension = s,
        ("year", Parsed::Str(s)) => file.year = s,
        ("anime_type", Parsed::Str(s)) => file.anime_type = s,
        ("romaji_name", Parsed::Str(s)) => file.romaji_name = s,
        ("english_name", Parsed::Str(s)) => file.english_name = s,
        ("episode_number", Parsed::Str(s)) => file.episode_number = s,
        ("episode_name", Parsed::Str(s)) => file.episode_name = s,
        ("episode_name_romaji", Parsed::Str(s)) => file.episode_name_romaji = s,
        ("group_name", Parsed::Str(s)) => file.group_name = s,
        (name, _) => unreachable!("unhandled FILE field {name}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_a_full_default_row() {
        let row = row(&[
            "9001", "12", "34", "56", "1", "123456", "abcdef0123456789abcdef0123456789",
            "d41d8cd98f00b204e9800998ecf8427e", "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            "00000000", "high", "DVD", "FLAC", "1411", "h264", "2000", "1920x1080", "mkv",
            "2004", "TV Series", "Some Anime", "Some Anime English", "1", "Pilot", "Pairotto",
            "Group",
        ]);
        let f = File::from_row(&row, FileFmask::default_request(), FileAmask::default_request())
            .unwrap();
        assert_eq!(f.file_id, 9001);
        assert_eq!(f.aid, 12);
        assert_eq!(f.eid, 34);
        assert_eq!(f.gid, 56);
        assert_eq!(f.state, 1);
        assert_eq!(f.size, 123456);
        assert_eq!(f.ed2k, "abcdef0123456789abcdef0123456789");
        assert_eq!(f.audio_bitrate, 1411);
        assert_eq!(f.video_bitrate, 2000);
        assert_eq!(f.year, "2004");
        assert_eq!(f.group_name, "Group");
    }

    #[test]
    fn wrong_field_count_is_an_error() {
        let row = row(&["9001", "12"]);
        let err = File::from_row(&row, FileFmask::default_request(), FileAmask::default_request())
            .unwrap_err();
        match err {
            Error::Protocol { code, header } => {
                assert_eq!(code, 220);
                assert!(header.contains("2 fields"), "{header}");
            }
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_int_field_is_an_error() {
        let mut fields = vec!["9001".to_string()];
        fields.extend(std::iter::repeat("x".to_string()).take(25));
        let err = File::from_row(
            &fields,
            FileFmask::default_request(),
            FileAmask::default_request(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Protocol { code: 220, .. }));
    }

    #[test]
    fn int2_field_that_overflows_u16_is_an_error() {
        // `state` is the fourth fmask field (after aid/eid/gid), an int2.
        let fields = row(&[
            "9001", "12", "34", "56", "4294967296", "123456",
            "abcdef0123456789abcdef0123456789", "d41d8cd98f00b204e9800998ecf8427e",
            "da39a3ee5e6b4b0d3255bfef95601890afd80709", "00000000", "high", "DVD", "FLAC",
            "1411", "h264", "2000", "1920x1080", "mkv", "2004", "TV Series", "Some Anime",
            "Some Anime English", "1", "Pilot", "Pairotto", "Group",
        ]);
        let err = File::from_row(&fields, FileFmask::default_request(), FileAmask::default_request())
            .unwrap_err();
        match err {
            Error::Protocol { code, header } => {
                assert_eq!(code, 220);
                assert!(header.contains("state"), "{header}");
            }
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn int4_field_that_overflows_u32_is_an_error() {
        let row = row(&[
            "9001", "4294967296", "34", "56", "1", "123456",
            "abcdef0123456789abcdef0123456789", "d41d8cd98f00b204e9800998ecf8427e",
            "da39a3ee5e6b4b0d3255bfef95601890afd80709", "00000000", "high", "DVD", "FLAC",
            "1411", "h264", "2000", "1920x1080", "mkv", "2004", "TV Series", "Some Anime",
            "Some Anime English", "1", "Pilot", "Pairotto", "Group",
        ]);
        let err = File::from_row(&row, FileFmask::default_request(), FileAmask::default_request())
            .unwrap_err();
        match err {
            Error::Protocol { code, header } => {
                assert_eq!(code, 220);
                assert!(header.contains("aid"), "{header}");
            }
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }
}

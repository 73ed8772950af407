/*! FILE field masks.

`fmask` and `amask` are fixed-size bitsets that select which fields a
`FILE` response carries, and in what order they appear in the reply
row. Each set bit corresponds to one field; the bit tables here mirror
the reference client's `anidb/mask.go` verbatim.
*/

/// The width and encoding of one selected field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// A 16-bit unsigned integer, base 10 on the wire.
    Int2,
    /// A 32-bit unsigned integer, base 10 on the wire.
    Int4,
    /// A 64-bit unsigned integer, base 10 on the wire.
    Int8,
    /// An opaque string field, carried verbatim.
    Str,
}

/// One selectable field: its bit position within its mask and how to
/// parse it out of the response row.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    /// Field name, used only in error messages.
    pub name: &'static str,
    byte: usize,
    bit: u8,
    /// How to interpret this field's positional value.
    pub kind: FieldKind,
}

/// `fmask` field table, in byte/bit declaration order (`anidb/mask.go`).
pub const FMASK_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "aid", byte: 0, bit: 6, kind: FieldKind::Int4 },
    FieldSpec { name: "eid", byte: 0, bit: 5, kind: FieldKind::Int4 },
    FieldSpec { name: "gid", byte: 0, bit: 4, kind: FieldKind::Int4 },
    FieldSpec { name: "state", byte: 0, bit: 0, kind: FieldKind::Int2 },
    FieldSpec { name: "size", byte: 1, bit: 3, kind: FieldKind::Int8 },
    FieldSpec { name: "ed2k", byte: 1, bit: 2, kind: FieldKind::Str },
    FieldSpec { name: "md5", byte: 1, bit: 1, kind: FieldKind::Str },
    FieldSpec { name: "sha1", byte: 1, bit: 0, kind: FieldKind::Str },
    FieldSpec { name: "crc", byte: 1, bit: 7, kind: FieldKind::Str },
    FieldSpec { name: "quality", byte: 2, bit: 7, kind: FieldKind::Str },
    FieldSpec { name: "source", byte: 2, bit: 6, kind: FieldKind::Str },
    FieldSpec { name: "audio_codec", byte: 2, bit: 5, kind: FieldKind::Str },
    FieldSpec { name: "audio_bitrate", byte: 2, bit: 4, kind: FieldKind::Int4 },
    FieldSpec { name: "video_codec", byte: 2, bit: 3, kind: FieldKind::Str },
    FieldSpec { name: "video_bitrate", byte: 2, bit: 2, kind: FieldKind::Int4 },
    FieldSpec { name: "video_res", byte: 2, bit: 1, kind: FieldKind::Str },
    FieldSpec { name: "extension", byte: 2, bit: 0, kind: FieldKind::Str },
];

/// `amask` field table, in byte/bit declaration order (`anidb/mask.go`).
pub const AMASK_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "year", byte: 0, bit: 5, kind: FieldKind::Str },
    FieldSpec { name: "anime_type", byte: 0, bit: 4, kind: FieldKind::Str },
    FieldSpec { name: "romaji_name", byte: 1, bit: 7, kind: FieldKind::Str },
    FieldSpec { name: "english_name", byte: 1, bit: 5, kind: FieldKind::Str },
    FieldSpec { name: "episode_number", byte: 2, bit: 7, kind: FieldKind::Str },
    FieldSpec { name: "episode_name", byte: 2, bit: 6, kind: FieldKind::Str },
    FieldSpec { name: "episode_name_romaji", byte: 2, bit: 5, kind: FieldKind::Str },
    FieldSpec { name: "group_name", byte: 3, bit: 7, kind: FieldKind::Str },
];

/// A 5-byte `fmask` bitset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileFmask(pub [u8; 5]);

/// A 4-byte `amask` bitset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileAmask(pub [u8; 4]);

impl FileFmask {
    /// The default request's fmask: exactly the 17 fields the core's
    /// [`crate::file::File`] expects, beyond `FileID`.
    pub fn default_request() -> Self {
        Self([0b0111_0001, 0b1000_1111, 0b1111_1111, 0b0000_0000, 0b0000_0000])
    }

    /// Lowercase hex encoding, byte 0 first.
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn is_set(&self, spec: &FieldSpec) -> bool {
        self.0[spec.byte] & (1 << spec.bit) != 0
    }

    /// Fields selected by this mask, in wire order.
    pub fn selected(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        FMASK_FIELDS.iter().filter(move |f| self.is_set(f))
    }
}

impl FileAmask {
    /// The default request's amask: exactly the 8 anime/episode fields
    /// the core's [`crate::file::File`] expects.
    pub fn default_request() -> Self {
        Self([0b0011_0000, 0b1010_0000, 0b1110_0000, 0b1000_0000])
    }

    /// Lowercase hex encoding, byte 0 first.
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn is_set(&self, spec: &FieldSpec) -> bool {
        self.0[spec.byte] & (1 << spec.bit) != 0
    }

    /// Fields selected by this mask, in wire order.
    pub fn selected(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        AMASK_FIELDS.iter().filter(move |f| self.is_set(f))
    }
}

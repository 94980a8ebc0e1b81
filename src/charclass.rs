/// An inclusive interval of bytes.
///
/// A range with `from > to` is kept as written (e.g. `[a-Z]`) and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRange {
    pub from: u8,
    pub to: u8,
}

impl CharRange {
    pub const fn new(from: u8, to: u8) -> Self {
        Self { from, to }
    }

    pub const fn single(c: u8) -> Self {
        Self { from: c, to: c }
    }

    pub fn contains(&self, c: u8) -> bool {
        self.from <= c && c <= self.to
    }
}

/// Highest byte covered by negated classes.
pub const ASCII_MAX: u8 = 0x7f;

const fn r(from: u8, to: u8) -> CharRange {
    CharRange::new(from, to)
}

const fn s(c: u8) -> CharRange {
    CharRange::single(c)
}

pub const DIGIT: &[CharRange] = &[r(b'0', b'9')];
pub const WORD: &[CharRange] = &[r(b'a', b'z'), r(b'A', b'Z'), r(b'0', b'9'), s(b'_')];
pub const SPACE: &[CharRange] = &[
    s(b' '),
    s(b'\t'),
    s(b'\r'),
    s(b'\n'),
    s(0x0b),
    s(0x0c),
];

const PUNCT: &[CharRange] = &[r(b'!', b'/'), r(b':', b'@'), r(b'[', b'`'), r(b'{', b'~')];

/// Returns true if `c` falls into any of `ranges`.
pub fn in_any(ranges: &[CharRange], c: u8) -> bool {
    ranges.iter().any(|range| range.contains(c))
}

/// Complements `ranges` over `0..=0x7f`.
///
/// The input must not contain overlapping ranges.
pub fn negate(ranges: &[CharRange]) -> Vec<CharRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort_unstable_by_key(|range| range.from);

    let mut out = Vec::with_capacity(sorted.len() + 1);
    // next byte not yet covered; u16 so that 0x100 can mark "done"
    let mut from: u16 = 0;
    for range in sorted {
        if u16::from(range.from) > from {
            out.push(CharRange::new(from as u8, range.from - 1));
        }
        from = from.max(u16::from(range.to) + 1);
    }
    if from <= u16::from(ASCII_MAX) {
        out.push(CharRange::new(from as u8, ASCII_MAX));
    }
    out
}

/// Looks up a named class such as `[:alpha:]` at the start of `pattern`.
///
/// Returns the class ranges and the number of bytes the token occupies.
pub fn posix_class(pattern: &[u8]) -> Option<(&'static [CharRange], usize)> {
    const CLASSES: &[(&[u8], &[CharRange])] = &[
        (b"[:alnum:]", &[r(b'a', b'z'), r(b'A', b'Z'), r(b'0', b'9')]),
        (b"[:alpha:]", &[r(b'a', b'z'), r(b'A', b'Z')]),
        (b"[:ascii:]", &[r(0x00, 0x7f)]),
        (b"[:blank:]", &[s(b' '), s(b'\t')]),
        (b"[:cntrl:]", &[r(0x00, 0x1f), s(0x7f)]),
        (b"[:digit:]", DIGIT),
        (b"[:graph:]", &[r(0x21, 0x7e)]),
        (b"[:lower:]", &[r(b'a', b'z')]),
        (b"[:print:]", &[r(0x20, 0x7e)]),
        (b"[:punct:]", PUNCT),
        (b"[:space:]", SPACE),
        (b"[:upper:]", &[r(b'A', b'Z')]),
        (b"[:xdigit:]", &[r(b'A', b'F'), r(b'a', b'f'), r(b'0', b'9')]),
        (b"[:word:]", WORD),
    ];

    CLASSES
        .iter()
        .find(|(name, _)| pattern.starts_with(name))
        .map(|(name, ranges)| (*ranges, name.len()))
}

/// Expands a Perl shorthand class letter (`d`, `D`, `s`, `S`, `w`, `W`).
pub fn perl_class(c: u8) -> Option<Vec<CharRange>> {
    let ranges = match c.to_ascii_lowercase() {
        b'd' => DIGIT,
        b's' => SPACE,
        b'w' => WORD,
        _ => return None,
    };
    if c.is_ascii_uppercase() {
        Some(negate(ranges))
    } else {
        Some(ranges.to_vec())
    }
}

/// Maps the byte following a backslash to the byte it denotes.
pub fn escaped_byte(c: u8) -> u8 {
    match c {
        b'a' => 0x07,
        b'b' => 0x08,
        b'e' => 0x1b,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn negate_digit() {
        assert_eq!(
            negate(DIGIT),
            vec![CharRange::new(0, b'0' - 1), CharRange::new(b'9' + 1, 0x7f)]
        );
    }

    #[test]
    fn negate_sorts_and_skips_empty_gaps() {
        let ranges = [s(b'b'), r(0, b'a'), r(b'c', 0x7f)];
        assert!(negate(&ranges).is_empty());

        let ranges = [r(b'x', b'z'), s(0)];
        assert_eq!(
            negate(&ranges),
            vec![r(1, b'x' - 1), r(b'z' + 1, 0x7f)]
        );
    }

    #[test]
    fn negate_empty_is_ascii() {
        assert_eq!(negate(&[]), vec![r(0, 0x7f)]);
    }

    #[test]
    fn perl_classes() {
        assert_eq!(perl_class(b'd'), Some(DIGIT.to_vec()));
        assert!(in_any(&perl_class(b'W').unwrap(), b'-'));
        assert!(!in_any(&perl_class(b'W').unwrap(), b'_'));
        assert!(!in_any(&perl_class(b'S').unwrap(), b'\n'));
        assert!(!in_any(&perl_class(b'D').unwrap(), 0x80));
        assert_eq!(perl_class(b'x'), None);
    }

    #[test]
    fn posix_lookup() {
        let (ranges, len) = posix_class(b"[:xdigit:]]").unwrap();
        assert_eq!(len, 10);
        assert!(in_any(ranges, b'F'));
        assert!(!in_any(ranges, b'g'));

        let (ranges, len) = posix_class(b"[:word:]").unwrap();
        assert_eq!(len, 8);
        assert!(in_any(ranges, b'_'));

        let (ranges, _) = posix_class(b"[:punct:]").unwrap();
        for c in b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~" {
            assert!(in_any(ranges, *c), "{}", *c as char);
        }
        assert!(!in_any(ranges, b'a'));

        assert_eq!(posix_class(b"[:nope:]"), None);
        assert_eq!(posix_class(b"[:alpha"), None);
    }

    #[test]
    fn escapes() {
        assert_eq!(escaped_byte(b'n'), b'\n');
        assert_eq!(escaped_byte(b'e'), 0x1b);
        assert_eq!(escaped_byte(b'.'), b'.');
    }

    #[test]
    fn reversed_range_is_empty() {
        let range = CharRange::new(b'a', b'Z');
        assert!(!(0..=255u8).any(|c| range.contains(c)));
    }

    quickcheck! {
        fn negation_complements_ascii(bytes: Vec<u8>) -> bool {
            let mut singles: Vec<u8> = bytes.into_iter().map(|b| b & 0x7f).collect();
            singles.sort_unstable();
            singles.dedup();
            let ranges: Vec<CharRange> = singles.iter().copied().map(CharRange::single).collect();
            let negated = negate(&ranges);
            (0..=ASCII_MAX).all(|c| in_any(&ranges, c) != in_any(&negated, c))
        }
    }
}

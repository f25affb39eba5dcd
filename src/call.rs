use std::fmt;

use serde::{Serialize, Serializer};

/// One of the four DNA bases observed in a homozygous call.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Base {
    A,
    C,
    G,
    T,
}

impl Base {
    /// Bases in tie-break order.
    pub const ALL: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    /// Numeric allele code used for distance calculations (A/C/G/T -> 0..3).
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn symbol(self) -> char {
        match self {
            Base::A => 'A',
            Base::C => 'C',
            Base::G => 'G',
            Base::T => 'T',
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        match c {
            'A' => Some(Base::A),
            'C' => Some(Base::C),
            'G' => Some(Base::G),
            'T' => Some(Base::T),
            _ => None,
        }
    }
}

/// IUPAC two-base ambiguity code used for heterozygous calls.
///
/// Variants are declared in lexicographic symbol order, which is also the
/// consensus tie-break order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Ambiguity {
    /// G/T
    K,
    /// A/C
    M,
    /// A/G
    R,
    /// C/G
    S,
    /// A/T
    W,
    /// C/T
    Y,
}

impl Ambiguity {
    pub const ALL: [Ambiguity; 6] = [
        Ambiguity::K,
        Ambiguity::M,
        Ambiguity::R,
        Ambiguity::S,
        Ambiguity::W,
        Ambiguity::Y,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The unordered base pair this code stands for.
    pub fn bases(self) -> (Base, Base) {
        match self {
            Ambiguity::K => (Base::G, Base::T),
            Ambiguity::M => (Base::A, Base::C),
            Ambiguity::R => (Base::A, Base::G),
            Ambiguity::S => (Base::C, Base::G),
            Ambiguity::W => (Base::A, Base::T),
            Ambiguity::Y => (Base::C, Base::T),
        }
    }

    pub fn contains(self, base: Base) -> bool {
        let (a, b) = self.bases();
        a == base || b == base
    }

    /// Mean of the two base codes, a continuous dosage proxy.
    pub fn dosage(self) -> f64 {
        let (a, b) = self.bases();
        (f64::from(a.code()) + f64::from(b.code())) / 2.0
    }

    pub fn symbol(self) -> char {
        match self {
            Ambiguity::K => 'K',
            Ambiguity::M => 'M',
            Ambiguity::R => 'R',
            Ambiguity::S => 'S',
            Ambiguity::W => 'W',
            Ambiguity::Y => 'Y',
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        match c {
            'K' => Some(Ambiguity::K),
            'M' => Some(Ambiguity::M),
            'R' => Some(Ambiguity::R),
            'S' => Some(Ambiguity::S),
            'W' => Some(Ambiguity::W),
            'Y' => Some(Ambiguity::Y),
            _ => None,
        }
    }
}

/// A genotype call for one (marker, sample) pair.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Call {
    Hom(Base),
    Het(Ambiguity),
    #[default]
    Failed,
}

impl Call {
    pub fn is_valid(self) -> bool {
        !matches!(self, Call::Failed)
    }

    pub fn is_het(self) -> bool {
        matches!(self, Call::Het(_))
    }

    pub fn is_hom(self) -> bool {
        matches!(self, Call::Hom(_))
    }

    /// Numeric dosage proxy; `None` for failed calls.
    pub fn dosage(self) -> Option<f64> {
        match self {
            Call::Hom(base) => Some(f64::from(base.code())),
            Call::Het(code) => Some(code.dosage()),
            Call::Failed => None,
        }
    }

    /// Parse a call token, never failing: anything outside the alphabet
    /// becomes [`Call::Failed`].
    pub fn parse(raw: &str) -> Self {
        parse_call(raw).call
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Hom(base) => write!(f, "{}", base.symbol()),
            Call::Het(code) => write!(f, "{}", code.symbol()),
            Call::Failed => f.write_str("failed"),
        }
    }
}

impl Serialize for Call {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of parsing a single raw token.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParsedCall {
    pub call: Call,
    /// True when the token was neither a known symbol nor an explicit
    /// failure marker.
    pub malformed: bool,
}

pub const FAILED_TOKEN: &str = "failed";

pub fn parse_call(raw: &str) -> ParsedCall {
    let token = raw.trim();
    if token.is_empty() || token.eq_ignore_ascii_case(FAILED_TOKEN) {
        return ParsedCall {
            call: Call::Failed,
            malformed: false,
        };
    }

    let mut chars = token.chars();
    let symbol = match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_ascii_uppercase(),
        _ => {
            return ParsedCall {
                call: Call::Failed,
                malformed: true,
            };
        }
    };

    let call = Base::from_symbol(symbol)
        .map(Call::Hom)
        .or_else(|| Ambiguity::from_symbol(symbol).map(Call::Het));

    match call {
        Some(call) => ParsedCall {
            call,
            malformed: false,
        },
        None => ParsedCall {
            call: Call::Failed,
            malformed: true,
        },
    }
}

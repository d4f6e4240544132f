use crate::error::Error;
use core::fmt;
use core::str::FromStr;

/// How a store file is opened.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Mode {
    /// `r`: read-only, the file must exist.
    #[default]
    Read,
    /// `r+`: read/write, the file must exist.
    ReadWrite,
    /// `w`: create or truncate.
    Truncate,
    /// `w-` or `x`: create, fail if the file exists.
    CreateNew,
    /// `a`: read/write, create if missing.
    Append,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Read => "r",
            Mode::ReadWrite => "r+",
            Mode::Truncate => "w",
            Mode::CreateNew => "w-",
            Mode::Append => "a",
        }
    }

    pub fn is_writable(self) -> bool {
        !matches!(self, Mode::Read)
    }

    /// Modes that (re)create the file take an exclusive lock; everything else
    /// shares.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Mode::Truncate | Mode::CreateNew)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "r" => Mode::Read,
            "r+" => Mode::ReadWrite,
            "w" => Mode::Truncate,
            "w-" | "x" => Mode::CreateNew,
            "a" => Mode::Append,
            other => return Err(Error::Configuration(format!("unknown open mode {other:?}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_and_aliases() {
        for m in [Mode::Read, Mode::ReadWrite, Mode::Truncate, Mode::CreateNew, Mode::Append] {
            assert_eq!(m.as_str().parse::<Mode>().unwrap(), m);
        }
        assert_eq!("x".parse::<Mode>().unwrap(), Mode::CreateNew);
        assert!(matches!("rw".parse::<Mode>(), Err(Error::Configuration(_))));
    }

    #[test]
    fn lock_and_write_classes() {
        assert!(!Mode::Read.is_writable());
        assert!(Mode::Append.is_writable() && !Mode::Append.is_exclusive());
        assert!(Mode::Truncate.is_exclusive() && Mode::CreateNew.is_exclusive());
    }
}

use serde::de;
use std::error;
use std::fmt::{self, Display};

#[derive(Clone, Debug, PartialEq)]
pub enum DeError {
    SerdeError(String),
    ExpectSingleValue(String),
    ExpectString,
    ExpectBoolean,
    ExpectNumber,
    ExpectInteger(f64),
    ExpectObject,
}

// serde's `de::Error` needs `custom` on the error type itself, so the kinds are wrapped in a
// thin newtype.
#[derive(Debug, Clone, PartialEq)]
pub struct Error(pub DeError);

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error(DeError::SerdeError(msg.to_string()))
    }
}

impl error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            DeError::SerdeError(ref s) => write!(f, "{}", s),
            DeError::ExpectSingleValue(ref key) => {
                write!(f, "expecting `{}` to contain a single entry", key)
            }
            DeError::ExpectString => write!(f, "expecting string"),
            DeError::ExpectBoolean => write!(f, "expecting boolean"),
            DeError::ExpectNumber => write!(f, "expecting number"),
            DeError::ExpectInteger(x) => write!(f, "expecting integer, received {}", x),
            DeError::ExpectObject => write!(f, "needs an object to deserialize a struct"),
        }
    }
}

//! Fixed variant option sets for apparel products.
//!
//! Size and color are closed enums rather than free-form strings so a
//! cart line key `(product, size, color)` can never be malformed.

use serde::{Deserialize, Serialize};

/// Apparel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xs => write!(f, "xs"),
            Self::S => write!(f, "s"),
            Self::M => write!(f, "m"),
            Self::L => write!(f, "l"),
            Self::Xl => write!(f, "xl"),
            Self::Xxl => write!(f, "xxl"),
        }
    }
}

impl std::str::FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xs" => Ok(Self::Xs),
            "s" => Ok(Self::S),
            "m" => Ok(Self::M),
            "l" => Ok(Self::L),
            "xl" => Ok(Self::Xl),
            "xxl" => Ok(Self::Xxl),
            _ => Err(format!("invalid size: {s}")),
        }
    }
}

/// Apparel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
    Navy,
    Olive,
    Sand,
    Rust,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Black => write!(f, "black"),
            Self::White => write!(f, "white"),
            Self::Navy => write!(f, "navy"),
            Self::Olive => write!(f, "olive"),
            Self::Sand => write!(f, "sand"),
            Self::Rust => write!(f, "rust"),
        }
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "black" => Ok(Self::Black),
            "white" => Ok(Self::White),
            "navy" => Ok(Self::Navy),
            "olive" => Ok(Self::Olive),
            "sand" => Ok(Self::Sand),
            "rust" => Ok(Self::Rust),
            _ => Err(format!("invalid color: {s}")),
        }
    }
}

//! Hosted functions and their ordinals.
//!
//! The managed program calls hosted functions by ordinal. The ordinal of a
//! function is the discriminant of its `HostedFn` variant, and variants are
//! declared in alphabetical order of their qualified managed-side name. The
//! host builds its dispatch table by matching on these variants, and the
//! `hosted-manifest` binary prints the declaration order the managed module
//! must follow, so both sides derive their order from this file.
//!
//! Each hosted function also has a `#[repr(C)]` argument struct (and result
//! struct where the result is not a plain list or bool). Field order is the
//! managed-side record layout.

use crate::buffer::{RocList, RocStr};

/// Every hosted function, in ordinal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum HostedFn {
    SchnorrPublicKey = 0,
    SchnorrSign = 1,
    SchnorrVerify = 2,
    Sha256HashBinary = 3,
    Sha256HashHex = 4,
    StderrLine = 5,
    StdinLine = 6,
    StdoutLine = 7,
}

impl HostedFn {
    /// Number of hosted functions.
    pub const COUNT: usize = 8;

    /// All hosted functions, indexed by ordinal.
    pub const ALL: [HostedFn; Self::COUNT] = [
        Self::SchnorrPublicKey,
        Self::SchnorrSign,
        Self::SchnorrVerify,
        Self::Sha256HashBinary,
        Self::Sha256HashHex,
        Self::StderrLine,
        Self::StdinLine,
        Self::StdoutLine,
    ];

    /// Position in the hosted function table.
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Fully-qualified managed-side name. Table order is the sort order of
    /// these names.
    pub const fn qualified_name(self) -> &'static str {
        match self {
            Self::SchnorrPublicKey => "Schnorr.public_key",
            Self::SchnorrSign => "Schnorr.sign",
            Self::SchnorrVerify => "Schnorr.verify",
            Self::Sha256HashBinary => "Sha256.hash_binary",
            Self::Sha256HashHex => "Sha256.hash_hex",
            Self::StderrLine => "Stderr.line!",
            Self::StdinLine => "Stdin.line!",
            Self::StdoutLine => "Stdout.line!",
        }
    }

    /// Managed-side type annotation, as emitted by the manifest.
    pub const fn signature(self) -> &'static str {
        match self {
            Self::SchnorrPublicKey => "List U8 -> List U8",
            Self::SchnorrSign => "List U8, List U8 -> List U8",
            Self::SchnorrVerify => "List U8, List U8, List U8 -> Bool",
            Self::Sha256HashBinary => "List U8 -> List U8",
            Self::Sha256HashHex => "List U8 -> Str",
            Self::StderrLine => "Str => {}",
            Self::StdinLine => "{} => { line : Str, end_of_file : Bool }",
            Self::StdoutLine => "Str => {}",
        }
    }

    /// Lines of the managed-side hosted declaration block, in ordinal order.
    pub fn manifest() -> Vec<String> {
        Self::ALL
            .iter()
            .map(|f| format!("{:>2}  {} : {}", f.ordinal(), f.qualified_name(), f.signature()))
            .collect()
    }
}

// A new variant without a matching `ALL` entry must not compile.
const _: () = assert!(HostedFn::StdoutLine as usize + 1 == HostedFn::COUNT);

// ── Argument and result layouts ──

/// `Schnorr.public_key` arguments.
#[repr(C)]
#[derive(Debug)]
pub struct PublicKeyArgs {
    pub secret_key: RocList<u8>,
}

/// `Schnorr.sign` arguments.
#[repr(C)]
#[derive(Debug)]
pub struct SignArgs {
    pub secret_key: RocList<u8>,
    pub digest: RocList<u8>,
}

/// `Schnorr.verify` arguments.
#[repr(C)]
#[derive(Debug)]
pub struct VerifyArgs {
    pub public_key: RocList<u8>,
    pub digest: RocList<u8>,
    pub signature: RocList<u8>,
}

/// `Sha256.hash_binary` / `Sha256.hash_hex` arguments.
#[repr(C)]
#[derive(Debug)]
pub struct HashArgs {
    pub message: RocList<u8>,
}

/// `Stdout.line!` / `Stderr.line!` arguments.
#[repr(C)]
#[derive(Debug)]
pub struct LineArgs {
    pub line: RocStr,
}

/// `Stdin.line!` result.
#[repr(C)]
#[derive(Debug)]
pub struct StdinLineResult {
    pub line: RocStr,
    pub end_of_file: bool,
}

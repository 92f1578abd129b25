//! Anchor-based message interpolation for human-readable log lines.
//!
//! Each `{}` anchor in the pattern is replaced with the next argument, left
//! to right. `\{}` renders a literal `{}` without consuming an argument;
//! `\\{}` renders a single backslash followed by the substituted argument.
//! Surplus arguments are ignored and surplus anchors are left verbatim.

use std::fmt::{Display, Write as _};

pub fn interpolate(pattern: &str, args: &[&dyn Display]) -> String {
    if args.is_empty() {
        return pattern.to_string();
    }

    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len() + 50);
    let mut cursor = 0usize;
    let mut arg = 0usize;

    while arg < args.len() {
        let Some(rel) = pattern[cursor..].find("{}") else {
            if cursor == 0 {
                // no anchor anywhere: hand the pattern back untouched
                return pattern.to_string();
            }
            out.push_str(&pattern[cursor..]);
            return out;
        };
        let at = cursor + rel;

        if at > 0 && bytes[at - 1] == b'\\' {
            if at > 1 && bytes[at - 2] == b'\\' {
                // double escape: keep one backslash, substitute as normal
                out.push_str(&pattern[cursor..at - 1]);
                let _ = write!(out, "{}", args[arg]);
                arg += 1;
                cursor = at + 2;
            } else {
                // escaped anchor: emit it literally, argument not consumed
                out.push_str(&pattern[cursor..at - 1]);
                out.push('{');
                cursor = at + 1;
            }
        } else {
            out.push_str(&pattern[cursor..at]);
            let _ = write!(out, "{}", args[arg]);
            arg += 1;
            cursor = at + 2;
        }
    }

    out.push_str(&pattern[cursor..]);
    out
}
